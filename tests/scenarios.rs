//! End-to-end scenarios against the public embedding API, mirroring the
//! literal walkthroughs enumerated in spec §8.

use rocksmq::{Broker, Config, ProducerMessage, Properties};

fn props(pairs: &[(&str, &str)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn broker() -> Broker {
    Broker::in_memory(Config::for_testing()).unwrap()
}

#[test]
fn scenario_1_basic_publish_consume() {
    let b = broker();
    b.create_topic("t1").unwrap();
    b.create_consumer_group("t1", "g1").unwrap();

    let ids = b
        .produce(
            "t1",
            vec![
                ProducerMessage::new(b"a".to_vec()),
                ProducerMessage::with_properties(b"b".to_vec(), props(&[("k", "v")])),
            ],
        )
        .unwrap();
    assert_eq!(ids, vec![0, 1]);

    let msgs = b.consume("t1", "g1", 10).unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].id, 0);
    assert_eq!(msgs[0].payload.as_deref(), Some(b"a".as_slice()));
    assert!(msgs[0].properties.is_none());
    assert_eq!(msgs[1].id, 1);
    assert_eq!(
        msgs[1].properties.as_ref().unwrap().get("k").map(String::as_str),
        Some("v")
    );

    assert!(b.consume("t1", "g1", 10).unwrap().is_empty());
}

#[test]
fn scenario_2_seek_back_replays_already_consumed_messages() {
    let b = broker();
    b.create_topic("t1").unwrap();
    b.create_consumer_group("t1", "g1").unwrap();
    b.produce(
        "t1",
        vec![ProducerMessage::new(b"a".to_vec()), ProducerMessage::new(b"b".to_vec())],
    )
    .unwrap();
    b.consume("t1", "g1", 10).unwrap();

    b.seek("t1", "g1", 0).unwrap();
    let msgs = b.consume("t1", "g1", 10).unwrap();
    assert_eq!(msgs.iter().map(|m| m.id).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(msgs[0].payload.as_deref(), Some(b"a".as_slice()));
    assert_eq!(msgs[1].payload.as_deref(), Some(b"b".as_slice()));
}

#[test]
fn scenario_3_page_seals_when_running_sum_first_exceeds_page_size() {
    let b = Broker::in_memory(Config::for_testing().with_page_size_bytes(3)).unwrap();
    b.create_topic("t2").unwrap();

    let ids = b
        .produce(
            "t2",
            vec![ProducerMessage::new(b"aa".to_vec()), ProducerMessage::new(b"bb".to_vec())],
        )
        .unwrap();
    assert_eq!(ids, vec![0, 1]);

    let ids2 = b.produce("t2", vec![ProducerMessage::new(b"cc".to_vec())]).unwrap();
    assert_eq!(ids2, vec![2]);
    // running sum after batch 1 was 2 (no seal, 2 is not > 3); batch 2
    // pushes it to 4 > 3, sealing a page at end_id=2 and resetting the
    // running sum to 0. Ids keep allocating contiguously across the
    // seal boundary regardless (page sealing is pure bookkeeping, not
    // an id-space event).
    let ids3 = b.produce("t2", vec![ProducerMessage::new(b"d".to_vec())]).unwrap();
    assert_eq!(ids3, vec![3]);
}

#[test]
fn scenario_4_retention_reclaims_fully_acked_page() {
    let b = Broker::in_memory(
        Config::for_testing()
            .with_page_size_bytes(3)
            .with_retention_seconds(0)
            .with_retention_size_bytes(0),
    )
    .unwrap();
    b.create_topic("t2").unwrap();
    b.create_consumer_group("t2", "g").unwrap();

    b.produce(
        "t2",
        vec![ProducerMessage::new(b"aa".to_vec()), ProducerMessage::new(b"bb".to_vec())],
    )
    .unwrap();
    b.produce("t2", vec![ProducerMessage::new(b"cc".to_vec())]).unwrap();

    // Advance g through every produced message so the sealed page at
    // end_id=2 gets an acked_ts.
    let consumed = b.consume("t2", "g", 10).unwrap();
    assert_eq!(consumed.len(), 3);

    // The retention worker ticks every `tick_interval_seconds` (1s in
    // `Config::for_testing()`) and, with `check_interval_seconds: 0`
    // and both retention thresholds at zero, prunes every fully-acked
    // page on its very first pass. Poll `get_latest_msg`, which reads
    // the payload keyspace directly rather than the broker's in-memory
    // tail cache, so it reflects the prune as soon as it lands.
    let mut pruned = false;
    for _ in 0..30 {
        if b.get_latest_msg("t2").unwrap() < 0 {
            pruned = true;
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(200));
    }
    assert!(pruned, "retention worker never pruned the fully-acked page");
}

#[test]
fn scenario_5_multiple_groups_block_ack_until_all_advance() {
    let b = Broker::in_memory(Config::for_testing().with_page_size_bytes(2)).unwrap();
    b.create_topic("t3").unwrap();
    b.create_consumer_group("t3", "g1").unwrap();
    b.create_consumer_group("t3", "g2").unwrap();

    b.produce(
        "t3",
        vec![
            ProducerMessage::new(vec![0u8; 2]),
            ProducerMessage::new(vec![0u8; 2]),
            ProducerMessage::new(vec![0u8; 2]),
            ProducerMessage::new(vec![0u8; 2]),
        ],
    )
    .unwrap();

    b.consume("t3", "g1", 10).unwrap();
    // g2 has not advanced; a retention pass (even with zero thresholds)
    // must not be able to reclaim the page g1 advanced past, since it
    // is not yet acked by every group. We can't observe `acked_ts`
    // directly from this black-box crate, so we assert the behavior
    // that depends on it: g2 can still consume every message from the
    // beginning, proving nothing was pruned.
    let g2_msgs = b.consume("t3", "g2", 10).unwrap();
    assert_eq!(g2_msgs.len(), 4);
}

#[test]
fn scenario_6_invalid_topic_name_rejected_with_no_side_effects() {
    let b = broker();
    let err = b.create_topic("bad/name").unwrap_err();
    assert!(matches!(err, rocksmq::Error::InvalidName(_)));
    // Topic truly never got created: destroying it must fail.
    assert!(matches!(
        b.destroy_topic("bad/name"),
        Err(rocksmq::Error::TopicNotFound(_))
    ));
}

#[test]
fn empty_payload_and_properties_roundtrip_as_empty() {
    let b = broker();
    b.create_topic("t1").unwrap();
    b.create_consumer_group("t1", "g1").unwrap();
    b.produce("t1", vec![ProducerMessage::new(Vec::new())]).unwrap();

    let msgs = b.consume("t1", "g1", 10).unwrap();
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].payload.is_none());
    assert!(msgs[0].properties.is_none());
}

#[test]
fn consume_with_n_zero_is_a_no_op() {
    let b = broker();
    b.create_topic("t1").unwrap();
    b.create_consumer_group("t1", "g1").unwrap();
    b.produce("t1", vec![ProducerMessage::new(b"a".to_vec())]).unwrap();

    assert!(b.consume("t1", "g1", 0).unwrap().is_empty());
    let msgs = b.consume("t1", "g1", 10).unwrap();
    assert_eq!(msgs.len(), 1);
}

#[test]
fn destroy_topic_works_even_with_live_consumer_groups() {
    let b = broker();
    b.create_topic("t1").unwrap();
    b.create_consumer_group("t1", "g1").unwrap();
    b.produce("t1", vec![ProducerMessage::new(b"a".to_vec())]).unwrap();

    b.destroy_topic("t1").unwrap();
    assert!(matches!(
        b.produce("t1", vec![ProducerMessage::new(b"x".to_vec())]),
        Err(rocksmq::Error::TopicNotFound(_))
    ));
}

#[test]
fn close_is_idempotent_and_rejects_further_operations() {
    let b = broker();
    b.create_topic("t1").unwrap();
    b.close();
    b.close();
    assert!(matches!(b.create_topic("t2"), Err(rocksmq::Error::NotServing)));
}

#[test]
fn produce_ids_are_strictly_increasing_and_contiguous_per_batch() {
    let b = broker();
    b.create_topic("t1").unwrap();
    let batch1 = b
        .produce(
            "t1",
            vec![ProducerMessage::new(b"a".to_vec()), ProducerMessage::new(b"b".to_vec())],
        )
        .unwrap();
    let batch2 = b.produce("t1", vec![ProducerMessage::new(b"c".to_vec())]).unwrap();
    assert_eq!(batch1, vec![0, 1]);
    assert_eq!(batch2, vec![2]);
}
