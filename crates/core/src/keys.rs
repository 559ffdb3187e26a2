//! Key-space layout for the ordered KV store (spec §3).
//!
//! All keys are ASCII and lexicographically ordered. Message ids are
//! encoded with fixed-width, zero-padded decimal digits so that
//! lexicographic order on the key matches numeric order on the id —
//! this is what lets the payload keyspace be scanned in id order with a
//! plain prefix scan instead of a numeric comparator.

/// Prefix for the payload keyspace: `<topic>/<msgId>`.
pub const PAYLOAD_SUFFIX_SEP: char = '/';

/// Prefix for the properties keyspace: `properties/<topic>/<msgId>`.
pub const PROPERTIES_PREFIX: &str = "properties/";

/// Prefix for topic-existence records: `topic_id/<topic>`.
pub const TOPIC_ID_PREFIX: &str = "topic_id/";

/// Prefix for the running open-page byte count: `message_size/<topic>`.
pub const MESSAGE_SIZE_PREFIX: &str = "message_size/";

/// Prefix for the durable id-allocator high-water mark: `last_id/<topic>`.
///
/// Not part of spec §3's table (the Go source keeps `topicLastID` as an
/// in-memory-only `sync.Map`, never persisted — there the counter comes
/// from an external, already-durable root-coordinator service). This
/// core's id allocator is internal (§4.B), so it needs a durable key of
/// its own to honor "never reused across restarts"; this is that key.
pub const LAST_ID_PREFIX: &str = "last_id/";

/// Prefix for sealed-page byte sizes: `page_message_size/<topic>/<pageEndId>`.
pub const PAGE_MESSAGE_SIZE_PREFIX: &str = "page_message_size/";

/// Prefix for sealed-page seal timestamps: `page_ts/<topic>/<pageEndId>`.
pub const PAGE_TS_PREFIX: &str = "page_ts/";

/// Prefix for sealed-page ack timestamps: `acked_ts/<topic>/<pageEndId>`.
pub const ACKED_TS_PREFIX: &str = "acked_ts/";

/// Width of the zero-padded decimal id suffix. `i64::MAX` is 19 digits.
const ID_WIDTH: usize = 20;

/// Render a message id as a fixed-width, zero-padded decimal string so
/// that lexicographic string order matches numeric order.
pub fn encode_id(id: i64) -> String {
    format!("{:0width$}", id, width = ID_WIDTH)
}

/// Parse a fixed-width id string produced by [`encode_id`].
pub fn decode_id(s: &str) -> Option<i64> {
    s.parse::<i64>().ok()
}

/// Build the payload key for a message.
pub fn payload_key(topic: &str, id: i64) -> String {
    format!("{}{}{}", topic, PAYLOAD_SUFFIX_SEP, encode_id(id))
}

/// Prefix covering every payload key for a topic (`<topic>/`).
pub fn payload_prefix(topic: &str) -> String {
    format!("{}{}", topic, PAYLOAD_SUFFIX_SEP)
}

/// Build the properties key for a message.
pub fn properties_key(topic: &str, id: i64) -> String {
    format!("{}{}/{}", PROPERTIES_PREFIX, topic, encode_id(id))
}

/// Prefix covering every properties key for a topic.
pub fn properties_prefix(topic: &str) -> String {
    format!("{}{}/", PROPERTIES_PREFIX, topic)
}

/// Build the topic-existence key.
pub fn topic_id_key(topic: &str) -> String {
    format!("{}{}", TOPIC_ID_PREFIX, topic)
}

/// Build the running open-page size key.
pub fn message_size_key(topic: &str) -> String {
    format!("{}{}", MESSAGE_SIZE_PREFIX, topic)
}

/// Build the durable id-allocator high-water mark key.
pub fn last_id_key(topic: &str) -> String {
    format!("{}{}", LAST_ID_PREFIX, topic)
}

/// Build a sealed-page size key.
pub fn page_message_size_key(topic: &str, page_end_id: i64) -> String {
    format!(
        "{}{}/{}",
        PAGE_MESSAGE_SIZE_PREFIX,
        topic,
        encode_id(page_end_id)
    )
}

/// Prefix covering every sealed-page size key for a topic.
pub fn page_message_size_prefix(topic: &str) -> String {
    format!("{}{}/", PAGE_MESSAGE_SIZE_PREFIX, topic)
}

/// Build a page seal-timestamp key.
pub fn page_ts_key(topic: &str, page_end_id: i64) -> String {
    format!("{}{}/{}", PAGE_TS_PREFIX, topic, encode_id(page_end_id))
}

/// Prefix covering every page seal-timestamp key for a topic.
pub fn page_ts_prefix(topic: &str) -> String {
    format!("{}{}/", PAGE_TS_PREFIX, topic)
}

/// Build a page ack-timestamp key.
pub fn acked_ts_key(topic: &str, page_end_id: i64) -> String {
    format!("{}{}/{}", ACKED_TS_PREFIX, topic, encode_id(page_end_id))
}

/// Prefix covering every page ack-timestamp key for a topic.
pub fn acked_ts_prefix(topic: &str) -> String {
    format!("{}{}/", ACKED_TS_PREFIX, topic)
}

/// Parse the trailing `pageEndId` component out of a `metaName/topic/pageId`
/// style key. Mirrors the original `parsePageID` helper: reject anything
/// that doesn't split into exactly 3 `/`-separated components (topic
/// names are already validated to never contain `/`, so this is a sanity
/// check, not a parser for arbitrary topic names).
pub fn parse_page_end_id(key: &str) -> Option<i64> {
    let parts: Vec<&str> = key.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    decode_id(parts[2])
}

/// Parse the trailing message id out of a payload key (`<topic>/<msgId>`).
pub fn parse_payload_id(key: &str) -> Option<i64> {
    let idx = key.rfind(PAYLOAD_SUFFIX_SEP)?;
    decode_id(&key[idx + 1..])
}

/// Return the lexicographically-next string strictly greater than `s`:
/// the final byte incremented, or `s` with a trailing `0x00` byte if the
/// final byte is `0xFF`. Used to form exclusive upper bounds for prefix
/// scans (spec §4.A, GLOSSARY `AddOne`).
pub fn add_one(s: &str) -> Vec<u8> {
    let mut bytes = s.as_bytes().to_vec();
    match bytes.last_mut() {
        Some(b) if *b != 0xFF => {
            *b += 1;
            bytes
        }
        Some(_) => {
            bytes.push(0x00);
            bytes
        }
        None => vec![0x00],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_key_roundtrips_id() {
        let key = payload_key("t1", 42);
        assert_eq!(key, format!("t1/{}", encode_id(42)));
        assert_eq!(parse_payload_id(&key), Some(42));
    }

    #[test]
    fn encode_id_preserves_numeric_order_lexicographically() {
        let mut ids = vec![9, 10, 2, 100, 0];
        let mut encoded: Vec<String> = ids.iter().map(|&i| encode_id(i)).collect();
        encoded.sort();
        ids.sort();
        let decoded: Vec<i64> = encoded.iter().map(|s| decode_id(s).unwrap()).collect();
        assert_eq!(decoded, ids);
    }

    #[test]
    fn page_message_size_key_has_three_components_like_go_parsepageid() {
        let key = page_message_size_key("topicA", 7);
        assert_eq!(parse_page_end_id(&key), Some(7));
    }

    #[test]
    fn parse_page_end_id_rejects_wrong_component_count() {
        assert_eq!(parse_page_end_id("a/b"), None);
        assert_eq!(parse_page_end_id("a/b/c/d"), None);
    }

    #[test]
    fn add_one_increments_final_byte() {
        let next = add_one("abc");
        assert_eq!(next, b"abd".to_vec());
    }

    #[test]
    fn add_one_appends_zero_byte_on_0xff_tail() {
        let s = unsafe { String::from_utf8_unchecked(vec![0xFF]) };
        let next = add_one(&s);
        assert_eq!(next, vec![0xFF, 0x00]);
    }

    #[test]
    fn add_one_is_strictly_greater_for_prefix_upper_bound() {
        let prefix = payload_prefix("topic");
        let upper = add_one(&prefix);
        assert!(prefix.as_bytes() < upper.as_slice());
        // every key with this prefix must sort below the upper bound
        let sample = payload_key("topic", i64::MAX);
        assert!(sample.as_bytes() < upper.as_slice());
    }

    proptest::proptest! {
        /// `AddOne` must be a strict upper bound for any ASCII string
        /// (spec §4.A: used to form exclusive upper bounds for prefix
        /// scans; GLOSSARY `AddOne`).
        #[test]
        fn add_one_is_always_strictly_greater(s in "[ -~]{0,64}") {
            let next = add_one(&s);
            proptest::prop_assert!(next.as_slice() > s.as_bytes());
        }

        /// Every key formed by appending more characters after a prefix
        /// must still sort below that prefix's `AddOne`, i.e. `AddOne`
        /// is a valid exclusive bound for the whole prefix range, not
        /// just for the prefix string itself.
        #[test]
        fn add_one_bounds_every_extension_of_the_prefix(
            prefix in "[ -~]{1,32}",
            suffix in "[ -~]{0,32}",
        ) {
            let upper = add_one(&prefix);
            let extended = format!("{prefix}{suffix}");
            proptest::prop_assert!(extended.as_bytes() < upper.as_slice());
        }
    }
}
