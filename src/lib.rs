//! # rocksmq
//!
//! An embedded, single-process, disk-durable publish/subscribe message
//! queue backed by an ordered key-value store.
//!
//! Topics are named, ordered, append-only message streams; consumer
//! groups are named cursors into one topic; a background retention
//! worker reclaims space from fully-acknowledged message pages. See the
//! crate-level docs on [`Broker`] for the full operation set.
//!
//! # Quick start
//!
//! ```no_run
//! use rocksmq::{Broker, Config, ProducerMessage};
//!
//! fn main() -> rocksmq::Result<()> {
//!     let broker = Broker::open("./data", Config::default())?;
//!
//!     broker.create_topic("orders")?;
//!     broker.create_consumer_group("orders", "billing")?;
//!
//!     broker.produce("orders", vec![ProducerMessage::new(b"order-1".to_vec())])?;
//!
//!     let msgs = broker.consume("orders", "billing", 10)?;
//!     assert_eq!(msgs.len(), 1);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Crate | Responsibility |
//! |---|---|
//! | `rmq-core` | error taxonomy, domain types, key-space layout, config |
//! | `rmq-storage` | ordered KV store adapter + write-ahead log |
//! | `rmq-concurrency` | per-topic locks, id allocator, consumer registry |
//! | `rmq-engine` | page accountant, broker engine, retention worker |
//!
//! Internal crates are not exposed directly; this crate re-exports the
//! stable embedding surface (spec §6).

pub use rmq_core::{
    decode_properties, encode_properties, validate_topic_name, Config, ConfigError,
    DurabilityMode, Error, Message, ProducerMessage, Properties, Result, SENTINEL_POSITION,
};
pub use rmq_engine::{Broker, BrokerState, PageAccountant, SealedPage};
pub use rmq_concurrency::ConsumerHandle;

pub mod lazy;

pub use lazy::LazyBroker;
