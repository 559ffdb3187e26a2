//! Page accountant, broker engine, and retention worker (spec §4.E–§4.G).
//!
//! This is the crate that ties the lower layers together: `rmq-storage`
//! for the ordered KV store, `rmq-concurrency` for per-topic locking,
//! id allocation, and consumer positions. [`Broker`] is the public
//! embedding API (spec §6); [`RetentionWorker`] is spawned by it and
//! owns its own background thread.

pub mod broker;
pub mod page_accountant;
pub mod retention;

pub use broker::{Broker, BrokerState};
pub use page_accountant::{PageAccountant, SealedPage};
pub use retention::RetentionWorker;
