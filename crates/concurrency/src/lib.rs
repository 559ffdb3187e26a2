//! Per-topic lock table, id allocator, and consumer registry (spec
//! §4.B–§4.D).

pub mod error;
pub mod id_allocator;
pub mod registry;
pub mod topic_locks;

pub use error::AllocatorError;
pub use id_allocator::IdAllocator;
pub use registry::{ConsumerHandle, ConsumerRegistry};
pub use topic_locks::TopicLocks;
