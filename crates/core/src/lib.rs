//! Core types shared across the rocksmq crates: error taxonomy, domain
//! types, key-space layout, properties encoding, and configuration.
//!
//! See `SPEC_FULL.md` §A for how this crate fits into the workspace.

pub mod config;
pub mod encoding;
pub mod error;
pub mod keys;
pub mod types;

pub use config::{Config, ConfigError, DurabilityMode};
pub use encoding::{decode_properties, encode_properties};
pub use error::{Error, Result};
pub use types::{
    validate_topic_name, Message, ProducerMessage, Properties, SENTINEL_POSITION,
};
