//! Domain types shared across the rocksmq core (spec §3).

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Sentinel consumer-group position meaning "before any message".
pub const SENTINEL_POSITION: i64 = -1;

/// String→string property map attached to a message.
///
/// Canonical JSON object with string keys and string values (spec §6).
pub type Properties = HashMap<String, String>;

/// A single message as seen by a consumer: immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic-monotonic, strictly increasing message id.
    pub id: i64,
    /// Opaque payload bytes. An empty payload is represented as `None`
    /// (spec §4.F: "an empty payload is represented as a nil payload").
    pub payload: Option<Vec<u8>>,
    /// Property map. Empty/absent properties are represented as `None`.
    pub properties: Option<Properties>,
}

/// A message as submitted by a producer, prior to id assignment.
#[derive(Debug, Clone, Default)]
pub struct ProducerMessage {
    /// Payload bytes.
    pub payload: Vec<u8>,
    /// Property map (may be empty).
    pub properties: Properties,
}

impl ProducerMessage {
    /// Construct a message from payload bytes with no properties.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            properties: Properties::new(),
        }
    }

    /// Construct a message from payload bytes and a property map.
    pub fn with_properties(payload: impl Into<Vec<u8>>, properties: Properties) -> Self {
        Self {
            payload: payload.into(),
            properties,
        }
    }
}

/// Validate a topic name: must not contain the reserved path separator
/// `/` (spec §3, §4.F, §8 boundary behaviors).
pub fn validate_topic_name(topic: &str) -> Result<()> {
    if topic.contains('/') {
        return Err(Error::InvalidName(topic.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_topic_names_with_slash() {
        assert!(validate_topic_name("bad/name").is_err());
    }

    #[test]
    fn accepts_plain_topic_names() {
        assert!(validate_topic_name("t1").is_ok());
    }
}
