//! Properties encoding: canonical JSON object with string keys and
//! string values (spec §6).

use crate::error::{Error, Result};
use crate::types::Properties;

/// Encode a property map to its canonical JSON representation.
pub fn encode_properties(props: &Properties) -> Result<Vec<u8>> {
    serde_json::to_vec(props).map_err(|e| Error::EncodingError(e.to_string()))
}

/// Decode a property map from JSON. An absent/empty byte slice decodes
/// to an empty map (spec §4.F: "empty map if absent").
pub fn decode_properties(bytes: &[u8]) -> Result<Properties> {
    if bytes.is_empty() {
        return Ok(Properties::new());
    }
    serde_json::from_slice(bytes).map_err(|e| Error::EncodingError(e.to_string()))
}
