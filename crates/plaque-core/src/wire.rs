//! Decoding helpers for marketplace API payloads.
//!
//! Several response fields (`fields`, `sources`, `availableAdapters`,
//! `updatedFields`, `failedAdapters`) arrive either as a JSON-encoded string
//! or as an already-decoded array depending on the server path that produced
//! them. [`embedded`] accepts both shapes so response structs can declare the
//! decoded type directly.

use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `#[serde(deserialize_with = "crate::wire::embedded", default)]`
///
/// A JSON string is parsed as JSON; `null` and the empty string decode to
/// `T::default()`; any other value is decoded in place.
pub fn embedded<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    decode_embedded(value).map_err(D::Error::custom)
}

/// Same normalization as [`embedded`], for values already held as JSON.
pub fn decode_embedded<T>(value: Value) -> Result<T, serde_json::Error>
where
    T: DeserializeOwned + Default,
{
    match value {
        Value::Null => Ok(T::default()),
        Value::String(encoded) if encoded.trim().is_empty() => Ok(T::default()),
        Value::String(encoded) => serde_json::from_str(&encoded),
        other => serde_json::from_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Envelope {
        #[serde(deserialize_with = "embedded", default)]
        items: Vec<String>,
    }

    #[test]
    fn decodes_string_encoded_array() {
        let envelope: Envelope =
            serde_json::from_value(json!({ "items": "[\"siv\",\"histovec\"]" })).expect("decode");
        assert_eq!(envelope.items, vec!["siv", "histovec"]);
    }

    #[test]
    fn decodes_plain_array() {
        let envelope: Envelope =
            serde_json::from_value(json!({ "items": ["siv"] })).expect("decode");
        assert_eq!(envelope.items, vec!["siv"]);
    }

    #[test]
    fn missing_null_and_empty_decode_to_default() {
        for payload in [json!({}), json!({ "items": null }), json!({ "items": "" })] {
            let envelope: Envelope = serde_json::from_value(payload).expect("decode");
            assert!(envelope.items.is_empty());
        }
    }

    #[test]
    fn rejects_garbage_string() {
        let result = serde_json::from_value::<Envelope>(json!({ "items": "[not json" }));
        assert!(result.is_err());
    }
}
