//! Document keys and versioned document snapshots.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Address of a document: a collection name plus an id unique within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocKey {
    /// Collection name (e.g. `"bugs"`).
    pub collection: String,
    /// Document id within the collection.
    pub id: String,
}

impl DocKey {
    /// Create a key for `id` in `collection`.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored document together with its version.
///
/// Versions come from a store-wide write counter, so every write gives the
/// document a strictly larger version and a document that is deleted and
/// re-created never repeats a version observed earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedDocument {
    /// Where the document lives.
    pub key: DocKey,
    /// Monotonic write counter for this document.
    pub version: u64,
    /// Document body; always a JSON object.
    pub data: Map<String, Value>,
}

impl VersionedDocument {
    /// Deserialize the document body into a typed record.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}

/// Serialize a typed record into a document body.
///
/// # Errors
///
/// Returns `Error::InvalidDocument` if `value` does not serialize to a JSON object.
pub fn encode<T: Serialize>(key: &DocKey, value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidDocument {
            key: key.clone(),
            reason: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Widget {
        name: String,
        size: u32,
    }

    #[test]
    fn test_doc_key_display() {
        assert_eq!(DocKey::new("bugs", "abc").to_string(), "bugs/abc");
    }

    #[test]
    fn test_encode_rejects_non_objects() {
        let key = DocKey::new("things", "1");
        let err = encode(&key, &json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, Error::InvalidDocument { .. }));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_decode_typed_record() {
        let key = DocKey::new("widgets", "w1");
        let widget = Widget {
            name: "gear".to_string(),
            size: 3,
        };
        let doc = VersionedDocument {
            key: key.clone(),
            version: 1,
            data: encode(&key, &widget).unwrap(),
        };
        assert_eq!(doc.decode::<Widget>().unwrap(), widget);
    }
}
