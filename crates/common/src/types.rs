use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Key marking a reference value inside a JSON document payload.
///
/// A reference is encoded as `{"$ref": "collection/id"}`. Any other keys
/// on the same object (a hydrated copy of the target, for instance) are
/// ignored when comparing references.
pub const REF_KEY: &str = "$ref";

/// Stable, comparable address of a document: its collection plus its id.
///
/// Two references are equal when they point at the same document,
/// regardless of what payload either side carries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    collection: String,
    id: String,
}

impl DocumentRef {
    /// Creates a reference to `id` inside `collection`.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the document id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Encodes this reference as a JSON value suitable for storing in a document.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(REF_KEY.to_string(), Value::String(self.to_string()));
        Value::Object(map)
    }

    /// Decodes a reference from a JSON value, if it is one.
    ///
    /// Returns `None` for anything that is not an object carrying a
    /// well-formed `$ref` entry.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_object()?
            .get(REF_KEY)?
            .as_str()?
            .parse()
            .ok()
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Error returned when a `collection/id` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid document reference: {0:?}")]
pub struct ParseRefError(pub String);

impl FromStr for DocumentRef {
    type Err = ParseRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((collection, id))
                if !collection.is_empty() && !id.is_empty() && !id.contains('/') =>
            {
                Ok(Self::new(collection, id))
            }
            _ => Err(ParseRefError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_and_parse_agree() {
        let r = DocumentRef::new("assets", "a1");
        assert_eq!(r.to_string(), "assets/a1");
        assert_eq!("assets/a1".parse::<DocumentRef>().unwrap(), r);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("assets".parse::<DocumentRef>().is_err());
        assert!("/a1".parse::<DocumentRef>().is_err());
        assert!("assets/".parse::<DocumentRef>().is_err());
        assert!("a/b/c".parse::<DocumentRef>().is_err());
    }

    #[test]
    fn test_value_encoding_roundtrip() {
        let r = DocumentRef::new("users", "u7");
        assert_eq!(r.to_value(), json!({"$ref": "users/u7"}));
        assert_eq!(DocumentRef::from_value(&r.to_value()), Some(r));
    }

    #[test]
    fn test_from_value_ignores_hydrated_payload() {
        let value = json!({"$ref": "users/u7", "name": "Ada"});
        assert_eq!(
            DocumentRef::from_value(&value),
            Some(DocumentRef::new("users", "u7"))
        );
    }

    #[test]
    fn test_from_value_rejects_plain_values() {
        assert_eq!(DocumentRef::from_value(&json!("users/u7")), None);
        assert_eq!(DocumentRef::from_value(&json!({"id": "u7"})), None);
    }

    #[test]
    fn test_references_order_by_collection_then_id() {
        let a = DocumentRef::new("a", "2");
        let b = DocumentRef::new("b", "1");
        assert!(a < b);
        assert!(DocumentRef::new("a", "1") < a);
    }
}
