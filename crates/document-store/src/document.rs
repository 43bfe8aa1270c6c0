use common::DocumentRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document read from the store: its address plus its JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Where the document lives.
    pub reference: DocumentRef,

    /// Top-level fields of the document.
    pub data: Map<String, Value>,
}

impl Document {
    /// Creates a document from its reference and payload.
    pub fn new(reference: DocumentRef, data: Map<String, Value>) -> Self {
        Self { reference, data }
    }

    /// Builds a document from a JSON value, which must be an object.
    ///
    /// Non-object values yield an empty payload.
    pub fn from_value(collection: &str, id: &str, value: Value) -> Self {
        let data = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(DocumentRef::new(collection, id), data)
    }

    /// Returns the document id.
    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        self.reference.collection()
    }

    /// Returns the stable reference to this document.
    pub fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    /// Returns the full payload.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Returns a single top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}
