//! Result rows produced by source resolution.

use document_store::{Document, DocumentRef};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// Field name carrying the item id in cached output.
pub const ID_FIELD: &str = "id";

/// Field name carrying the item reference in cached output.
pub const REF_FIELD: &str = "ref";

/// One row of a view: `{id, ref, ...fields}`.
///
/// Built fresh on every resolution. `id` and `ref` always come from the
/// source document and cannot be overwritten through the field setters.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedItem {
    reference: DocumentRef,
    fields: Map<String, Value>,
}

impl ResolvedItem {
    /// Creates an item for `reference`, dropping any `id`/`ref` keys from `fields`.
    pub fn new(reference: DocumentRef, mut fields: Map<String, Value>) -> Self {
        fields.remove(ID_FIELD);
        fields.remove(REF_FIELD);
        Self { reference, fields }
    }

    /// Creates an item carrying every field of `doc`.
    pub fn from_document(doc: &Document) -> Self {
        Self::new(doc.reference().clone(), doc.data().clone())
    }

    /// Id of the source document.
    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// Reference to the source document.
    pub fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    /// Projected, joined, and added fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Reads a field. `id` and `ref` are answered from the source reference.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            ID_FIELD => Some(Value::String(self.id().to_string())),
            REF_FIELD => Some(self.reference.to_value()),
            _ => self.fields.get(field).cloned(),
        }
    }

    /// Sets a field; `id` and `ref` are ignored.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field != ID_FIELD && field != REF_FIELD {
            self.fields.insert(field, value);
        }
    }

    /// Shallow-merges `other` into this item; incoming values win, `id`/`ref` are kept.
    pub fn merge_fields(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.set(key.clone(), value.clone());
        }
    }

    /// Flattens the item into a JSON object.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert(ID_FIELD.to_string(), Value::String(self.id().to_string()));
        map.insert(REF_FIELD.to_string(), self.reference.to_value());
        Value::Object(map)
    }
}

impl Serialize for ResolvedItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 2))?;
        map.serialize_entry(ID_FIELD, self.id())?;
        map.serialize_entry(REF_FIELD, &self.reference.to_value())?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Converts rows into a JSON array.
pub fn items_to_value(items: &[ResolvedItem]) -> Value {
    Value::Array(items.iter().map(ResolvedItem::to_value).collect())
}
