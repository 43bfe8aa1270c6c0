use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{Document, DocumentQuery, DocumentRef, Result};

/// Options for writing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// When false, the new fields are merged into the existing document
    /// instead of replacing it.
    pub overwrite: bool,
}

impl SetOptions {
    /// Replace the whole document.
    pub fn overwrite() -> Self {
        Self { overwrite: true }
    }

    /// Merge top-level fields into the existing document.
    pub fn merge() -> Self {
        Self { overwrite: false }
    }
}

impl Default for SetOptions {
    fn default() -> Self {
        Self::overwrite()
    }
}

/// Core trait for document store implementations.
///
/// Individual document writes are atomic; there is no cross-document
/// transaction. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Runs a filtered, ordered, limited query over one collection.
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>>;

    /// Reads a single document.
    ///
    /// Returns None if the document doesn't exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Writes a document.
    async fn set(
        &self,
        collection: &str,
        id: &str,
        value: Map<String, Value>,
        options: SetOptions,
    ) -> Result<()>;

    /// Deletes a document. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Lists references to every document of a collection, ordered by id.
    async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentRef>>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Checks whether a document exists.
    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }

    /// Writes a document from a JSON value, replacing any existing one.
    ///
    /// Non-object values are stored as an empty document.
    async fn put(&self, collection: &str, id: &str, value: Value) -> Result<()> {
        let data = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.set(collection, id, data, SetOptions::overwrite()).await
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        (**self).query(query).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        (**self).get(collection, id).await
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        value: Map<String, Value>,
        options: SetOptions,
    ) -> Result<()> {
        (**self).set(collection, id, value, options).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        (**self).delete(collection, id).await
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentRef>> {
        (**self).list_documents(collection).await
    }
}
