use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::{
    Document, DocumentQuery, DocumentRef, Result,
    store::{DocumentStore, SetOptions},
};

type Collection = BTreeMap<String, Map<String, Value>>;

/// In-memory document store.
///
/// Documents are kept per collection in id order, so every read is
/// deterministic. Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Clears every collection.
    pub async fn clear(&self) {
        self.collections.write().await.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let candidates = docs.iter().map(|(id, data)| {
            Document::new(DocumentRef::new(&query.collection, id), data.clone())
        });
        Ok(query.apply(candidates))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document::new(DocumentRef::new(collection, id), data.clone())))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        value: Map<String, Value>,
        options: SetOptions,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        match docs.get_mut(id) {
            Some(existing) if !options.overwrite => existing.extend(value),
            _ => {
                docs.insert(id.to_string(), value);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentRef>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.keys()
                    .map(|id| DocumentRef::new(collection, id))
                    .collect()
            })
            .unwrap_or_default())
    }
}
