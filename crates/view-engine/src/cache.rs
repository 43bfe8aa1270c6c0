//! Persists view pages and summaries to the cache collection.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use document_store::{Document, DocumentStore, Result, SetOptions};
use serde_json::{Map, Value};

use crate::item::{ResolvedItem, items_to_value};
use crate::paginate::{group_by_item_id, paginate};
use crate::view::PAGE_COUNT_FIELD;

/// Field holding a page's rows.
pub const ITEMS_FIELD: &str = "items";

/// Cache document key for page `n` of `view`.
pub fn page_key(view: &str, n: usize) -> String {
    format!("{view}_page{n}")
}

/// Cache document key for the summary of `view`.
pub fn summary_key(view: &str) -> String {
    format!("{view}_summary")
}

/// Page number encoded in `key` when it names a page of `view`.
fn page_number(view: &str, key: &str) -> Option<usize> {
    let digits = key.strip_prefix(view)?.strip_prefix("_page")?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn page_document(items: impl IntoIterator<Item = Value>) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert(ITEMS_FIELD.to_string(), Value::Array(items.into_iter().collect()));
    doc
}

/// Writes and reads the cache documents of views.
pub struct CacheWriter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    collection: &'a str,
}

impl<'a, S: DocumentStore + ?Sized> CacheWriter<'a, S> {
    /// Creates a writer targeting `collection`.
    pub fn new(store: &'a S, collection: &'a str) -> Self {
        Self { store, collection }
    }

    /// Writes ordinal pages of `items`, then the summary, then deletes
    /// pages left over from a larger previous rebuild.
    ///
    /// Returns the number of pages written.
    pub async fn write_pages(
        &self,
        view: &str,
        items: &[ResolvedItem],
        page_size: NonZeroUsize,
        summaries: &[(String, Vec<ResolvedItem>)],
    ) -> Result<usize> {
        let pages = paginate(items, page_size);
        for page in &pages {
            let doc = page_document(page.items.iter().map(ResolvedItem::to_value));
            self.store
                .set(self.collection, &page_key(view, page.number), doc, SetOptions::overwrite())
                .await?;
            metrics::counter!("views_pages_written_total").increment(1);
        }

        let page_count = pages.len();
        self.write_summary(view, page_count, summaries).await?;

        for reference in self.store.list_documents(self.collection).await? {
            if page_number(view, reference.id()).is_some_and(|n| n > page_count) {
                tracing::debug!(view, key = reference.id(), "deleting stale page");
                self.store.delete(self.collection, reference.id()).await?;
            }
        }
        Ok(page_count)
    }

    /// Writes one document per item id to the collection named after
    /// `view`, then the summary, then deletes documents of ids that no
    /// longer appear.
    ///
    /// Returns the number of item documents written.
    pub async fn write_item_documents(
        &self,
        view: &str,
        items: &[ResolvedItem],
        summaries: &[(String, Vec<ResolvedItem>)],
    ) -> Result<usize> {
        let groups = group_by_item_id(items);
        for (id, rows) in &groups {
            let doc = page_document(rows.iter().map(|row| row.to_value()));
            self.store.set(view, id, doc, SetOptions::overwrite()).await?;
            metrics::counter!("views_pages_written_total").increment(1);
        }

        let count = groups.len();
        self.write_summary(view, count, summaries).await?;

        let current: BTreeSet<&str> = groups.iter().map(|(id, _)| *id).collect();
        for reference in self.store.list_documents(view).await? {
            if !current.contains(reference.id()) {
                tracing::debug!(view, id = reference.id(), "deleting stale item document");
                self.store.delete(view, reference.id()).await?;
            }
        }
        Ok(count)
    }

    async fn write_summary(
        &self,
        view: &str,
        page_count: usize,
        summaries: &[(String, Vec<ResolvedItem>)],
    ) -> Result<()> {
        let mut doc = Map::new();
        doc.insert(PAGE_COUNT_FIELD.to_string(), Value::from(page_count));
        for (name, rows) in summaries {
            doc.insert(name.clone(), items_to_value(rows));
        }
        self.store
            .set(self.collection, &summary_key(view), doc, SetOptions::overwrite())
            .await
    }

    /// Reads page `n` of `view`.
    pub async fn read_page(&self, view: &str, n: usize) -> Result<Option<Document>> {
        self.store.get(self.collection, &page_key(view, n)).await
    }

    /// Reads the summary of `view`.
    pub async fn read_summary(&self, view: &str) -> Result<Option<Document>> {
        self.store.get(self.collection, &summary_key(view)).await
    }

    /// Reads the item document for `id` of an item-keyed `view`.
    pub async fn read_item(&self, view: &str, id: &str) -> Result<Option<Document>> {
        self.store.get(view, id).await
    }
}
