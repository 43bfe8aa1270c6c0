//! Recursive-descent resolution of source trees against a document store.

use document_store::{Document, DocumentQuery, DocumentRef, DocumentStore, Predicate, Result, matches};
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::item::{ResolvedItem, items_to_value};
use crate::source::{MapContext, Projection, Query, RowSink, Source};
use crate::view::{SummaryContext, SummarySource};

/// Which documents the query at the bottom of a (sub)tree reads.
#[derive(Debug, Clone)]
enum Scope {
    /// Every document matching the query.
    All,
    /// The single document with this id, if it matches the query.
    Id(String),
    /// Every document matching the query and this extra condition.
    Linked(Predicate),
}

/// Resolves source trees for one view.
///
/// Reads are issued sequentially and are not transactional; each item is
/// a point-in-time read.
pub struct Resolver<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    view: &'a str,
}

impl<'a, S: DocumentStore + ?Sized> Resolver<'a, S> {
    /// Creates a resolver reading from `store` on behalf of `view`.
    pub fn new(store: &'a S, view: &'a str) -> Self {
        Self { store, view }
    }

    /// Resolves `source` into a flat, ordered list of items.
    pub async fn resolve(&self, source: &Source) -> Result<Vec<ResolvedItem>> {
        self.resolve_scoped(source, Scope::All, None).await
    }

    /// Resolves a summary source and keeps the rows its filter accepts.
    pub async fn resolve_summary(
        &self,
        summary: &SummarySource,
        primary: &[ResolvedItem],
    ) -> Result<Vec<ResolvedItem>> {
        let mut rows = self.resolve(&summary.source).await?;
        if let Some(filter) = &summary.filter {
            let ctx = SummaryContext {
                view: self.view,
                items: primary,
            };
            rows.retain(|row| filter(row, &ctx));
        }
        Ok(rows)
    }

    fn resolve_scoped<'b>(
        &'b self,
        source: &'b Source,
        scope: Scope,
        parent: Option<&'b ResolvedItem>,
    ) -> BoxFuture<'b, Result<Vec<ResolvedItem>>> {
        Box::pin(async move {
            match source {
                Source::Plain(query) => self.resolve_query(query, scope, parent).await,
                Source::Joined { base, join } => {
                    let mut items = self.resolve_scoped(base, scope, parent).await?;
                    for item in &mut items {
                        let joined = self
                            .resolve_scoped(join, Scope::Id(item.id().to_string()), Some(&*item))
                            .await?;
                        if let Some(target) = joined.first() {
                            item.merge_fields(target.fields());
                        }
                    }
                    Ok(items)
                }
                Source::Merged { base, field, merge } => {
                    let mut items = self.resolve_scoped(base, scope, parent).await?;
                    for item in &mut items {
                        let Some(target_id) = item.get(field).as_ref().and_then(merge_target_id)
                        else {
                            tracing::debug!(view = self.view, item = item.id(), %field, "no merge target");
                            continue;
                        };
                        let merged = self
                            .resolve_scoped(merge, Scope::Id(target_id), Some(&*item))
                            .await?;
                        if let Some(target) = merged.first() {
                            item.merge_fields(target.fields());
                        }
                    }
                    Ok(items)
                }
                Source::WithAdds { base, adds } => {
                    let mut items = self.resolve_scoped(base, scope, parent).await?;
                    for item in &mut items {
                        for (name, add) in adds {
                            let scope = match add.link.predicate_for(item) {
                                Some(predicate) => Scope::Linked(predicate),
                                None => Scope::All,
                            };
                            let rows = self.resolve_scoped(&add.source, scope, Some(&*item)).await?;
                            item.set(name.clone(), items_to_value(&rows));
                        }
                    }
                    Ok(items)
                }
            }
        })
    }

    async fn resolve_query(
        &self,
        query: &Query,
        scope: Scope,
        parent: Option<&ResolvedItem>,
    ) -> Result<Vec<ResolvedItem>> {
        let docs = match scope {
            Scope::Id(id) => {
                let doc = self.store.get(&query.collection, &id).await?;
                doc.filter(|d| matches(Some(d), &query.predicates))
                    .into_iter()
                    .collect()
            }
            Scope::All => self.store.query(&document_query(query, None)).await?,
            Scope::Linked(predicate) => {
                self.store
                    .query(&document_query(query, Some(predicate)))
                    .await?
            }
        };

        let ctx = MapContext {
            view: self.view,
            parent,
        };
        Ok(project(&query.projection, &docs, &ctx))
    }
}

fn document_query(query: &Query, extra: Option<Predicate>) -> DocumentQuery {
    DocumentQuery::collection(&query.collection)
        .filters(query.predicates.iter().cloned())
        .filters(extra)
        .maybe_order(query.order.clone())
        .maybe_limit(query.limit)
}

/// Accepts a plain id string or a reference value.
fn merge_target_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        other => DocumentRef::from_value(other).map(|r| r.id().to_string()),
    }
}

fn project(projection: &Projection, docs: &[Document], ctx: &MapContext<'_>) -> Vec<ResolvedItem> {
    match projection {
        Projection::All => docs.iter().map(ResolvedItem::from_document).collect(),
        Projection::Fields(names) => docs
            .iter()
            .map(|doc| {
                let fields = names
                    .iter()
                    .filter_map(|name| doc.get(name).map(|v| (name.clone(), v.clone())))
                    .collect();
                ResolvedItem::new(doc.reference().clone(), fields)
            })
            .collect(),
        Projection::Custom(mapper) => {
            let mut rows = Vec::with_capacity(docs.len());
            for (index, doc) in docs.iter().enumerate() {
                let mut sink = RowSink::new(doc.reference().clone());
                if let Some(fields) = mapper(doc, index, ctx, &mut sink) {
                    rows.push(ResolvedItem::new(doc.reference().clone(), fields));
                }
                rows.extend(sink.into_rows());
            }
            rows
        }
    }
}
