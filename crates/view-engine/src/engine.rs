//! The view engine facade: trigger entry points, rebuilds, and cache reads.

use std::collections::BTreeMap;
use std::time::Instant;

use document_store::{Document, DocumentStore};
use futures_util::future::join_all;
use serde::Serialize;

use crate::cache::CacheWriter;
use crate::classify::Classification;
use crate::config::EngineConfig;
use crate::rebuild::{Generation, RebuildOrchestrator, RebuildOutcome, ViewStatus};
use crate::router::{TriggerRouter, build_trigger_router};
use crate::view::ViewDefinition;
use crate::{Result, ViewError};

/// A document transition reported by the trigger source.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub collection: String,
    pub before: Option<Document>,
    pub after: Option<Document>,
}

impl ChangeEvent {
    pub fn created(after: Document) -> Self {
        Self {
            collection: after.collection().to_string(),
            before: None,
            after: Some(after),
        }
    }

    pub fn updated(before: Document, after: Document) -> Self {
        Self {
            collection: after.collection().to_string(),
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn deleted(before: Document) -> Self {
        Self {
            collection: before.collection().to_string(),
            before: Some(before),
            after: None,
        }
    }
}

/// How a single view rebuild ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Ok,
    Superseded,
    Error,
}

/// Serializable result of one view rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRebuildReport {
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<Generation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ViewRebuildReport {
    fn from_result(result: Result<RebuildOutcome>) -> Self {
        match result {
            Ok(RebuildOutcome::Committed {
                generation,
                item_count,
                page_count,
            }) => Self {
                status: ReportStatus::Ok,
                page_count: Some(page_count),
                item_count: Some(item_count),
                generation: Some(generation),
                error: None,
            },
            Ok(RebuildOutcome::Superseded { generation }) => Self {
                status: ReportStatus::Superseded,
                page_count: None,
                item_count: None,
                generation: Some(generation),
                error: None,
            },
            Err(e) => Self {
                status: ReportStatus::Error,
                page_count: None,
                item_count: None,
                generation: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ReportStatus::Error
    }
}

/// Result of the administrative "rebuild all" sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildAllReport {
    pub view_names: Vec<String>,
    pub views: BTreeMap<String, ViewRebuildReport>,
    pub time_seconds: f64,
}

/// What one dependent view made of a change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredView {
    pub view: String,
    pub classification: Classification,
    /// Present when the classification required a rebuild.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild: Option<ViewRebuildReport>,
}

/// Result of routing one change event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerReport {
    pub collection: String,
    pub views: Vec<TriggeredView>,
}

impl TriggerReport {
    /// Names of views that were rebuilt (or attempted).
    pub fn rebuilt_views(&self) -> Vec<&str> {
        self.views
            .iter()
            .filter(|v| v.rebuild.is_some())
            .map(|v| v.view.as_str())
            .collect()
    }
}

/// Keeps cached views in sync with the document store.
///
/// Shared across request handlers behind an `Arc`; every operation takes
/// `&self`.
pub struct ViewEngine<S: DocumentStore> {
    orchestrator: RebuildOrchestrator<S>,
    router: TriggerRouter,
}

/// An item-keyed view owns the collection named after it and deletes
/// whatever it did not write there, so that collection must not be read
/// by any view nor hold the cache.
fn check_item_collection(
    view: &ViewDefinition,
    router: &TriggerRouter,
    config: &EngineConfig,
) -> Result<()> {
    if view.name == config.cache_collection() {
        return Err(ViewError::configuration(
            &view.name,
            "item-keyed view must not be named after the cache collection",
        ));
    }
    let readers = router.dependents(&view.name);
    if !readers.is_empty() {
        return Err(ViewError::configuration(
            &view.name,
            format!(
                "item-keyed view collides with source collection {:?} read by {}",
                view.name,
                readers.join(", ")
            ),
        ));
    }
    Ok(())
}

impl<S: DocumentStore> ViewEngine<S> {
    /// Validates `views`, builds the routing table, and creates the engine.
    pub fn new(store: S, config: EngineConfig, views: Vec<ViewDefinition>) -> Result<Self> {
        let router = build_trigger_router(&views);
        for view in views.iter().filter(|v| v.use_item_id_as_document_id) {
            check_item_collection(view, &router, &config)?;
        }
        let orchestrator = RebuildOrchestrator::new(store, config, views)?;
        tracing::info!(
            views = orchestrator.view_names().len(),
            collections = router.collections().count(),
            "view engine ready"
        );
        Ok(Self {
            orchestrator,
            router,
        })
    }

    pub fn store(&self) -> &S {
        self.orchestrator.store()
    }

    pub fn config(&self) -> &EngineConfig {
        self.orchestrator.config()
    }

    pub fn router(&self) -> &TriggerRouter {
        &self.router
    }

    /// Names of all configured views, sorted.
    pub fn view_names(&self) -> Vec<String> {
        self.orchestrator.view_names()
    }

    /// Handles a document creation.
    pub async fn on_create(&self, after: Document) -> TriggerReport {
        self.handle_change(ChangeEvent::created(after)).await
    }

    /// Handles a document update.
    pub async fn on_update(&self, before: Document, after: Document) -> TriggerReport {
        self.handle_change(ChangeEvent::updated(before, after)).await
    }

    /// Handles a document deletion.
    pub async fn on_delete(&self, before: Document) -> TriggerReport {
        self.handle_change(ChangeEvent::deleted(before)).await
    }

    /// Classifies `event` for every dependent view and rebuilds the
    /// affected ones concurrently. One view failing does not affect the
    /// others; failures are reported per view.
    #[tracing::instrument(skip(self, event), fields(collection = %event.collection))]
    pub async fn handle_change(&self, event: ChangeEvent) -> TriggerReport {
        let classified: Vec<(&str, Classification)> = self
            .router
            .dependents(&event.collection)
            .into_iter()
            .map(|view| {
                let classification = self.router.classify(
                    view,
                    &event.collection,
                    event.before.as_ref(),
                    event.after.as_ref(),
                );
                metrics::counter!(
                    "views_changes_classified_total",
                    "classification" => classification.as_str()
                )
                .increment(1);
                tracing::debug!(view, %classification, "change classified");
                (view, classification)
            })
            .collect();

        let rebuilds = classified
            .iter()
            .filter(|(_, classification)| classification.requires_rebuild())
            .map(|(view, _)| async move {
                let result = self.orchestrator.rebuild(view).await;
                (*view, ViewRebuildReport::from_result(result))
            });
        let mut reports: BTreeMap<&str, ViewRebuildReport> =
            join_all(rebuilds).await.into_iter().collect();

        let views = classified
            .into_iter()
            .map(|(view, classification)| TriggeredView {
                view: view.to_string(),
                classification,
                rebuild: reports.remove(view),
            })
            .collect();

        TriggerReport {
            collection: event.collection,
            views,
        }
    }

    /// Rebuilds one view.
    pub async fn rebuild_view(&self, name: &str) -> Result<RebuildOutcome> {
        self.orchestrator.rebuild(name).await
    }

    /// Rebuilds one view and reports the result instead of failing.
    pub async fn rebuild_view_report(&self, name: &str) -> Result<ViewRebuildReport> {
        if self.orchestrator.definition(name).is_none() {
            return Err(ViewError::UnknownView(name.to_string()));
        }
        Ok(ViewRebuildReport::from_result(
            self.orchestrator.rebuild(name).await,
        ))
    }

    /// Rebuilds every view. A failing view is reported and never stops the sweep.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> RebuildAllReport {
        let started = Instant::now();
        let view_names = self.orchestrator.view_names();

        let results = join_all(view_names.iter().map(|name| async move {
            let result = self.orchestrator.rebuild(name).await;
            (name.clone(), ViewRebuildReport::from_result(result))
        }))
        .await;
        let views: BTreeMap<_, _> = results.into_iter().collect();

        let failed = views.values().filter(|r| r.is_error()).count();
        let time_seconds = started.elapsed().as_secs_f64();
        tracing::info!(views = views.len(), failed, time_seconds, "rebuild-all complete");

        RebuildAllReport {
            view_names,
            views,
            time_seconds,
        }
    }

    /// Current rebuild state of `name`.
    pub async fn status(&self, name: &str) -> Result<ViewStatus> {
        self.orchestrator.status(name).await
    }

    fn cache(&self, name: &str) -> Result<CacheWriter<'_, S>> {
        if self.orchestrator.definition(name).is_none() {
            return Err(ViewError::UnknownView(name.to_string()));
        }
        Ok(CacheWriter::new(
            self.orchestrator.store(),
            self.orchestrator.config().cache_collection(),
        ))
    }

    /// Reads cached page `n` of `name`.
    pub async fn read_page(&self, name: &str, n: usize) -> Result<Option<Document>> {
        Ok(self.cache(name)?.read_page(name, n).await?)
    }

    /// Reads the cached summary of `name`.
    pub async fn read_summary(&self, name: &str) -> Result<Option<Document>> {
        Ok(self.cache(name)?.read_summary(name).await?)
    }

    /// Reads the item document `id` of an item-keyed view.
    pub async fn read_item(&self, name: &str, id: &str) -> Result<Option<Document>> {
        Ok(self.cache(name)?.read_item(name, id).await?)
    }
}
