//! Rebuild orchestration with per-view generation tracking.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use document_store::DocumentStore;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::cache::CacheWriter;
use crate::config::EngineConfig;
use crate::resolver::Resolver;
use crate::view::ViewDefinition;
use crate::{Result, ViewError};

/// Identifies one rebuild request of a view. Only the newest may commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation before any rebuild was requested.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the next generation.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "generation({})", self.0)
    }
}

/// Where a view's newest rebuild currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildPhase {
    #[default]
    Idle,
    Resolving,
    Paginating,
    Writing,
    Failed,
}

/// Observable rebuild state of one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStatus {
    pub view: String,
    pub phase: RebuildPhase,
    /// Newest generation requested.
    pub requested: Generation,
    /// Generation of the last successful commit.
    pub committed: Generation,
    pub committed_at: Option<DateTime<Utc>>,
    pub page_count: Option<usize>,
    pub item_count: Option<usize>,
    pub last_error: Option<String>,
}

impl ViewStatus {
    fn new(view: &str) -> Self {
        Self {
            view: view.to_string(),
            phase: RebuildPhase::Idle,
            requested: Generation::zero(),
            committed: Generation::zero(),
            committed_at: None,
            page_count: None,
            item_count: None,
            last_error: None,
        }
    }
}

/// Result of a rebuild that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The cache now reflects this generation.
    Committed {
        generation: Generation,
        item_count: usize,
        page_count: usize,
    },
    /// A newer rebuild was requested before this one could commit; its
    /// result was discarded.
    Superseded { generation: Generation },
}

impl RebuildOutcome {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RebuildOutcome::Committed { .. } => "committed",
            RebuildOutcome::Superseded { .. } => "superseded",
        }
    }

    pub fn generation(&self) -> Generation {
        match self {
            RebuildOutcome::Committed { generation, .. }
            | RebuildOutcome::Superseded { generation } => *generation,
        }
    }
}

struct ViewSlot {
    definition: ViewDefinition,
    requested: AtomicU64,
    commit: Mutex<()>,
    status: RwLock<ViewStatus>,
}

impl ViewSlot {
    fn new(definition: ViewDefinition) -> Self {
        let status = ViewStatus::new(&definition.name);
        Self {
            definition,
            requested: AtomicU64::new(0),
            commit: Mutex::new(()),
            status: RwLock::new(status),
        }
    }

    fn begin(&self) -> Generation {
        Generation(self.requested.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_newest(&self, generation: Generation) -> bool {
        self.requested.load(Ordering::SeqCst) == generation.0
    }

    async fn set_phase(&self, generation: Generation, phase: RebuildPhase) {
        let mut status = self.status.write().await;
        status.requested = status.requested.max(generation);
        if self.is_newest(generation) {
            status.phase = phase;
        }
    }

    async fn fail(&self, generation: Generation, error: String) {
        let mut status = self.status.write().await;
        if self.is_newest(generation) {
            status.phase = RebuildPhase::Failed;
            status.last_error = Some(error);
        }
    }

    async fn commit(&self, generation: Generation, item_count: usize, page_count: usize) {
        let mut status = self.status.write().await;
        status.committed = generation;
        status.committed_at = Some(Utc::now());
        status.item_count = Some(item_count);
        status.page_count = Some(page_count);
        status.last_error = None;
        if self.is_newest(generation) {
            status.phase = RebuildPhase::Idle;
        }
    }
}

/// Runs full rebuilds of views: resolve, paginate, write.
///
/// Overlapping rebuilds of one view may run concurrently. Each takes a
/// new generation; the write phase runs under the view's commit lock and
/// only when the generation is still the newest requested.
pub struct RebuildOrchestrator<S: DocumentStore> {
    store: S,
    config: EngineConfig,
    slots: BTreeMap<String, ViewSlot>,
}

impl<S: DocumentStore> RebuildOrchestrator<S> {
    /// Validates every view and creates the orchestrator.
    pub fn new(store: S, config: EngineConfig, views: Vec<ViewDefinition>) -> Result<Self> {
        let mut slots = BTreeMap::new();
        for view in views {
            view.validate()?;
            if slots.contains_key(&view.name) {
                return Err(ViewError::configuration(&view.name, "duplicate view name"));
            }
            slots.insert(view.name.clone(), ViewSlot::new(view));
        }
        Ok(Self {
            store,
            config,
            slots,
        })
    }

    /// Names of all configured views, sorted.
    pub fn view_names(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    /// Definition of `name`.
    pub fn definition(&self, name: &str) -> Option<&ViewDefinition> {
        self.slots.get(name).map(|slot| &slot.definition)
    }

    /// Every configured view definition, sorted by name.
    pub fn definitions(&self) -> impl Iterator<Item = &ViewDefinition> {
        self.slots.values().map(|slot| &slot.definition)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current rebuild state of `name`.
    pub async fn status(&self, name: &str) -> Result<ViewStatus> {
        let slot = self.slot(name)?;
        Ok(slot.status.read().await.clone())
    }

    fn slot(&self, name: &str) -> Result<&ViewSlot> {
        self.slots
            .get(name)
            .ok_or_else(|| ViewError::UnknownView(name.to_string()))
    }

    /// Fully rebuilds the cache of `name`.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild(&self, name: &str) -> Result<RebuildOutcome> {
        let slot = self.slot(name)?;
        let generation = slot.begin();
        let started = Instant::now();

        let result = self.run(slot, generation).await;

        metrics::histogram!("views_rebuild_duration_seconds", "view" => name.to_string())
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                metrics::counter!(
                    "views_rebuilds_total",
                    "view" => name.to_string(),
                    "outcome" => outcome.as_str()
                )
                .increment(1);
                match outcome {
                    RebuildOutcome::Committed {
                        item_count,
                        page_count,
                        ..
                    } => tracing::info!(%generation, item_count, page_count, "view rebuilt"),
                    RebuildOutcome::Superseded { .. } => {
                        tracing::debug!(%generation, "rebuild superseded by a newer request")
                    }
                }
            }
            Err(e) => {
                metrics::counter!(
                    "views_rebuilds_total",
                    "view" => name.to_string(),
                    "outcome" => "failed"
                )
                .increment(1);
                tracing::error!(view = name, %generation, error = %e, "rebuild failed");
                slot.fail(generation, e.to_string()).await;
            }
        }

        result
    }

    async fn run(&self, slot: &ViewSlot, generation: Generation) -> Result<RebuildOutcome> {
        let view = &slot.definition;
        view.validate()?;

        slot.set_phase(generation, RebuildPhase::Resolving).await;
        let resolution_error = |source| ViewError::Resolution {
            view: view.name.clone(),
            source,
        };
        let resolver = Resolver::new(&self.store, &view.name);
        let items = resolver
            .resolve(&view.source)
            .await
            .map_err(resolution_error)?;
        let mut summaries = Vec::with_capacity(view.summaries.len());
        for summary in &view.summaries {
            let rows = resolver
                .resolve_summary(summary, &items)
                .await
                .map_err(resolution_error)?;
            summaries.push((summary.name.clone(), rows));
        }

        slot.set_phase(generation, RebuildPhase::Paginating).await;
        let _commit = slot.commit.lock().await;
        if !slot.is_newest(generation) {
            return Ok(RebuildOutcome::Superseded { generation });
        }

        slot.set_phase(generation, RebuildPhase::Writing).await;
        let writer = CacheWriter::new(&self.store, self.config.cache_collection());
        let written = if view.use_item_id_as_document_id {
            writer
                .write_item_documents(&view.name, &items, &summaries)
                .await
        } else {
            writer
                .write_pages(&view.name, &items, self.config.page_size(), &summaries)
                .await
        };
        let page_count = written.map_err(|source| ViewError::Write {
            view: view.name.clone(),
            source,
        })?;

        slot.commit(generation, items.len(), page_count).await;
        Ok(RebuildOutcome::Committed {
            generation,
            item_count: items.len(),
            page_count,
        })
    }
}
