//! Reactive materialized-view cache engine.
//!
//! Views are declarative [`Source`] trees over collections of a
//! [`DocumentStore`](document_store::DocumentStore). The engine keeps a
//! paginated cache of every view in sync with the store:
//! - [`classify`] decides whether a document change affects a view
//! - [`Resolver`] evaluates a source tree into [`ResolvedItem`]s
//! - [`CacheWriter`] persists pages and summaries
//! - [`RebuildOrchestrator`] runs rebuilds with per-view generations
//! - [`TriggerRouter`] maps collections to the views reading them
//! - [`ViewEngine`] ties them together behind the trigger entry points

pub mod cache;
pub mod classify;
pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod item;
pub mod paginate;
pub mod rebuild;
pub mod resolver;
pub mod router;
pub mod source;
pub mod view;

pub use cache::{CacheWriter, page_key, summary_key};
pub use classify::{Classification, classify, classify_node};
pub use config::{DEFAULT_CACHE_COLLECTION, DEFAULT_PAGE_SIZE, EngineConfig};
pub use definition::{load_definitions, parse_definitions};
pub use engine::{
    ChangeEvent, RebuildAllReport, ReportStatus, TriggerReport, TriggeredView, ViewEngine,
    ViewRebuildReport,
};
pub use error::{Result, ViewError};
pub use item::ResolvedItem;
pub use paginate::{Page, page_count, paginate};
pub use rebuild::{Generation, RebuildOrchestrator, RebuildOutcome, RebuildPhase, ViewStatus};
pub use resolver::Resolver;
pub use router::{TriggerRouter, WatchedNode, build_trigger_router};
pub use source::{AddLink, AddSource, ChangeTest, MapContext, NodeRole, Projection, Query, RowSink, Source};
pub use view::{SummaryContext, SummarySource, ViewDefinition};
