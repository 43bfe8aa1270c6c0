//! HTTP route handlers.

pub mod admin;
pub mod documents;
pub mod health;
pub mod metrics;
pub mod triggers;
pub mod views;

use document_store::DocumentStore;
use view_engine::ViewEngine;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub engine: ViewEngine<S>,
}
