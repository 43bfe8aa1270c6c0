//! Read endpoints for cached view documents.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use document_store::{Document, DocumentStore};
use serde_json::{Map, Value};

use super::AppState;
use crate::error::ApiError;

fn found(doc: Option<Document>, what: impl FnOnce() -> String) -> Result<Json<Map<String, Value>>, ApiError> {
    doc.map(|doc| Json(doc.data))
        .ok_or_else(|| ApiError::NotFound(what()))
}

/// GET /views/{name}/summary — the cached summary document.
#[tracing::instrument(skip(state))]
pub async fn summary<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let doc = state.engine.read_summary(&name).await?;
    found(doc, || format!("No summary cached for view {name}"))
}

/// GET /views/{name}/pages/{n} — a cached page, numbered from 1.
#[tracing::instrument(skip(state))]
pub async fn page<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((name, n)): Path<(String, usize)>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    if n == 0 {
        return Err(ApiError::BadRequest("Page numbers start at 1".to_string()));
    }
    let doc = state.engine.read_page(&name, n).await?;
    found(doc, || format!("Page {n} of view {name} not found"))
}

/// GET /views/{name}/items/{id} — the cached document of one item of an item-keyed view.
#[tracing::instrument(skip(state))]
pub async fn item<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let doc = state.engine.read_item(&name, &id).await?;
    found(doc, || format!("Item {id} of view {name} not found"))
}
