//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use document_store::DocumentStore;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub view_count: usize,
    pub watched_collections: Vec<String>,
}

/// GET /health — liveness plus the views and collections the engine serves.
pub async fn check<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        view_count: state.engine.view_names().len(),
        watched_collections: state.engine.router().collections().map(str::to_string).collect(),
    })
}
