//! Document writes that go through the engine.
//!
//! These endpoints make the server its own trigger source: each write is
//! applied to the store and the resulting before/after pair is routed to
//! the dependent views.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use document_store::{DocumentStore, SetOptions};
use serde::Serialize;
use serde_json::{Map, Value};
use view_engine::TriggerReport;

use super::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub id: String,
    pub trigger: TriggerReport,
}

async fn write<S: DocumentStore>(
    state: &AppState<S>,
    collection: &str,
    id: &str,
    data: Map<String, Value>,
) -> Result<TriggerReport, ApiError> {
    let store = state.engine.store();
    let before = store.get(collection, id).await?;
    store.set(collection, id, data, SetOptions::overwrite()).await?;
    let after = store
        .get(collection, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {collection}/{id} vanished")))?;

    metrics::counter!("api_documents_written_total", "collection" => collection.to_string())
        .increment(1);

    Ok(match before {
        Some(before) => state.engine.on_update(before, after).await,
        None => state.engine.on_create(after).await,
    })
}

/// POST /documents/{collection} — creates a document with a generated id.
#[tracing::instrument(skip(state, data))]
pub async fn create<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(collection): Path<String>,
    Json(data): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<WriteResponse>), ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let trigger = write(&state, &collection, &id, data).await?;
    Ok((StatusCode::CREATED, Json(WriteResponse { id, trigger })))
}

/// PUT /documents/{collection}/{id} — creates or replaces a document.
#[tracing::instrument(skip(state, data))]
pub async fn put<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((collection, id)): Path<(String, String)>,
    Json(data): Json<Map<String, Value>>,
) -> Result<Json<WriteResponse>, ApiError> {
    let trigger = write(&state, &collection, &id, data).await?;
    Ok(Json(WriteResponse { id, trigger }))
}

/// DELETE /documents/{collection}/{id} — deletes a document.
#[tracing::instrument(skip(state))]
pub async fn delete<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<WriteResponse>, ApiError> {
    let store = state.engine.store();
    let before = store
        .get(&collection, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {collection}/{id} not found")))?;
    store.delete(&collection, &id).await?;

    let trigger = state.engine.on_delete(before).await;
    Ok(Json(WriteResponse { id, trigger }))
}

/// GET /documents/{collection}/{id} — reads a source document.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    state
        .engine
        .store()
        .get(&collection, &id)
        .await?
        .map(|doc| Json(doc.data))
        .ok_or_else(|| ApiError::NotFound(format!("Document {collection}/{id} not found")))
}
