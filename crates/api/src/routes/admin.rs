//! Administrative endpoints: full and single-view rebuilds, rebuild status.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use document_store::DocumentStore;
use serde::Serialize;
use view_engine::{RebuildAllReport, ViewRebuildReport, ViewStatus};

use super::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewListResponse {
    pub view_names: Vec<String>,
}

/// GET /admin/views — names of all configured views.
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<ViewListResponse> {
    Json(ViewListResponse {
        view_names: state.engine.view_names(),
    })
}

/// POST /admin/rebuild — rebuilds every view and reports per-view results.
#[tracing::instrument(skip(state))]
pub async fn rebuild_all<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<RebuildAllReport> {
    Json(state.engine.rebuild_all().await)
}

/// POST /admin/views/{name}/rebuild — rebuilds one view.
#[tracing::instrument(skip(state))]
pub async fn rebuild_view<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<ViewRebuildReport>, ApiError> {
    Ok(Json(state.engine.rebuild_view_report(&name).await?))
}

/// GET /admin/views/{name}/status — current rebuild state of a view.
#[tracing::instrument(skip(state))]
pub async fn status<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<ViewStatus>, ApiError> {
    Ok(Json(state.engine.status(&name).await?))
}
