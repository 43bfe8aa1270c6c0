//! Trigger webhook: the document store reports a change, the engine reacts.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use document_store::{Document, DocumentStore};
use serde::Deserialize;
use serde_json::{Map, Value};
use view_engine::{ChangeEvent, TriggerReport};

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// A document snapshot as sent by the trigger source.
#[derive(Debug, Deserialize)]
pub struct Snapshot {
    pub id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub kind: ChangeKind,
    pub before: Option<Snapshot>,
    pub after: Option<Snapshot>,
}

impl TriggerRequest {
    /// Checks that the snapshots fit the change kind and builds the event.
    pub fn into_event(self, collection: &str) -> Result<ChangeEvent, ApiError> {
        let to_doc = |snapshot: Snapshot| -> Result<Document, ApiError> {
            if snapshot.id.is_empty() {
                return Err(ApiError::BadRequest("Snapshot id must not be empty".to_string()));
            }
            Ok(Document::new(
                document_store::DocumentRef::new(collection, snapshot.id),
                snapshot.data,
            ))
        };

        match (self.kind, self.before, self.after) {
            (ChangeKind::Create, None, Some(after)) => Ok(ChangeEvent::created(to_doc(after)?)),
            (ChangeKind::Update, Some(before), Some(after)) => {
                if before.id != after.id {
                    return Err(ApiError::BadRequest(
                        "before and after must describe the same document".to_string(),
                    ));
                }
                Ok(ChangeEvent::updated(to_doc(before)?, to_doc(after)?))
            }
            (ChangeKind::Delete, Some(before), None) => Ok(ChangeEvent::deleted(to_doc(before)?)),
            (kind, _, _) => Err(ApiError::BadRequest(format!(
                "Invalid snapshots for a {kind:?} change: create needs after, update needs both, delete needs before"
            ))),
        }
    }
}

/// POST /triggers/{collection} — routes a reported change to the dependent views.
#[tracing::instrument(skip(state, req))]
pub async fn handle<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(collection): Path<String>,
    Json(req): Json<TriggerRequest>,
) -> Result<Json<TriggerReport>, ApiError> {
    let event = req.into_event(&collection)?;
    Ok(Json(state.engine.handle_change(event).await))
}
