//! Unknown face review endpoints

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use vap_common::models::UnknownFaceEntry;

use crate::api::JsonBody;
use crate::error::{Error, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: String,
}

fn parse_entry_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| Error::EntryNotFound(id.to_string()))
}

/// GET /api/unknown-faces
pub async fn list_unknown_faces(
    State(state): State<AppState>,
) -> Result<Json<Vec<UnknownFaceEntry>>> {
    Ok(Json(state.unknown_faces.list().await?))
}

/// PUT /api/unknown-faces/:id/review
pub async fn mark_reviewed(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UnknownFaceEntry>> {
    let id = parse_entry_id(&id)?;
    Ok(Json(state.unknown_faces.mark_reviewed(id).await?))
}

/// PUT /api/unknown-faces/:id/flag
pub async fn toggle_flag(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UnknownFaceEntry>> {
    let id = parse_entry_id(&id)?;
    Ok(Json(state.unknown_faces.toggle_flag(id).await?))
}

/// PUT /api/unknown-faces/:id/notes
pub async fn set_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<NotesRequest>,
) -> Result<Json<UnknownFaceEntry>> {
    let id = parse_entry_id(&id)?;
    Ok(Json(state.unknown_faces.set_notes(id, &request.notes).await?))
}

/// Build unknown face routes
pub fn unknown_face_routes() -> Router<AppState> {
    Router::new()
        .route("/api/unknown-faces", get(list_unknown_faces))
        .route("/api/unknown-faces/:id/review", put(mark_reviewed))
        .route("/api/unknown-faces/:id/flag", put(toggle_flag))
        .route("/api/unknown-faces/:id/notes", put(set_notes))
}
