//! Session lifecycle endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use vap_common::models::Session;

use crate::api::JsonBody;
use crate::error::Result;
use crate::services::NewSession;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub session_id: Option<String>,
    pub marked_by: Option<String>,
    pub marked_by_name: Option<String>,
    pub department: Option<String>,
}

/// POST /api/sessions
///
/// 201 with the new session, or 200 with the existing one for a known `sessionId`.
pub async fn create_session(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>)> {
    let (session, created) = state
        .registry
        .create_or_get(NewSession {
            session_id: request.session_id.unwrap_or_default(),
            marked_by: request.marked_by,
            marked_by_name: request.marked_by_name,
            department: request.department,
        })
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(session)))
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<Session>>> {
    Ok(Json(state.registry.list().await?))
}

/// GET /api/sessions/:id (internal id or session id)
pub async fn get_session(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Session>> {
    Ok(Json(state.registry.require(&key).await?))
}

/// PUT /api/sessions/:id/end
pub async fn end_session(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Session>> {
    Ok(Json(state.registry.end(&key).await?))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/end", put(end_session))
}
