//! Settings endpoints
//!
//! Only `recognition_threshold` is writable; its value must lie in [0, 1].

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::JsonBody;
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct SetSettingResponse {
    pub success: bool,
    pub key: String,
    pub value: String,
}

/// GET /api/settings
pub async fn list_settings(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, String>>> {
    Ok(Json(state.settings.list().await?))
}

/// PUT /api/settings/:key
pub async fn set_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    JsonBody(request): JsonBody<SetSettingRequest>,
) -> Result<Json<SetSettingResponse>> {
    let value = state.settings.set(&key, &request.value).await?;
    Ok(Json(SetSettingResponse {
        success: true,
        key,
        value,
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/api/settings", get(list_settings))
        .route("/api/settings/:key", put(set_setting))
}
