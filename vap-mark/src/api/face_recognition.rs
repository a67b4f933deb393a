//! Recognizer passthrough endpoints
//!
//! Enrollment and ad-hoc recognition go straight to the recognizer. None of
//! these touch the ledger or the unknown-face log.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::JsonBody;
use crate::error::{Error, Result};
use crate::services::{CaptureImage, RegisteredFaces};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeRequest {
    pub image: Option<String>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeResponse {
    pub success: bool,
    pub recognized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(alias = "student_id")]
    pub student_id: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub student_id: String,
    pub message: String,
}

fn decode_required(image: Option<String>) -> Result<CaptureImage> {
    let encoded = image
        .filter(|i| !i.trim().is_empty())
        .ok_or_else(|| Error::MissingInput("image is required".to_string()))?;
    CaptureImage::from_encoded(&encoded)
}

/// POST /api/face-recognition/recognize
pub async fn recognize(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RecognizeRequest>,
) -> Result<Json<RecognizeResponse>> {
    let image = decode_required(request.image)?;
    let threshold = state.settings.resolve_threshold(request.threshold).await?;
    let result = state.gateway.recognize(&image, Some(threshold)).await?;

    Ok(Json(RecognizeResponse {
        success: true,
        recognized: result.recognized,
        student_id: result.student_id,
        confidence: result.confidence,
    }))
}

/// POST /api/face-recognition/register
///
/// The student must exist in the directory before a face is enrolled.
pub async fn register_face(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    let student_id = request
        .student_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::MissingInput("studentId is required".to_string()))?;
    let image = decode_required(request.image)?;

    let student = state.students.get(&student_id).await?;
    state.gateway.register_face(&student.id, &image).await?;

    Ok(Json(RegisterResponse {
        success: true,
        message: format!("Face registered for {}", student.name),
        student_id: student.id,
    }))
}

/// GET /api/face-recognition/registered
pub async fn registered_faces(State(state): State<AppState>) -> Result<Json<RegisteredFaces>> {
    Ok(Json(state.gateway.registered_faces().await?))
}

/// Build face recognition routes
pub fn face_recognition_routes() -> Router<AppState> {
    Router::new()
        .route("/api/face-recognition/recognize", post(recognize))
        .route("/api/face-recognition/register", post(register_face))
        .route("/api/face-recognition/registered", get(registered_faces))
}
