//! Student directory endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use vap_common::models::Student;

use crate::api::JsonBody;
use crate::error::Result;
use crate::services::StudentInput;
use crate::AppState;

/// GET /api/students
pub async fn list_students(State(state): State<AppState>) -> Result<Json<Vec<Student>>> {
    Ok(Json(state.students.list().await?))
}

/// POST /api/students
pub async fn create_student(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<StudentInput>,
) -> Result<(StatusCode, Json<Student>)> {
    let student = state.students.create(input).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// GET /api/students/:id
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Student>> {
    Ok(Json(state.students.get(&id).await?))
}

/// PUT /api/students/:id
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(changes): JsonBody<StudentInput>,
) -> Result<Json<Student>> {
    Ok(Json(state.students.update(&id, changes).await?))
}

/// DELETE /api/students/:id (soft delete)
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Student>> {
    Ok(Json(state.students.deactivate(&id).await?))
}

/// Build student routes
pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/api/students", get(list_students).post(create_student))
        .route(
            "/api/students/:id",
            get(get_student).put(update_student).delete(delete_student),
        )
}
