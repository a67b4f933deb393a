//! Attendance endpoints
//!
//! `POST /api/attendance/mark` runs the marking flow on its own task. If the
//! client goes away mid-request the recognizer call still completes, and its
//! result is applied only while the session is active.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use vap_common::models::{AttendanceRecord, AttendanceStatus, StudentSummary, UnknownFaceEntry};

use crate::api::JsonBody;
use crate::error::{Error, Result};
use crate::services::{MarkOutcome, MarkRequest};
use crate::store::RecordFilter;
use crate::AppState;

/// Body of a successful `POST /api/attendance/mark`
///
/// - unknown face: `{success:false, recognized:false, message, unknownFace}`
/// - already marked: `{success:true, recognized:true, alreadyMarked:true, student, confidence}`
/// - marked: `{success:true, recognized:true, alreadyMarked:false, student, confidence, record}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkResponse {
    pub success: bool,
    pub recognized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_marked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<AttendanceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_face: Option<UnknownFaceEntry>,
}

impl From<MarkOutcome> for MarkResponse {
    fn from(outcome: MarkOutcome) -> Self {
        match outcome {
            MarkOutcome::UnknownFace(entry) => Self {
                success: false,
                recognized: false,
                already_marked: None,
                message: Some("Unknown face detected".to_string()),
                student: None,
                confidence: None,
                record: None,
                unknown_face: Some(entry),
            },
            MarkOutcome::AlreadyMarked {
                student,
                confidence,
            } => Self {
                success: true,
                recognized: true,
                already_marked: Some(true),
                message: None,
                student: Some(student),
                confidence: Some(confidence),
                record: None,
                unknown_face: None,
            },
            MarkOutcome::Marked {
                student,
                confidence,
                record,
            } => Self {
                success: true,
                recognized: true,
                already_marked: Some(false),
                message: None,
                student: Some(student),
                confidence: Some(confidence),
                record: Some(record),
                unknown_face: None,
            },
        }
    }
}

/// POST /api/attendance/mark
pub async fn mark_attendance(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<MarkRequest>,
) -> Result<Json<MarkResponse>> {
    let marking = state.marking.clone();
    let outcome = tokio::spawn(async move { marking.mark(request).await })
        .await
        .map_err(|e| {
            Error::Persistence(vap_common::Error::Internal(format!(
                "Marking task failed: {}",
                e
            )))
        })??;

    Ok(Json(outcome.into()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub student_id: Option<String>,
    pub session_id: Option<String>,
    pub status: Option<String>,
}

impl AttendanceQuery {
    fn into_filter(self) -> Result<RecordFilter> {
        let status = self
            .status
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<AttendanceStatus>())
            .transpose()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        Ok(RecordFilter {
            student_id: self.student_id.filter(|s| !s.is_empty()),
            session_id: self.session_id.filter(|s| !s.is_empty()),
            status,
        })
    }
}

/// GET /api/attendance?studentId=&sessionId=&status=
pub async fn list_attendance(
    State(state): State<AppState>,
    Query(query): Query<AttendanceQuery>,
) -> Result<Json<Vec<AttendanceRecord>>> {
    let records = state.ledger.list(query.into_filter()?).await?;
    Ok(Json(records))
}

/// Build attendance routes
pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/attendance", get(list_attendance))
        .route("/api/attendance/mark", post(mark_attendance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use vap_common::models::Student;

    #[test]
    fn test_unknown_face_response_shape() {
        let response = MarkResponse::from(MarkOutcome::UnknownFace(UnknownFaceEntry::new(
            "SESS-101",
            Utc::now(),
        )));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["recognized"], false);
        assert_eq!(json["unknownFace"]["sessionId"], "SESS-101");
        assert!(json.get("alreadyMarked").is_none());
        assert!(json.get("record").is_none());
    }

    #[test]
    fn test_marked_response_shape() {
        let student = Student {
            id: "stu_7".to_string(),
            name: "Meera Joshi".to_string(),
            roll_no: "IT2023008".to_string(),
            email: String::new(),
            department: "IT".to_string(),
            year: 3,
            section: "B".to_string(),
            enrolled_at: Utc::now(),
            is_active: true,
        };
        let record = AttendanceRecord::present(
            &student,
            "SESS-100",
            "system",
            0.91,
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            Utc::now(),
        );
        let response = MarkResponse::from(MarkOutcome::Marked {
            student: student.summary(),
            confidence: 0.91,
            record,
        });
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["alreadyMarked"], false);
        assert_eq!(json["student"]["rollNo"], "IT2023008");
        assert_eq!(json["record"]["status"], "present");
        assert!(json.get("unknownFace").is_none());
    }

    #[test]
    fn test_query_rejects_unknown_status() {
        let query = AttendanceQuery {
            status: Some("excused".to_string()),
            ..AttendanceQuery::default()
        };
        assert!(matches!(query.into_filter(), Err(Error::InvalidInput(_))));
    }
}
