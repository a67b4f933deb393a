//! Attendance marking
//!
//! One capture resolves to exactly one of three outcomes: an unknown-face
//! entry, "already marked", or a new present record plus a counter increment.
//!
//! The recognizer call happens outside any lock. Everything after it runs
//! under the session lock and re-reads the session first, so a result that
//! arrives after the session closed is dropped with `SessionClosed`.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};
use vap_common::models::{
    AttendanceRecord, Session, StudentSummary, UnknownFaceEntry, DEFAULT_MARKED_BY,
};

use crate::error::{Error, Result};
use crate::services::ledger::AttendanceLedger;
use crate::services::recognition::{CaptureImage, RecognitionGateway};
use crate::services::registry::SessionRegistry;
use crate::services::settings::SettingsService;
use crate::services::students::StudentService;
use crate::services::unknown_faces::UnknownFaceLog;
use crate::store::AppendOutcome;

/// Capture submitted for marking
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRequest {
    /// Base64 image, optionally as a data URL
    pub image: Option<String>,
    /// External session id or internal id
    pub session_id: Option<String>,
    pub marked_by: Option<String>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    UnknownFace(UnknownFaceEntry),
    AlreadyMarked {
        student: StudentSummary,
        confidence: f64,
    },
    Marked {
        student: StudentSummary,
        confidence: f64,
        record: AttendanceRecord,
    },
}

pub struct AttendanceMarkingService {
    gateway: RecognitionGateway,
    registry: Arc<SessionRegistry>,
    ledger: Arc<AttendanceLedger>,
    unknown_faces: Arc<UnknownFaceLog>,
    students: Arc<StudentService>,
    settings: Arc<SettingsService>,
}

impl AttendanceMarkingService {
    pub fn new(
        gateway: RecognitionGateway,
        registry: Arc<SessionRegistry>,
        ledger: Arc<AttendanceLedger>,
        unknown_faces: Arc<UnknownFaceLog>,
        students: Arc<StudentService>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            gateway,
            registry,
            ledger,
            unknown_faces,
            students,
            settings,
        }
    }

    pub async fn mark(&self, request: MarkRequest) -> Result<MarkOutcome> {
        let encoded = request
            .image
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| Error::MissingInput("image is required".to_string()))?;
        let session_key = request
            .session_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MissingInput("sessionId is required".to_string()))?;
        let marked_by = request
            .marked_by
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MARKED_BY.to_string());

        let image = CaptureImage::from_encoded(&encoded)?;
        let threshold = self.settings.resolve_threshold(request.threshold).await?;
        let session = self.active_session(&session_key).await?;

        let result = self.gateway.recognize(&image, Some(threshold)).await?;

        let _guard = self.registry.lock(session.id).await;
        let session = self.active_session(&session.session_id).await?;

        let student = match result.matched_student() {
            Some(student_id) => {
                let student = self.students.find_active(student_id).await?;
                if student.is_none() {
                    debug!(student_id, "Recognized student is missing or inactive");
                }
                student
            }
            None => None,
        };

        let Some(student) = student else {
            let entry = self.unknown_faces.record(&session.session_id).await?;
            return Ok(MarkOutcome::UnknownFace(entry));
        };

        let confidence = result.confidence;
        let date = vap_common::time::local_today();

        if self
            .ledger
            .find_existing(&student.id, &session.session_id, date)
            .await?
            .is_some()
        {
            debug!(
                student_id = %student.id,
                session_id = %session.session_id,
                "Student already marked"
            );
            return Ok(MarkOutcome::AlreadyMarked {
                student: student.summary(),
                confidence,
            });
        }

        let record = AttendanceRecord::present(
            &student,
            &session.session_id,
            &marked_by,
            confidence,
            date,
            vap_common::time::local_time_of_day(),
            vap_common::time::now(),
        );

        match self.ledger.append(record).await? {
            AppendOutcome::Duplicate(_) => Ok(MarkOutcome::AlreadyMarked {
                student: student.summary(),
                confidence,
            }),
            AppendOutcome::Appended(record) => {
                let updated = self.registry.increment_present(&session.session_id).await?;
                info!(
                    student_id = %student.id,
                    session_id = %updated.session_id,
                    total_present = updated.total_present,
                    "Student marked present"
                );
                Ok(MarkOutcome::Marked {
                    student: student.summary(),
                    confidence,
                    record,
                })
            }
        }
    }

    async fn active_session(&self, key: &str) -> Result<Session> {
        let session = self.registry.require(key).await?;
        if !session.is_active() {
            return Err(Error::SessionClosed(session.session_id));
        }
        Ok(session)
    }
}
