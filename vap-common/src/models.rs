//! Domain models shared by VAP services
//!
//! JSON field names are camelCase to match the dashboard's wire format.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Threshold used when neither the request nor settings provide one
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Actor recorded on attendance records when the caller does not name one
pub const DEFAULT_MARKED_BY: &str = "system";

/// Enrolled student, owned by the student directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll_no: String,
    #[serde(default)]
    pub email: String,
    pub department: String,
    #[serde(default = "default_year")]
    pub year: u8,
    #[serde(default = "default_section")]
    pub section: String,
    pub enrolled_at: DateTime<Utc>,
    pub is_active: bool,
}

fn default_year() -> u8 {
    1
}

fn default_section() -> String {
    "A".to_string()
}

impl Student {
    pub fn summary(&self) -> StudentSummary {
        StudentSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            roll_no: self.roll_no.clone(),
        }
    }
}

/// The identifying subset of a student returned by marking responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: String,
    pub name: String,
    pub roll_no: String,
}

/// Session lifecycle: `Active → Closed`, never reopened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "closed" => Ok(SessionStatus::Closed),
            other => Err(Error::InvalidInput(format!("Unknown session status: {}", other))),
        }
    }
}

/// One attendance-taking window
///
/// `total_present` always equals the number of present records carrying this
/// session's `session_id`. It is frozen once the session is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    /// Human-facing identifier, e.g. `SESS-100`
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub marked_by: String,
    pub marked_by_name: String,
    pub department: String,
    pub total_present: u32,
    pub status: SessionStatus,
}

impl Session {
    pub fn new(
        session_id: String,
        marked_by: String,
        marked_by_name: String,
        department: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            started_at,
            ended_at: None,
            marked_by,
            marked_by_name,
            department,
            total_present: 0,
            status: SessionStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Sessions are addressable by internal id or by external session id
    pub fn matches_key(&self, key: &str) -> bool {
        self.session_id == key || self.id.to_string() == key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Unknown,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "unknown" => Ok(AttendanceStatus::Unknown),
            other => Err(Error::InvalidInput(format!("Unknown attendance status: {}", other))),
        }
    }
}

/// Ledger entry, append-only
///
/// Student name, roll number and department are a snapshot taken at mark
/// time. Later edits to the student do not rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: String,
    pub student_name: String,
    pub roll_no: String,
    pub department: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AttendanceStatus,
    pub session_id: String,
    pub marked_by: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Build a `present` record for `student` in `session_id`
    pub fn present(
        student: &Student,
        session_id: &str,
        marked_by: &str,
        confidence: f64,
        date: NaiveDate,
        time: NaiveTime,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            roll_no: student.roll_no.clone(),
            department: student.department.clone(),
            date,
            time,
            status: AttendanceStatus::Present,
            session_id: session_id.to_string(),
            marked_by: marked_by.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            created_at,
        }
    }

    /// Ledger uniqueness key
    pub fn key(&self) -> (&str, &str, NaiveDate) {
        (&self.student_id, &self.session_id, self.date)
    }
}

/// A capture that did not resolve to an active student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownFaceEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub reviewed: bool,
    pub flagged: bool,
    pub notes: String,
}

impl UnknownFaceEntry {
    pub fn new(session_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            session_id: session_id.to_string(),
            reviewed: false,
            flagged: false,
            notes: String::new(),
        }
    }
}

/// Normalized recognizer verdict; transient, never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub recognized: bool,
    pub student_id: Option<String>,
    pub confidence: f64,
}

impl RecognitionResult {
    pub fn matched(student_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            recognized: true,
            student_id: Some(student_id.into()),
            confidence: clamp_confidence(confidence),
        }
    }

    pub fn unmatched(confidence: f64) -> Self {
        Self {
            recognized: false,
            student_id: None,
            confidence: clamp_confidence(confidence),
        }
    }

    /// Student id when the match is usable, `None` otherwise
    pub fn matched_student(&self) -> Option<&str> {
        if !self.recognized {
            return None;
        }
        self.student_id.as_deref().filter(|id| !id.is_empty())
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
