//! Repository abstraction over attendance persistence
//!
//! The marking core talks only to these traits. `MemoryRepository` backs tests
//! and ephemeral runs, `SqliteRepository` backs real deployments.
//!
//! Both implementations enforce ledger uniqueness on
//! `(student_id, session_id, date)` themselves: a second insert for the same
//! key is reported as [`AppendOutcome::Duplicate`], never stored.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use vap_common::models::{
    AttendanceRecord, AttendanceStatus, Session, Student, UnknownFaceEntry,
};
use vap_common::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// Result of a ledger insert
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// Record stored
    Appended(AttendanceRecord),
    /// A record for the same key already existed; it is returned unchanged
    Duplicate(AttendanceRecord),
}

/// Result of a student directory overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentUpdate {
    Updated,
    NotFound,
    RollNoTaken,
}

/// Optional filters for ledger projections; `None` matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub student_id: Option<String>,
    pub session_id: Option<String>,
    pub status: Option<AttendanceStatus>,
}

impl RecordFilter {
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.student_id.as_deref().map_or(true, |id| record.student_id == id)
            && self.session_id.as_deref().map_or(true, |id| record.session_id == id)
            && self.status.map_or(true, |status| record.status == status)
    }
}

#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn get_student(&self, id: &str) -> Result<Option<Student>>;

    async fn list_students(&self) -> Result<Vec<Student>>;

    /// Returns `false` without storing when the id or roll number is taken
    async fn insert_student(&self, student: &Student) -> Result<bool>;

    /// Overwrite a stored student unless another student holds its roll number
    async fn update_student(&self, student: &Student) -> Result<StudentUpdate>;

    /// Returns the updated student, `None` when the id is unknown
    async fn set_student_active(&self, id: &str, active: bool) -> Result<Option<Student>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `session` unless one with the same external `session_id` exists.
    ///
    /// Returns the stored session and whether it was newly created.
    async fn insert_session_if_absent(&self, session: Session) -> Result<(Session, bool)>;

    /// Look up by external session id first, then by internal id
    async fn find_session(&self, key: &str) -> Result<Option<Session>>;

    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Close an active session. A closed session is left untouched.
    ///
    /// Returns the session as stored afterwards, `None` when the id is unknown.
    async fn close_session(&self, id: Uuid, ended_at: DateTime<Utc>) -> Result<Option<Session>>;

    /// Add one to `total_present` of an active session.
    ///
    /// Returns the updated session, `None` when the session is missing or closed.
    async fn increment_present(&self, id: Uuid) -> Result<Option<Session>>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find_record(
        &self,
        student_id: &str,
        session_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>>;

    async fn insert_record(&self, record: &AttendanceRecord) -> Result<AppendOutcome>;

    /// Matching records in insertion order
    async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>>;
}

/// Single-field change from the unknown-face review workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewChange {
    MarkReviewed,
    ToggleFlag,
    SetNotes(String),
}

#[async_trait]
pub trait UnknownFaceStore: Send + Sync {
    async fn insert_unknown_face(&self, entry: &UnknownFaceEntry) -> Result<()>;

    async fn get_unknown_face(&self, id: Uuid) -> Result<Option<UnknownFaceEntry>>;

    /// Apply one review change atomically; `None` when the id is unknown
    async fn apply_review(&self, id: Uuid, change: &ReviewChange)
        -> Result<Option<UnknownFaceEntry>>;

    async fn list_unknown_faces(&self) -> Result<Vec<UnknownFaceEntry>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    /// All settings ordered by key
    async fn list_settings(&self) -> Result<Vec<(String, String)>>;
}

/// Everything the service needs from storage
pub trait Repository:
    StudentDirectory + SessionStore + AttendanceStore + UnknownFaceStore + SettingsStore
{
}

impl<T> Repository for T where
    T: StudentDirectory + SessionStore + AttendanceStore + UnknownFaceStore + SettingsStore
{
}
