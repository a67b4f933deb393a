//! In-memory repository
//!
//! All state sits behind one `RwLock`, so each trait call is atomic with
//! respect to every other call.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;
use vap_common::models::{AttendanceRecord, Session, SessionStatus, Student, UnknownFaceEntry};
use vap_common::Result;

use super::{
    AppendOutcome, AttendanceStore, RecordFilter, ReviewChange, SessionStore, SettingsStore,
    StudentDirectory, StudentUpdate, UnknownFaceStore,
};

type RecordKey = (String, String, NaiveDate);

#[derive(Default)]
struct MemoryState {
    students: Vec<Student>,
    sessions: Vec<Session>,
    records: Vec<AttendanceRecord>,
    record_keys: HashSet<RecordKey>,
    unknown_faces: Vec<UnknownFaceEntry>,
    settings: BTreeMap<String, String>,
}

impl MemoryState {
    fn session_position(&self, key: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.matches_key(key))
    }
}

/// Repository kept entirely in process memory
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-populated with a student directory
    pub fn with_students(students: Vec<Student>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                students,
                ..MemoryState::default()
            }),
        }
    }
}

#[async_trait]
impl StudentDirectory for MemoryRepository {
    async fn get_student(&self, id: &str) -> Result<Option<Student>> {
        let state = self.state.read().await;
        Ok(state.students.iter().find(|s| s.id == id).cloned())
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        Ok(self.state.read().await.students.clone())
    }

    async fn insert_student(&self, student: &Student) -> Result<bool> {
        let mut state = self.state.write().await;
        let taken = state
            .students
            .iter()
            .any(|s| s.id == student.id || s.roll_no == student.roll_no);
        if taken {
            return Ok(false);
        }
        state.students.push(student.clone());
        Ok(true)
    }

    async fn update_student(&self, student: &Student) -> Result<StudentUpdate> {
        let mut state = self.state.write().await;
        if state
            .students
            .iter()
            .any(|s| s.roll_no == student.roll_no && s.id != student.id)
        {
            return Ok(StudentUpdate::RollNoTaken);
        }
        match state.students.iter_mut().find(|s| s.id == student.id) {
            Some(stored) => {
                *stored = student.clone();
                Ok(StudentUpdate::Updated)
            }
            None => Ok(StudentUpdate::NotFound),
        }
    }

    async fn set_student_active(&self, id: &str, active: bool) -> Result<Option<Student>> {
        let mut state = self.state.write().await;
        Ok(state.students.iter_mut().find(|s| s.id == id).map(|student| {
            student.is_active = active;
            student.clone()
        }))
    }
}

#[async_trait]
impl SessionStore for MemoryRepository {
    async fn insert_session_if_absent(&self, session: Session) -> Result<(Session, bool)> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.sessions.iter().find(|s| s.session_id == session.session_id) {
            return Ok((existing.clone(), false));
        }
        state.sessions.push(session.clone());
        Ok((session, true))
    }

    async fn find_session(&self, key: &str) -> Result<Option<Session>> {
        let state = self.state.read().await;
        Ok(state.session_position(key).map(|i| state.sessions[i].clone()))
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        Ok(self.state.read().await.sessions.clone())
    }

    async fn close_session(&self, id: Uuid, ended_at: DateTime<Utc>) -> Result<Option<Session>> {
        let mut state = self.state.write().await;
        Ok(state.sessions.iter_mut().find(|s| s.id == id).map(|session| {
            if session.is_active() {
                session.status = SessionStatus::Closed;
                session.ended_at = Some(ended_at);
            }
            session.clone()
        }))
    }

    async fn increment_present(&self, id: Uuid) -> Result<Option<Session>> {
        let mut state = self.state.write().await;
        Ok(state
            .sessions
            .iter_mut()
            .find(|s| s.id == id && s.is_active())
            .map(|session| {
                session.total_present += 1;
                session.clone()
            }))
    }
}

#[async_trait]
impl AttendanceStore for MemoryRepository {
    async fn find_record(
        &self,
        student_id: &str,
        session_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .find(|r| r.key() == (student_id, session_id, date))
            .cloned())
    }

    async fn insert_record(&self, record: &AttendanceRecord) -> Result<AppendOutcome> {
        let mut state = self.state.write().await;
        let key = (record.student_id.clone(), record.session_id.clone(), record.date);

        if state.record_keys.contains(&key) {
            let existing = state
                .records
                .iter()
                .find(|r| r.key() == record.key())
                .cloned()
                .ok_or_else(|| {
                    vap_common::Error::Internal("ledger key index out of sync".to_string())
                })?;
            return Ok(AppendOutcome::Duplicate(existing));
        }

        state.record_keys.insert(key);
        state.records.push(record.clone());
        Ok(AppendOutcome::Appended(record.clone()))
    }

    async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>> {
        let state = self.state.read().await;
        Ok(state.records.iter().filter(|r| filter.matches(r)).cloned().collect())
    }
}

#[async_trait]
impl UnknownFaceStore for MemoryRepository {
    async fn insert_unknown_face(&self, entry: &UnknownFaceEntry) -> Result<()> {
        self.state.write().await.unknown_faces.push(entry.clone());
        Ok(())
    }

    async fn get_unknown_face(&self, id: Uuid) -> Result<Option<UnknownFaceEntry>> {
        let state = self.state.read().await;
        Ok(state.unknown_faces.iter().find(|e| e.id == id).cloned())
    }

    async fn apply_review(
        &self,
        id: Uuid,
        change: &ReviewChange,
    ) -> Result<Option<UnknownFaceEntry>> {
        let mut state = self.state.write().await;
        let Some(stored) = state.unknown_faces.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        match change {
            ReviewChange::MarkReviewed => stored.reviewed = true,
            ReviewChange::ToggleFlag => stored.flagged = !stored.flagged,
            ReviewChange::SetNotes(notes) => stored.notes = notes.clone(),
        }
        Ok(Some(stored.clone()))
    }

    async fn list_unknown_faces(&self) -> Result<Vec<UnknownFaceEntry>> {
        Ok(self.state.read().await.unknown_faces.clone())
    }
}

#[async_trait]
impl SettingsStore for MemoryRepository {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.read().await.settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.state
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let state = self.state.read().await;
        Ok(state.settings.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
