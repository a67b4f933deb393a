//! Attendance ledger
//!
//! Append-only. The storage layer holds the `(student_id, session_id, date)`
//! uniqueness index, so an append racing past `find_existing` comes back as
//! `AppendOutcome::Duplicate` instead of a second row.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use vap_common::models::{AttendanceRecord, AttendanceStatus};

use crate::error::{Error, Result};
use crate::store::{AppendOutcome, AttendanceStore, RecordFilter, Repository, SessionStore};

pub struct AttendanceLedger {
    repo: Arc<dyn Repository>,
}

impl AttendanceLedger {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn find_existing(
        &self,
        student_id: &str,
        session_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        Ok(self.repo.find_record(student_id, session_id, date).await?)
    }

    /// Store `record` against an active session
    pub async fn append(&self, record: AttendanceRecord) -> Result<AppendOutcome> {
        let session = self
            .repo
            .find_session(&record.session_id)
            .await?
            .ok_or_else(|| Error::SessionNotFound(record.session_id.clone()))?;
        if !session.is_active() {
            return Err(Error::SessionClosed(session.session_id));
        }

        let outcome = self.repo.insert_record(&record).await?;
        match &outcome {
            AppendOutcome::Appended(stored) => info!(
                student_id = %stored.student_id,
                session_id = %stored.session_id,
                date = %stored.date,
                confidence = stored.confidence,
                "Attendance recorded"
            ),
            AppendOutcome::Duplicate(existing) => debug!(
                student_id = %existing.student_id,
                session_id = %existing.session_id,
                "Duplicate attendance suppressed by ledger index"
            ),
        }
        Ok(outcome)
    }

    pub async fn list_by_student(&self, student_id: &str) -> Result<Vec<AttendanceRecord>> {
        self.list(RecordFilter {
            student_id: Some(student_id.to_string()),
            ..RecordFilter::default()
        })
        .await
    }

    pub async fn list_by_session_and_status(
        &self,
        session_id: &str,
        status: AttendanceStatus,
    ) -> Result<Vec<AttendanceRecord>> {
        self.list(RecordFilter {
            session_id: Some(session_id.to_string()),
            status: Some(status),
            ..RecordFilter::default()
        })
        .await
    }

    pub async fn list(&self, filter: RecordFilter) -> Result<Vec<AttendanceRecord>> {
        Ok(self.repo.list_records(&filter).await?)
    }
}
