//! SQLite repository
//!
//! Timestamps are stored as RFC 3339 text, dates as `YYYY-MM-DD`, times as
//! `HH:MM:SS`, ids as hyphenated UUID text. Schema lives in
//! `vap_common::db::init`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vap_common::models::{
    AttendanceRecord, AttendanceStatus, Session, SessionStatus, Student, UnknownFaceEntry,
};
use vap_common::{Error, Result};

use super::{
    AppendOutcome, AttendanceStore, RecordFilter, ReviewChange, SessionStore, SettingsStore,
    StudentDirectory, StudentUpdate, UnknownFaceStore,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

const SESSION_COLUMNS: &str = "id, session_id, started_at, ended_at, marked_by, marked_by_name, \
                               department, total_present, status";

const RECORD_COLUMNS: &str = "id, student_id, student_name, roll_no, department, date, time, \
                              status, session_id, marked_by, confidence, created_at";

const STUDENT_COLUMNS: &str =
    "id, name, roll_no, email, department, year, section, enrolled_at, is_active";

const UNKNOWN_FACE_COLUMNS: &str = "id, timestamp, session_id, reviewed, flagged, notes";

/// Repository backed by a SQLite pool
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn session_by_id(&self, id: Uuid) -> Result<Option<Session>> {
        let sql = format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn session_by_external_id(&self, session_id: &str) -> Result<Option<Session>> {
        let sql = format!("SELECT {} FROM sessions WHERE session_id = ?", SESSION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }
}

fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn session_from_row(row: &SqliteRow) -> Result<Session> {
    let id: String = row.get("id");
    let started_at: String = row.get("started_at");
    let ended_at: Option<String> = row.get("ended_at");
    let status: String = row.get("status");
    let total_present: i64 = row.get("total_present");

    Ok(Session {
        id: parse_uuid(&id, "sessions.id")?,
        session_id: row.get("session_id"),
        started_at: parse_timestamp(&started_at, "sessions.started_at")?,
        ended_at: ended_at
            .map(|s| parse_timestamp(&s, "sessions.ended_at"))
            .transpose()?,
        marked_by: row.get("marked_by"),
        marked_by_name: row.get("marked_by_name"),
        department: row.get("department"),
        total_present: u32::try_from(total_present)
            .map_err(|_| Error::Internal(format!("Invalid total_present: {}", total_present)))?,
        status: status.parse::<SessionStatus>()?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<AttendanceRecord> {
    let id: String = row.get("id");
    let date: String = row.get("date");
    let time: String = row.get("time");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");

    Ok(AttendanceRecord {
        id: parse_uuid(&id, "attendance_records.id")?,
        student_id: row.get("student_id"),
        student_name: row.get("student_name"),
        roll_no: row.get("roll_no"),
        department: row.get("department"),
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| Error::Internal(format!("Failed to parse date: {}", e)))?,
        time: NaiveTime::parse_from_str(&time, TIME_FORMAT)
            .map_err(|e| Error::Internal(format!("Failed to parse time: {}", e)))?,
        status: status.parse::<AttendanceStatus>()?,
        session_id: row.get("session_id"),
        marked_by: row.get("marked_by"),
        confidence: row.get("confidence"),
        created_at: parse_timestamp(&created_at, "attendance_records.created_at")?,
    })
}

fn student_from_row(row: &SqliteRow) -> Result<Student> {
    let enrolled_at: String = row.get("enrolled_at");
    let year: i64 = row.get("year");
    let is_active: i64 = row.get("is_active");

    Ok(Student {
        id: row.get("id"),
        name: row.get("name"),
        roll_no: row.get("roll_no"),
        email: row.get("email"),
        department: row.get("department"),
        year: u8::try_from(year).map_err(|_| Error::Internal(format!("Invalid year: {}", year)))?,
        section: row.get("section"),
        enrolled_at: parse_timestamp(&enrolled_at, "students.enrolled_at")?,
        is_active: is_active != 0,
    })
}

fn unknown_face_from_row(row: &SqliteRow) -> Result<UnknownFaceEntry> {
    let id: String = row.get("id");
    let timestamp: String = row.get("timestamp");
    let reviewed: i64 = row.get("reviewed");
    let flagged: i64 = row.get("flagged");

    Ok(UnknownFaceEntry {
        id: parse_uuid(&id, "unknown_faces.id")?,
        timestamp: parse_timestamp(&timestamp, "unknown_faces.timestamp")?,
        session_id: row.get("session_id"),
        reviewed: reviewed != 0,
        flagged: flagged != 0,
        notes: row.get("notes"),
    })
}

#[async_trait]
impl StudentDirectory for SqliteRepository {
    async fn get_student(&self, id: &str) -> Result<Option<Student>> {
        let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(student_from_row).transpose()
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let sql = format!("SELECT {} FROM students ORDER BY rowid", STUDENT_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(student_from_row).collect()
    }

    async fn insert_student(&self, student: &Student) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO students (id, name, roll_no, email, department, year, section, enrolled_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&student.id)
        .bind(&student.name)
        .bind(&student.roll_no)
        .bind(&student.email)
        .bind(&student.department)
        .bind(i64::from(student.year))
        .bind(&student.section)
        .bind(student.enrolled_at.to_rfc3339())
        .bind(student.is_active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_student(&self, student: &Student) -> Result<StudentUpdate> {
        let result = sqlx::query(
            r#"
            UPDATE students
            SET name = ?, roll_no = ?, email = ?, department = ?, year = ?, section = ?, is_active = ?
            WHERE id = ?
              AND NOT EXISTS (SELECT 1 FROM students WHERE roll_no = ? AND id <> ?)
            "#,
        )
        .bind(&student.name)
        .bind(&student.roll_no)
        .bind(&student.email)
        .bind(&student.department)
        .bind(i64::from(student.year))
        .bind(&student.section)
        .bind(student.is_active)
        .bind(&student.id)
        .bind(&student.roll_no)
        .bind(&student.id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(StudentUpdate::Updated),
            Ok(_) if self.get_student(&student.id).await?.is_none() => Ok(StudentUpdate::NotFound),
            Ok(_) => Ok(StudentUpdate::RollNoTaken),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(StudentUpdate::RollNoTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_student_active(&self, id: &str, active: bool) -> Result<Option<Student>> {
        sqlx::query("UPDATE students SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.get_student(id).await
    }
}

#[async_trait]
impl SessionStore for SqliteRepository {
    async fn insert_session_if_absent(&self, session: Session) -> Result<(Session, bool)> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (
                id, session_id, started_at, ended_at, marked_by, marked_by_name,
                department, total_present, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO NOTHING
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.session_id)
        .bind(session.started_at.to_rfc3339())
        .bind(session.ended_at.map(|dt| dt.to_rfc3339()))
        .bind(&session.marked_by)
        .bind(&session.marked_by_name)
        .bind(&session.department)
        .bind(i64::from(session.total_present))
        .bind(session.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok((session, true));
        }

        let existing = self
            .session_by_external_id(&session.session_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "Session {} conflicted but could not be read back",
                    session.session_id
                ))
            })?;
        Ok((existing, false))
    }

    async fn find_session(&self, key: &str) -> Result<Option<Session>> {
        if let Some(session) = self.session_by_external_id(key).await? {
            return Ok(Some(session));
        }
        match Uuid::parse_str(key) {
            Ok(id) => self.session_by_id(id).await,
            Err(_) => Ok(None),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let sql = format!("SELECT {} FROM sessions ORDER BY started_at, rowid", SESSION_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn close_session(&self, id: Uuid, ended_at: DateTime<Utc>) -> Result<Option<Session>> {
        sqlx::query(
            "UPDATE sessions SET status = 'closed', ended_at = ? WHERE id = ? AND status = 'active'",
        )
        .bind(ended_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.session_by_id(id).await
    }

    async fn increment_present(&self, id: Uuid) -> Result<Option<Session>> {
        let result = sqlx::query(
            "UPDATE sessions SET total_present = total_present + 1 WHERE id = ? AND status = 'active'",
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.session_by_id(id).await
    }
}

#[async_trait]
impl AttendanceStore for SqliteRepository {
    async fn find_record(
        &self,
        student_id: &str,
        session_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let sql = format!(
            "SELECT {} FROM attendance_records WHERE student_id = ? AND session_id = ? AND date = ?",
            RECORD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(student_id)
            .bind(session_id)
            .bind(date.format(DATE_FORMAT).to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert_record(&self, record: &AttendanceRecord) -> Result<AppendOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records (
                id, student_id, student_name, roll_no, department, date, time,
                status, session_id, marked_by, confidence, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(student_id, session_id, date) DO NOTHING
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.student_id)
        .bind(&record.student_name)
        .bind(&record.roll_no)
        .bind(&record.department)
        .bind(record.date.format(DATE_FORMAT).to_string())
        .bind(record.time.format(TIME_FORMAT).to_string())
        .bind(record.status.as_str())
        .bind(&record.session_id)
        .bind(&record.marked_by)
        .bind(record.confidence)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(AppendOutcome::Appended(record.clone()));
        }

        let existing = self
            .find_record(&record.student_id, &record.session_id, record.date)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "Attendance record for {} conflicted but could not be read back",
                    record.student_id
                ))
            })?;
        Ok(AppendOutcome::Duplicate(existing))
    }

    async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM attendance_records
            WHERE (? IS NULL OR student_id = ?)
              AND (? IS NULL OR session_id = ?)
              AND (? IS NULL OR status = ?)
            ORDER BY rowid
            "#,
            RECORD_COLUMNS
        );
        let status = filter.status.map(|s| s.as_str());

        let rows = sqlx::query(&sql)
            .bind(filter.student_id.as_deref())
            .bind(filter.student_id.as_deref())
            .bind(filter.session_id.as_deref())
            .bind(filter.session_id.as_deref())
            .bind(status)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl UnknownFaceStore for SqliteRepository {
    async fn insert_unknown_face(&self, entry: &UnknownFaceEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO unknown_faces (id, timestamp, session_id, reviewed, flagged, notes)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.timestamp.to_rfc3339())
        .bind(&entry.session_id)
        .bind(entry.reviewed)
        .bind(entry.flagged)
        .bind(&entry.notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_unknown_face(&self, id: Uuid) -> Result<Option<UnknownFaceEntry>> {
        let sql = format!("SELECT {} FROM unknown_faces WHERE id = ?", UNKNOWN_FACE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(unknown_face_from_row).transpose()
    }

    async fn apply_review(
        &self,
        id: Uuid,
        change: &ReviewChange,
    ) -> Result<Option<UnknownFaceEntry>> {
        let assignment = match change {
            ReviewChange::MarkReviewed => "reviewed = 1",
            ReviewChange::ToggleFlag => "flagged = NOT flagged",
            ReviewChange::SetNotes(_) => "notes = ?",
        };
        let sql = format!(
            "UPDATE unknown_faces SET {} WHERE id = ? RETURNING {}",
            assignment, UNKNOWN_FACE_COLUMNS
        );

        let mut query = sqlx::query(&sql);
        if let ReviewChange::SetNotes(notes) = change {
            query = query.bind(notes);
        }
        let row = query
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(unknown_face_from_row).transpose()
    }

    async fn list_unknown_faces(&self) -> Result<Vec<UnknownFaceEntry>> {
        let sql = format!("SELECT {} FROM unknown_faces ORDER BY rowid", UNKNOWN_FACE_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(unknown_face_from_row).collect()
    }
}

#[async_trait]
impl SettingsStore for SqliteRepository {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM settings ORDER BY key")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}
