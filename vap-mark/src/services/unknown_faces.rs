//! Unknown face log
//!
//! Entries are appended freely; only the review workflow mutates them.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use vap_common::models::UnknownFaceEntry;

use crate::error::{Error, Result};
use crate::store::{Repository, ReviewChange, UnknownFaceStore};

pub struct UnknownFaceLog {
    repo: Arc<dyn Repository>,
}

impl UnknownFaceLog {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, session_id: &str) -> Result<UnknownFaceEntry> {
        let entry = UnknownFaceEntry::new(session_id, vap_common::time::now());
        self.repo.insert_unknown_face(&entry).await?;
        info!(session_id, entry_id = %entry.id, "Unknown face logged");
        Ok(entry)
    }

    pub async fn get(&self, id: Uuid) -> Result<UnknownFaceEntry> {
        self.repo
            .get_unknown_face(id)
            .await?
            .ok_or_else(|| Error::EntryNotFound(id.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<UnknownFaceEntry>> {
        Ok(self.repo.list_unknown_faces().await?)
    }

    pub async fn mark_reviewed(&self, id: Uuid) -> Result<UnknownFaceEntry> {
        self.apply(id, ReviewChange::MarkReviewed).await
    }

    pub async fn toggle_flag(&self, id: Uuid) -> Result<UnknownFaceEntry> {
        self.apply(id, ReviewChange::ToggleFlag).await
    }

    pub async fn set_notes(&self, id: Uuid, notes: &str) -> Result<UnknownFaceEntry> {
        self.apply(id, ReviewChange::SetNotes(notes.to_string())).await
    }

    async fn apply(&self, id: Uuid, change: ReviewChange) -> Result<UnknownFaceEntry> {
        let entry = self
            .repo
            .apply_review(id, &change)
            .await?
            .ok_or_else(|| Error::EntryNotFound(id.to_string()))?;
        info!(entry_id = %id, ?change, "Unknown face entry updated");
        Ok(entry)
    }
}
