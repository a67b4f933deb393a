//! Session registry
//!
//! Sessions move `active → closed` exactly once. Marking and closing of the
//! same session are serialized through a per-session async lock, so a close
//! can never land between a ledger append and its counter increment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::info;
use uuid::Uuid;
use vap_common::models::{Session, DEFAULT_MARKED_BY};

use crate::error::{Error, Result};
use crate::store::{Repository, SessionStore};

const DEFAULT_MARKED_BY_NAME: &str = "System";
const DEFAULT_DEPARTMENT: &str = "CS";

/// Parameters for `SessionRegistry::create_or_get`
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub session_id: String,
    pub marked_by: Option<String>,
    pub marked_by_name: Option<String>,
    pub department: Option<String>,
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub struct SessionRegistry {
    repo: Arc<dyn Repository>,
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl SessionRegistry {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return the session stored under `session_id`, creating it if absent.
    ///
    /// The flag is `true` when a new session was created.
    pub async fn create_or_get(&self, new: NewSession) -> Result<(Session, bool)> {
        let session_id = new.session_id.trim().to_string();
        if session_id.is_empty() {
            return Err(Error::MissingInput("sessionId is required".to_string()));
        }

        let session = Session::new(
            session_id,
            non_empty_or(new.marked_by, DEFAULT_MARKED_BY),
            non_empty_or(new.marked_by_name, DEFAULT_MARKED_BY_NAME),
            non_empty_or(new.department, DEFAULT_DEPARTMENT),
            vap_common::time::now(),
        );

        let (session, created) = self.repo.insert_session_if_absent(session).await?;
        if created {
            info!(
                session_id = %session.session_id,
                id = %session.id,
                marked_by = %session.marked_by,
                "Session started"
            );
        }
        Ok((session, created))
    }

    /// Look up by external session id or internal id
    pub async fn find(&self, key: &str) -> Result<Option<Session>> {
        Ok(self.repo.find_session(key).await?)
    }

    pub async fn require(&self, key: &str) -> Result<Session> {
        self.find(key)
            .await?
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Session>> {
        Ok(self.repo.list_sessions().await?)
    }

    /// Close a session. Closing an already-closed session returns it unchanged.
    pub async fn end(&self, key: &str) -> Result<Session> {
        let session = self.require(key).await?;
        let guard = self.lock(session.id).await;

        let closed = self
            .repo
            .close_session(session.id, vap_common::time::now())
            .await?
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))?;

        if session.is_active() {
            info!(
                session_id = %closed.session_id,
                total_present = closed.total_present,
                "Session closed"
            );
        }

        drop(guard);
        self.release(closed.id);
        Ok(closed)
    }

    /// Add one present student to an active session
    pub async fn increment_present(&self, key: &str) -> Result<Session> {
        let session = self.require(key).await?;
        if !session.is_active() {
            return Err(Error::SessionClosed(session.session_id));
        }

        match self.repo.increment_present(session.id).await? {
            Some(updated) => Ok(updated),
            None => Err(Error::SessionClosed(session.session_id)),
        }
    }

    /// Exclusive section for mutations of one session
    pub async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks
                .entry(id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Closed sessions never take the lock again for marking
    fn release(&self, id: Uuid) {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.remove(&id);
    }
}
