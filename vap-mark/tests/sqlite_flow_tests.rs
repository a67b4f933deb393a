//! Marking flow against the SQLite repository

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{roster, ScriptedRecognizer};
use tempfile::TempDir;
use vap_common::models::AttendanceStatus;
use vap_mark::services::{MarkOutcome, MarkRequest, NewSession};
use vap_mark::store::{Repository, SessionStore, SqliteRepository, StudentDirectory};
use vap_mark::{AppState, ServiceOptions};

async fn sqlite_state(dir: &TempDir) -> (AppState, Arc<ScriptedRecognizer>, Arc<SqliteRepository>) {
    let pool = vap_common::db::init_database(&dir.path().join("vap.db"))
        .await
        .unwrap();
    let repo = Arc::new(SqliteRepository::new(pool));
    for student in roster() {
        assert!(repo.insert_student(&student).await.unwrap());
    }

    let recognizer = Arc::new(ScriptedRecognizer::default());
    let dyn_repo: Arc<dyn Repository> = repo.clone();
    let state = AppState::new(
        dyn_repo,
        recognizer.clone(),
        ServiceOptions {
            recognizer_timeout: Duration::from_secs(2),
            ..ServiceOptions::default()
        },
    );
    (state, recognizer, repo)
}

fn capture(session_id: &str) -> MarkRequest {
    MarkRequest {
        image: Some(helpers::IMAGE.to_string()),
        session_id: Some(session_id.to_string()),
        marked_by: Some("user_1".to_string()),
        threshold: None,
    }
}

#[tokio::test]
async fn test_mark_persists_and_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let (state, recognizer, _) = sqlite_state(&dir).await;

    state
        .registry
        .create_or_get(NewSession {
            session_id: "SESS-200".to_string(),
            ..NewSession::default()
        })
        .await
        .unwrap();

    recognizer.push_match("stu_7", 0.91);
    recognizer.push_match("stu_7", 0.93);
    recognizer.push_unmatched();

    assert!(matches!(
        state.marking.mark(capture("SESS-200")).await.unwrap(),
        MarkOutcome::Marked { .. }
    ));
    assert!(matches!(
        state.marking.mark(capture("SESS-200")).await.unwrap(),
        MarkOutcome::AlreadyMarked { .. }
    ));
    assert!(matches!(
        state.marking.mark(capture("SESS-200")).await.unwrap(),
        MarkOutcome::UnknownFace(_)
    ));
    state.registry.end("SESS-200").await.unwrap();
    drop(state);

    let pool = vap_common::db::init_database(&dir.path().join("vap.db"))
        .await
        .unwrap();
    let reopened = SqliteRepository::new(pool);
    let session = reopened.find_session("SESS-200").await.unwrap().unwrap();
    assert_eq!(session.total_present, 1);
    assert!(!session.is_active());

    let ledger = vap_mark::services::AttendanceLedger::new(Arc::new(reopened));
    let present = ledger
        .list_by_session_and_status("SESS-200", AttendanceStatus::Present)
        .await
        .unwrap();
    assert_eq!(present.len(), 1);
    assert_eq!(present[0].marked_by, "user_1");
    assert_eq!(present[0].roll_no, "CS2023007");
}

#[tokio::test]
async fn test_concurrent_marks_against_sqlite() {
    let dir = TempDir::new().unwrap();
    let (state, recognizer, repo) = sqlite_state(&dir).await;
    state
        .registry
        .create_or_get(NewSession {
            session_id: "SESS-201".to_string(),
            ..NewSession::default()
        })
        .await
        .unwrap();

    for _ in 0..5 {
        recognizer.push_match("stu_8", 0.88);
    }

    let mut calls = tokio::task::JoinSet::new();
    for _ in 0..5 {
        let marking = state.marking.clone();
        calls.spawn(async move { marking.mark(capture("SESS-201")).await });
    }

    let mut marked = 0;
    while let Some(result) = calls.join_next().await {
        if let MarkOutcome::Marked { .. } = result.unwrap().unwrap() {
            marked += 1;
        }
    }

    assert_eq!(marked, 1);
    assert_eq!(repo.find_session("SESS-201").await.unwrap().unwrap().total_present, 1);
}
