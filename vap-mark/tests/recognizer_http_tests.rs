//! HttpRecognizer against a local stub of the face recognition service

mod helpers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use vap_mark::services::{
    CaptureImage, HttpRecognizer, MarkOutcome, MarkRequest, NewSession, Recognizer,
    RecognizerError,
};
use vap_mark::store::{MemoryRepository, Repository};
use vap_mark::{AppState, ServiceOptions};

async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr) -> HttpRecognizer {
    HttpRecognizer::new(&format!("http://{}/", addr), Duration::from_secs(2)).unwrap()
}

fn image() -> CaptureImage {
    CaptureImage::from_encoded("aGVsbG8=").unwrap()
}

#[tokio::test]
async fn test_recognize_match() {
    let router = Router::new().route(
        "/recognize-face-base64",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["image"], "aGVsbG8=");
            assert_eq!(body["threshold"], 0.65);
            Json(json!({
                "success": true,
                "recognized": true,
                "student_id": "stu_7",
                "confidence": 0.91
            }))
        }),
    );
    let recognizer = client(spawn_stub(router).await);

    let result = recognizer.recognize(&image(), 0.65).await.unwrap();
    assert!(result.recognized);
    assert_eq!(result.student_id.as_deref(), Some("stu_7"));
    assert_eq!(result.confidence, 0.91);
}

#[tokio::test]
async fn test_recognize_no_match_is_not_an_error() {
    let router = Router::new().route(
        "/recognize-face-base64",
        post(|| async {
            Json(json!({
                "success": true,
                "recognized": false,
                "student_id": null,
                "confidence": 0.31,
                "message": "No matching face"
            }))
        }),
    );
    let recognizer = client(spawn_stub(router).await);

    let result = recognizer.recognize(&image(), 0.6).await.unwrap();
    assert!(!result.recognized);
    assert_eq!(result.student_id, None);
    assert_eq!(result.matched_student(), None);
}

fn no_face_router() -> Router {
    Router::new().route(
        "/recognize-face-base64",
        post(|| async {
            Json(json!({
                "success": false,
                "recognized": false,
                "student_id": null,
                "confidence": 0.0,
                "message": "No face detected"
            }))
        }),
    )
}

#[tokio::test]
async fn test_no_face_detected_is_unmatched() {
    let recognizer = client(spawn_stub(no_face_router()).await);

    let result = recognizer.recognize(&image(), 0.6).await.unwrap();
    assert!(!result.recognized);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.matched_student(), None);
}

#[tokio::test]
async fn test_no_face_detected_logs_unknown_face() {
    let recognizer = Arc::new(client(spawn_stub(no_face_router()).await));
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::with_students(helpers::roster()));
    let state = AppState::new(repo, recognizer, ServiceOptions::default());
    state
        .registry
        .create_or_get(NewSession {
            session_id: "SESS-1".to_string(),
            ..NewSession::default()
        })
        .await
        .unwrap();

    let outcome = state
        .marking
        .mark(MarkRequest {
            image: Some(helpers::IMAGE.to_string()),
            session_id: Some("SESS-1".to_string()),
            ..MarkRequest::default()
        })
        .await
        .unwrap();

    match outcome {
        MarkOutcome::UnknownFace(entry) => assert_eq!(entry.session_id, "SESS-1"),
        other => panic!("expected unknown face, got {:?}", other),
    }
    let entries = state.unknown_faces.list().await.unwrap();
    assert_eq!(entries.len(), 1);
    let session = state.registry.require("SESS-1").await.unwrap();
    assert_eq!(session.total_present, 0);
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let router = Router::new().route(
        "/recognize-face-base64",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
    );
    let recognizer = client(spawn_stub(router).await);

    match recognizer.recognize(&image(), 0.6).await {
        Err(RecognizerError::Status(code, body)) => {
            assert_eq!(code, 500);
            assert_eq!(body, "model crashed");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let router = Router::new().route("/recognize-face-base64", post(|| async { "not json" }));
    let recognizer = client(spawn_stub(router).await);

    let err = recognizer.recognize(&image(), 0.6).await.unwrap_err();
    assert!(matches!(err, RecognizerError::Parse(_)));
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr).recognize(&image(), 0.6).await.unwrap_err();
    assert!(matches!(err, RecognizerError::Network(_)));
}

#[tokio::test]
async fn test_register_and_list_faces() {
    let router = Router::new()
        .route(
            "/register-face-base64",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["student_id"], "stu_8");
                Json(json!({ "success": true, "message": "Face registered" }))
            }),
        )
        .route(
            "/registered-faces",
            get(|| async { Json(json!({ "student_ids": ["stu_7", "stu_8"], "count": 2 })) }),
        );
    let recognizer = client(spawn_stub(router).await);

    recognizer.register_face("stu_8", &image()).await.unwrap();
    let faces = recognizer.registered_faces().await.unwrap();
    assert_eq!(faces.count, 2);
    assert_eq!(faces.student_ids, vec!["stu_7".to_string(), "stu_8".to_string()]);
}

#[tokio::test]
async fn test_rejected_registration() {
    let router = Router::new().route(
        "/register-face-base64",
        post(|| async { Json(json!({ "success": false, "message": "No face detected" })) }),
    );
    let recognizer = client(spawn_stub(router).await);

    match recognizer.register_face("stu_8", &image()).await {
        Err(RecognizerError::Status(_, message)) => assert_eq!(message, "No face detected"),
        other => panic!("expected rejection, got {:?}", other),
    }
}
