//! Shared fixtures for vap-mark integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use vap_common::models::{RecognitionResult, Student};
use vap_mark::services::{CaptureImage, Recognizer, RecognizerError, RegisteredFaces};
use vap_mark::store::{MemoryRepository, Repository};
use vap_mark::{build_router, AppState, ServiceOptions};

/// Tiny JPEG header, enough to pass base64 decoding
pub const IMAGE: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRgABAQ==";

/// Recognizer double that replays queued answers; an empty queue answers "unmatched"
#[derive(Default)]
pub struct ScriptedRecognizer {
    answers: Mutex<VecDeque<Result<RecognitionResult, RecognizerError>>>,
    registered: Mutex<Vec<String>>,
    pub delay: Duration,
}

impl ScriptedRecognizer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn push_match(&self, student_id: &str, confidence: f64) {
        self.push(Ok(RecognitionResult::matched(student_id, confidence)));
    }

    pub fn push_unmatched(&self) {
        self.push(Ok(RecognitionResult::unmatched(0.2)));
    }

    pub fn push_failure(&self) {
        self.push(Err(RecognizerError::Status(500, "model not loaded".to_string())));
    }

    pub fn push(&self, answer: Result<RecognitionResult, RecognizerError>) {
        self.answers.lock().unwrap().push_back(answer);
    }

    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        _image: &CaptureImage,
        _threshold: f64,
    ) -> Result<RecognitionResult, RecognizerError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RecognitionResult::unmatched(0.1)))
    }

    async fn register_face(
        &self,
        student_id: &str,
        _image: &CaptureImage,
    ) -> Result<(), RecognizerError> {
        self.registered.lock().unwrap().push(student_id.to_string());
        Ok(())
    }

    async fn registered_faces(&self) -> Result<RegisteredFaces, RecognizerError> {
        let student_ids = self.registered();
        Ok(RegisteredFaces {
            count: student_ids.len(),
            student_ids,
        })
    }
}

pub fn student(id: &str, name: &str, roll_no: &str, active: bool) -> Student {
    Student {
        id: id.to_string(),
        name: name.to_string(),
        roll_no: roll_no.to_string(),
        email: format!("{}@university.edu", id),
        department: "CS".to_string(),
        year: 2,
        section: "A".to_string(),
        enrolled_at: Utc::now(),
        is_active: active,
    }
}

pub fn roster() -> Vec<Student> {
    vec![
        student("stu_7", "Meera Joshi", "CS2023007", true),
        student("stu_8", "Aditya Kumar", "CS2023008", true),
        student("stu_9", "Former Student", "CS2019009", false),
    ]
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub recognizer: Arc<ScriptedRecognizer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_recognizer(ScriptedRecognizer::default(), Duration::from_secs(2))
    }

    pub fn with_recognizer(recognizer: ScriptedRecognizer, timeout: Duration) -> Self {
        let repo = Arc::new(MemoryRepository::with_students(roster()));
        let recognizer = Arc::new(recognizer);
        let dyn_repo: Arc<dyn Repository> = repo.clone();
        let state = AppState::new(
            dyn_repo,
            recognizer.clone(),
            ServiceOptions {
                recognizer_timeout: timeout,
                ..ServiceOptions::default()
            },
        );

        Self {
            router: build_router(state),
            repo,
            recognizer,
        }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Send a raw body with an explicit content type
    pub async fn post_raw(&self, uri: &str, content_type: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request("PUT", uri, body).await
    }
}
