//! Face recognizer client and gateway
//!
//! `HttpRecognizer` speaks the recognizer's JSON protocol; `RecognitionGateway`
//! wraps any `Recognizer` with threshold validation, a hard timeout and the
//! mapping of every infrastructure failure to `RecognizerUnavailable`.
//!
//! A well-formed "no match" answer is a successful `RecognitionResult`, never
//! an error.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use vap_common::models::{RecognitionResult, DEFAULT_THRESHOLD};

use crate::error::{Error, Result};

const USER_AGENT: &str = concat!("vap-mark/", env!("CARGO_PKG_VERSION"));

/// Recognizer client errors
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Recognizer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Recognizer returned status {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Decoded capture payload
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureImage {
    bytes: Vec<u8>,
}

impl CaptureImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidInput("image is empty".to_string()));
        }
        Ok(Self { bytes })
    }

    /// Decode a base64 capture, accepting `data:image/...;base64,` prefixes
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let payload = match encoded.split_once(',') {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => encoded,
        };
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(Error::InvalidInput("image is empty".to_string()));
        }

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| Error::InvalidInput(format!("image is not valid base64: {}", e)))?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Faces currently enrolled with the recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredFaces {
    pub student_ids: Vec<String>,
    pub count: usize,
}

/// External face matcher
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(
        &self,
        image: &CaptureImage,
        threshold: f64,
    ) -> std::result::Result<RecognitionResult, RecognizerError>;

    async fn register_face(
        &self,
        student_id: &str,
        image: &CaptureImage,
    ) -> std::result::Result<(), RecognizerError>;

    async fn registered_faces(&self) -> std::result::Result<RegisteredFaces, RecognizerError>;
}

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    image: &'a str,
    threshold: f64,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    recognized: bool,
    #[serde(default)]
    student_id: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    student_id: &'a str,
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisteredFacesResponse {
    #[serde(default)]
    student_ids: Vec<String>,
    #[serde(default)]
    count: Option<usize>,
}

fn default_success() -> bool {
    true
}

/// Recognizer reached over HTTP
pub struct HttpRecognizer {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpRecognizer {
    pub fn new(base_url: &str, timeout: Duration) -> std::result::Result<Self, RecognizerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RecognizerError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> std::result::Result<reqwest::Response, RecognizerError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RecognizerError::Status(status.as_u16(), error_text));
        }
        Ok(response)
    }
}

fn transport_error(err: reqwest::Error) -> RecognizerError {
    if err.is_timeout() {
        RecognizerError::Timeout(Duration::ZERO)
    } else {
        RecognizerError::Network(err.to_string())
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(
        &self,
        image: &CaptureImage,
        threshold: f64,
    ) -> std::result::Result<RecognitionResult, RecognizerError> {
        let encoded = image.to_base64();
        let request = RecognizeRequest {
            image: &encoded,
            threshold,
        };

        tracing::debug!(bytes = image.len(), threshold, "Querying face recognizer");

        let response = self
            .http_client
            .post(self.url("/recognize-face-base64"))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = Self::check_status(response).await?;

        let body: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| RecognizerError::Parse(e.to_string()))?;

        // A 2xx reply without a usable match (including "No face detected") is a no-match
        if !body.success {
            tracing::debug!(message = ?body.message, "Recognizer found no usable face");
        }

        let confidence = body.confidence.unwrap_or(0.0);
        let result = match body.student_id {
            Some(student_id) if body.success && body.recognized => {
                RecognitionResult::matched(student_id, confidence)
            }
            _ => RecognitionResult::unmatched(confidence),
        };
        Ok(result)
    }

    async fn register_face(
        &self,
        student_id: &str,
        image: &CaptureImage,
    ) -> std::result::Result<(), RecognizerError> {
        let encoded = image.to_base64();
        let request = RegisterRequest {
            student_id,
            image: &encoded,
        };

        let response = self
            .http_client
            .post(self.url("/register-face-base64"))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = Self::check_status(response).await?;

        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|e| RecognizerError::Parse(e.to_string()))?;
        if !body.success {
            return Err(RecognizerError::Status(
                200,
                body.message.unwrap_or_else(|| "face registration rejected".to_string()),
            ));
        }
        Ok(())
    }

    async fn registered_faces(&self) -> std::result::Result<RegisteredFaces, RecognizerError> {
        let response = self
            .http_client
            .get(self.url("/registered-faces"))
            .send()
            .await
            .map_err(transport_error)?;
        let response = Self::check_status(response).await?;

        let body: RegisteredFacesResponse = response
            .json()
            .await
            .map_err(|e| RecognizerError::Parse(e.to_string()))?;
        let count = body.count.unwrap_or(body.student_ids.len());
        Ok(RegisteredFaces {
            student_ids: body.student_ids,
            count,
        })
    }
}

/// Reject thresholds outside [0, 1]
pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::InvalidInput(format!(
            "threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(threshold)
}

/// Request/response adapter in front of the recognizer
#[derive(Clone)]
pub struct RecognitionGateway {
    recognizer: Arc<dyn Recognizer>,
    timeout: Duration,
}

impl RecognitionGateway {
    pub fn new(recognizer: Arc<dyn Recognizer>, timeout: Duration) -> Self {
        Self {
            recognizer,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Match `image` against enrolled faces; `threshold` defaults to 0.6
    pub async fn recognize(
        &self,
        image: &CaptureImage,
        threshold: Option<f64>,
    ) -> Result<RecognitionResult> {
        let threshold = validate_threshold(threshold.unwrap_or(DEFAULT_THRESHOLD))?;

        let result = self
            .bounded(self.recognizer.recognize(image, threshold))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Face recognizer unavailable");
                Error::from(e)
            })?;

        tracing::debug!(
            recognized = result.recognized,
            student_id = ?result.student_id,
            confidence = result.confidence,
            "Recognizer answered"
        );
        Ok(result)
    }

    pub async fn register_face(&self, student_id: &str, image: &CaptureImage) -> Result<()> {
        if student_id.trim().is_empty() {
            return Err(Error::MissingInput("studentId is required".to_string()));
        }
        self.bounded(self.recognizer.register_face(student_id, image))
            .await
            .map_err(|e| {
                tracing::warn!(student_id, error = %e, "Face registration failed");
                Error::from(e)
            })?;

        tracing::info!(student_id, "Face registered with recognizer");
        Ok(())
    }

    pub async fn registered_faces(&self) -> Result<RegisteredFaces> {
        self.bounded(self.recognizer.registered_faces())
            .await
            .map_err(Error::from)
    }

    async fn bounded<T, F>(&self, call: F) -> std::result::Result<T, RecognizerError>
    where
        F: std::future::Future<Output = std::result::Result<T, RecognizerError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(RecognizerError::Timeout(_))) => Err(RecognizerError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RecognizerError::Timeout(self.timeout)),
        }
    }
}
