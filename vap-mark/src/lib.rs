//! vap-mark library interface
//!
//! Exposes the marking core, the storage layer and the HTTP router so the
//! binary and the integration tests share one wiring.

pub mod api;
pub mod error;
pub mod services;
pub mod store;

pub use crate::error::{Error, Result};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vap_common::models::DEFAULT_THRESHOLD;

use crate::services::{
    AttendanceLedger, AttendanceMarkingService, RecognitionGateway, Recognizer, SessionRegistry,
    SettingsService, StudentService, UnknownFaceLog,
};
use crate::store::Repository;

/// Module name reported by `/health`
pub const MODULE_NAME: &str = "vap-mark";

/// Tunables taken from the bootstrap config
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub recognizer_timeout: Duration,
    pub default_threshold: f64,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            recognizer_timeout: Duration::from_secs(5),
            default_threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: RecognitionGateway,
    pub registry: Arc<SessionRegistry>,
    pub ledger: Arc<AttendanceLedger>,
    pub unknown_faces: Arc<UnknownFaceLog>,
    pub students: Arc<StudentService>,
    pub settings: Arc<SettingsService>,
    pub marking: Arc<AttendanceMarkingService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        recognizer: Arc<dyn Recognizer>,
        options: ServiceOptions,
    ) -> Self {
        let gateway = RecognitionGateway::new(recognizer, options.recognizer_timeout);
        let registry = Arc::new(SessionRegistry::new(repo.clone()));
        let ledger = Arc::new(AttendanceLedger::new(repo.clone()));
        let unknown_faces = Arc::new(UnknownFaceLog::new(repo.clone()));
        let students = Arc::new(StudentService::new(repo.clone()));
        let settings = Arc::new(SettingsService::new(repo, options.default_threshold));

        let marking = Arc::new(AttendanceMarkingService::new(
            gateway.clone(),
            registry.clone(),
            ledger.clone(),
            unknown_faces.clone(),
            students.clone(),
            settings.clone(),
        ));

        Self {
            gateway,
            registry,
            ledger,
            unknown_faces,
            students,
            settings,
            marking,
            startup_time: vap_common::time::now(),
        }
    }
}

/// Build application router
///
/// CORS is permissive: the dashboard is served from a different origin.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::attendance_routes())
        .merge(api::session_routes())
        .merge(api::unknown_face_routes())
        .merge(api::student_routes())
        .merge(api::face_recognition_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
