//! HTTP API handlers for vap-mark

pub mod attendance;
pub mod extract;
pub mod face_recognition;
pub mod health;
pub mod sessions;
pub mod settings;
pub mod students;
pub mod unknown_faces;

pub use attendance::attendance_routes;
pub use extract::JsonBody;
pub use face_recognition::face_recognition_routes;
pub use health::health_routes;
pub use sessions::session_routes;
pub use settings::settings_routes;
pub use students::student_routes;
pub use unknown_faces::unknown_face_routes;
