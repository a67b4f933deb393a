//! Marking core and supporting services

pub mod ledger;
pub mod marking;
pub mod recognition;
pub mod registry;
pub mod settings;
pub mod students;
pub mod unknown_faces;

pub use ledger::AttendanceLedger;
pub use marking::{AttendanceMarkingService, MarkOutcome, MarkRequest};
pub use recognition::{
    CaptureImage, HttpRecognizer, RecognitionGateway, Recognizer, RecognizerError, RegisteredFaces,
};
pub use registry::{NewSession, SessionRegistry};
pub use settings::SettingsService;
pub use students::{StudentInput, StudentService};
pub use unknown_faces::UnknownFaceLog;
