//! Recognition module
//!
//! Service contracts, evidence parsing and the scan orchestrator that turns
//! a captured image into a reconciled nutrition record.

pub mod capture;
pub mod evidence;
pub mod http_client;
pub mod orchestrator;
pub mod pipeline;
pub mod services;
pub mod session;
pub mod stages;

pub use capture::{CaptureError, CapturedImage, LocalImageStore};
pub use evidence::{EvidenceItem, RecognitionEvidence};
pub use http_client::{HttpRecognitionService, UnconfiguredRecognition};
pub use orchestrator::{ScanContext, ScanError, ScanEvent, ScanState, Scanner};
pub use pipeline::{recalculate_record, ScanOverrides};
pub use services::{
    ImageUploader, ProductDatabase, RecognitionInput, RecognitionService, RecognitionTask, RecordSink,
    ServiceError,
};
pub use session::SessionRegistry;
