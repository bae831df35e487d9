//! facewire-core: client and workflow engine for the face recognition API.
//!
//! Wraps every `/v1/recognition` capability in a typed, blocking operation and
//! chains them into multi-step workflows (register → recognize → search →
//! delete). The service does all detection and matching; this crate only
//! encodes requests, validates parameters and interprets responses.

pub mod client;
pub mod config;
pub mod datastore;
pub mod encoding;
pub mod error;
pub mod transport;
pub mod types;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{DeleteAllConfirmation, RecognitionClient, Timeouts};
pub use config::{Config, ConfigError};
pub use datastore::{DatastoreConfig, MySqlConfig, PostgresConfig};
pub use encoding::{Encoding, ImageUpload};
pub use error::{ClientError, ErrorBody, TransportError};
pub use transport::{HttpTransport, Transport};
pub use types::{
    BulkDeleteOutcome, DatastoreAck, DeleteAllOutcome, DeletedFace, DetectedFace, FaceBox,
    FaceSummary, ListQuery, PaginatedListing, Prediction, RecognitionResult, RecognizeOptions,
    RegisterOptions, RegisteredFace, RenameOutcome, SearchMatch, SearchOptions, SearchResult,
};
pub use workflow::{
    switch_datastore, DatastoreSwitch, DetectionValidation, DetectionValidationPlan,
    DetectionValidationReport, FullWorkflow, FullWorkflowPlan, Stage, TrialOutcome, WorkflowError,
    WorkflowReport,
};
