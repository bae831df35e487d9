//! Multi-step scenarios built from client operations.
//!
//! [`FullWorkflow`] runs inventory → register → recognize → search →
//! (delete), threading a [`WorkflowContext`] between stages. The first failing
//! stage halts the run. [`DetectionValidation`] runs two independent trials.

use crate::client::{check_unit_interval, RecognitionClient};
use crate::datastore::DatastoreConfig;
use crate::encoding::{Encoding, ImageUpload};
use crate::error::ClientError;
use crate::transport::Transport;
use crate::types::{
    DatastoreAck, DeletedFace, ListQuery, PaginatedListing, RecognitionResult, RecognizeOptions,
    RegisterOptions, RegisteredFace, SearchOptions, SearchResult, DEFAULT_DET_PROB_THRESHOLD,
};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Subject used for the face-present detection trial.
pub const FACE_TRIAL_SUBJECT: &str = "test_face_detection";
/// Subject used for the face-absent detection trial.
pub const NO_FACE_TRIAL_SUBJECT: &str = "test_no_face";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inventory,
    Register,
    Recognize,
    Search,
    Delete,
}

impl Stage {
    /// Client operation the stage performs.
    pub fn operation(&self) -> &'static str {
        match self {
            Stage::Inventory => "list",
            Stage::Register => "register",
            Stage::Recognize => "recognize",
            Stage::Search => "search",
            Stage::Delete => "delete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Inventory => "inventory",
            Stage::Register => "register",
            Stage::Recognize => "recognize",
            Stage::Search => "search",
            Stage::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Start,
    Registered,
    Recognized,
    Searched,
    Deleted,
    End,
}

impl WorkflowState {
    pub fn can_advance_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Start, Registered)
                | (Registered, Recognized)
                | (Recognized, Searched)
                | (Searched, Deleted)
                | (Searched, End)
                | (Deleted, End)
        )
    }
}

#[derive(Error, Debug)]
#[error("workflow halted at stage {stage} ({operation}): {source}")]
pub struct WorkflowError {
    pub stage: Stage,
    pub operation: &'static str,
    #[source]
    pub source: ClientError,
}

impl WorkflowError {
    fn at(stage: Stage) -> impl FnOnce(ClientError) -> WorkflowError {
        move |source| WorkflowError {
            stage,
            operation: stage.operation(),
            source,
        }
    }
}

/// Inputs for one run of the full workflow.
#[derive(Debug, Clone)]
pub struct FullWorkflowPlan {
    pub subject: String,
    pub image: PathBuf,
    /// Defaults to `image` when unset.
    pub recognize_image: Option<PathBuf>,
    /// Defaults to `image` when unset.
    pub search_image: Option<PathBuf>,
    pub register: RegisterOptions,
    pub recognize: RecognizeOptions,
    pub search: SearchOptions,
    pub delete_after: bool,
}

impl FullWorkflowPlan {
    pub fn new(subject: impl Into<String>, image: impl Into<PathBuf>) -> Self {
        Self {
            subject: subject.into(),
            image: image.into(),
            recognize_image: None,
            search_image: None,
            register: RegisterOptions::default(),
            recognize: RecognizeOptions::default(),
            search: SearchOptions::default(),
            delete_after: false,
        }
    }
}

/// State carried from one stage to the next within a single run.
#[derive(Debug)]
pub struct WorkflowContext {
    state: WorkflowState,
    history: Vec<WorkflowState>,
    subject: String,
    source_image: PathBuf,
    image_id: Option<String>,
}

impl WorkflowContext {
    fn new(plan: &FullWorkflowPlan) -> Self {
        Self {
            state: WorkflowState::Start,
            history: vec![WorkflowState::Start],
            subject: plan.subject.clone(),
            source_image: plan.image.clone(),
            image_id: None,
        }
    }

    fn advance(&mut self, next: WorkflowState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(from = ?self.state, to = ?next, "workflow state");
        self.state = next;
        self.history.push(next);
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn image_id(&self) -> Option<&str> {
        self.image_id.as_deref()
    }

    /// The override if given, else the image registered earlier in this run.
    fn image_or_source<'a>(&'a self, over: Option<&'a Path>) -> &'a Path {
        over.unwrap_or(self.source_image.as_path())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeleteStatus {
    Deleted { face: DeletedFace },
    /// The face was already gone; not a failure.
    NotFound { image_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub states: Vec<WorkflowState>,
    pub inventory: PaginatedListing,
    pub registered: RegisteredFace,
    pub recognition: RecognitionResult,
    pub search: SearchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DeleteStatus>,
}

pub struct FullWorkflow<'a, T: Transport> {
    client: &'a RecognitionClient<T>,
}

impl<'a, T: Transport> FullWorkflow<'a, T> {
    pub fn new(client: &'a RecognitionClient<T>) -> Self {
        Self { client }
    }

    pub fn run(&self, plan: &FullWorkflowPlan) -> Result<WorkflowReport, WorkflowError> {
        let mut ctx = WorkflowContext::new(plan);
        tracing::info!(subject = %plan.subject, image = %plan.image.display(), "full workflow starting");

        let inventory = self.inventory()?;
        let registered = self.register(&mut ctx, plan)?;
        let recognition = self.recognize(&mut ctx, plan)?;
        let search = self.search(&mut ctx, plan)?;
        let deleted = if plan.delete_after {
            Some(self.delete(&mut ctx)?)
        } else {
            None
        };
        ctx.advance(WorkflowState::End);

        tracing::info!(subject = %ctx.subject, "full workflow complete");
        Ok(WorkflowReport {
            states: ctx.history,
            inventory,
            registered,
            recognition,
            search,
            deleted,
        })
    }

    fn inventory(&self) -> Result<PaginatedListing, WorkflowError> {
        let listing = self
            .client
            .list(&ListQuery::default())
            .map_err(WorkflowError::at(Stage::Inventory))?;
        tracing::info!(total = listing.total_elements, "existing faces");
        Ok(listing)
    }

    fn register(
        &self,
        ctx: &mut WorkflowContext,
        plan: &FullWorkflowPlan,
    ) -> Result<RegisteredFace, WorkflowError> {
        let image =
            ImageUpload::from_path(&ctx.source_image).map_err(WorkflowError::at(Stage::Register))?;
        let face = self
            .client
            .register(&ctx.subject, &image, plan.register)
            .map_err(WorkflowError::at(Stage::Register))?;

        // The service may normalise the subject name.
        ctx.subject = face.subject.clone();
        ctx.image_id = Some(face.image_id.clone());
        ctx.advance(WorkflowState::Registered);
        Ok(face)
    }

    fn recognize(
        &self,
        ctx: &mut WorkflowContext,
        plan: &FullWorkflowPlan,
    ) -> Result<RecognitionResult, WorkflowError> {
        let path = ctx.image_or_source(plan.recognize_image.as_deref());
        let image = ImageUpload::from_path(path).map_err(WorkflowError::at(Stage::Recognize))?;
        let result = self
            .client
            .recognize(&image, plan.recognize)
            .map_err(WorkflowError::at(Stage::Recognize))?;
        ctx.advance(WorkflowState::Recognized);
        Ok(result)
    }

    fn search(
        &self,
        ctx: &mut WorkflowContext,
        plan: &FullWorkflowPlan,
    ) -> Result<SearchResult, WorkflowError> {
        let path = ctx.image_or_source(plan.search_image.as_deref());
        let image = ImageUpload::from_path(path).map_err(WorkflowError::at(Stage::Search))?;
        let result = self
            .client
            .search(&image, plan.search)
            .map_err(WorkflowError::at(Stage::Search))?;
        ctx.advance(WorkflowState::Searched);
        Ok(result)
    }

    fn delete(&self, ctx: &mut WorkflowContext) -> Result<DeleteStatus, WorkflowError> {
        let image_id = ctx.image_id.clone().ok_or_else(|| {
            WorkflowError::at(Stage::Delete)(ClientError::Validation(
                "no image id registered in this run".into(),
            ))
        })?;
        let status = match self.client.delete(&image_id) {
            Ok(face) => DeleteStatus::Deleted { face },
            Err(e) if e.is_not_found() => {
                tracing::warn!(%image_id, "registered face already gone");
                DeleteStatus::NotFound { image_id }
            }
            Err(e) => return Err(WorkflowError::at(Stage::Delete)(e)),
        };
        ctx.advance(WorkflowState::Deleted);
        Ok(status)
    }
}

/// Inputs for the detection-validation scenario. A trial without an image is skipped.
#[derive(Debug, Clone)]
pub struct DetectionValidationPlan {
    pub face_image: Option<PathBuf>,
    pub no_face_image: Option<PathBuf>,
    pub det_prob_threshold: f32,
    pub encoding: Encoding,
    /// Delete any face registered by a trial once its verdict is known.
    pub cleanup: bool,
}

impl Default for DetectionValidationPlan {
    fn default() -> Self {
        Self {
            face_image: None,
            no_face_image: None,
            det_prob_threshold: DEFAULT_DET_PROB_THRESHOLD,
            encoding: Encoding::Multipart,
            cleanup: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TrialOutcome {
    Passed { detail: String },
    Failed { reason: String },
    Skipped { reason: String },
}

impl TrialOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TrialOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionValidationReport {
    pub face_present: TrialOutcome,
    pub face_absent: TrialOutcome,
}

impl DetectionValidationReport {
    pub fn has_failures(&self) -> bool {
        self.face_present.is_failed() || self.face_absent.is_failed()
    }
}

pub struct DetectionValidation<'a, T: Transport> {
    client: &'a RecognitionClient<T>,
}

impl<'a, T: Transport> DetectionValidation<'a, T> {
    pub fn new(client: &'a RecognitionClient<T>) -> Self {
        Self { client }
    }

    /// Run both trials. Only an invalid plan is an error; trial failures are verdicts.
    pub fn run(&self, plan: &DetectionValidationPlan) -> Result<DetectionValidationReport, ClientError> {
        check_unit_interval("det_prob_threshold", plan.det_prob_threshold)?;
        let options = RegisterOptions {
            det_prob_threshold: plan.det_prob_threshold,
            encoding: plan.encoding,
        };

        let face_present = match load_trial_image(plan.face_image.as_deref()) {
            Ok(image) => self.face_present_trial(&image, options, plan.cleanup),
            Err(skipped) => skipped,
        };
        tracing::info!(outcome = ?face_present, "face-present trial finished");

        let face_absent = match load_trial_image(plan.no_face_image.as_deref()) {
            Ok(image) => self.face_absent_trial(&image, options, plan.cleanup),
            Err(skipped) => skipped,
        };
        tracing::info!(outcome = ?face_absent, "face-absent trial finished");

        Ok(DetectionValidationReport {
            face_present,
            face_absent,
        })
    }

    fn face_present_trial(
        &self,
        image: &ImageUpload,
        options: RegisterOptions,
        cleanup: bool,
    ) -> TrialOutcome {
        match self.client.register(FACE_TRIAL_SUBJECT, image, options) {
            Ok(face) => {
                if cleanup {
                    self.cleanup(&face);
                }
                TrialOutcome::Passed {
                    detail: format!("face accepted as image {}", face.image_id),
                }
            }
            Err(e) => TrialOutcome::Failed {
                reason: format!("image with a face was not accepted: {e}"),
            },
        }
    }

    fn face_absent_trial(
        &self,
        image: &ImageUpload,
        options: RegisterOptions,
        cleanup: bool,
    ) -> TrialOutcome {
        match self.client.register(NO_FACE_TRIAL_SUBJECT, image, options) {
            Ok(face) => {
                if cleanup {
                    self.cleanup(&face);
                }
                TrialOutcome::Failed {
                    reason: format!("image without a face was accepted as {}", face.image_id),
                }
            }
            Err(ClientError::Rejected { status, body }) if is_detection_rejection(status) => {
                TrialOutcome::Passed {
                    detail: format!("rejected with HTTP {status}: {}", body.message()),
                }
            }
            Err(e) => TrialOutcome::Failed {
                reason: format!("expected a rejection, got: {e}"),
            },
        }
    }

    fn cleanup(&self, face: &RegisteredFace) {
        if let Err(e) = self.client.delete(&face.image_id) {
            tracing::warn!(image_id = %face.image_id, error = %e, "trial cleanup failed");
        }
    }
}

/// A client-side rejection of the image itself. Auth failures and server
/// errors say nothing about detection.
fn is_detection_rejection(status: u16) -> bool {
    (400..500).contains(&status) && status != 401 && status != 403
}

fn load_trial_image(path: Option<&Path>) -> Result<ImageUpload, TrialOutcome> {
    let path = path.ok_or_else(|| TrialOutcome::Skipped {
        reason: "no image provided".into(),
    })?;
    ImageUpload::from_path(path).map_err(|e| TrialOutcome::Skipped {
        reason: e.to_string(),
    })
}

/// Outcome of a datastore switch confirmed by re-reading the server's config.
#[derive(Debug, Clone, PartialEq)]
pub struct DatastoreSwitch {
    pub requested: DatastoreConfig,
    pub ack: DatastoreAck,
    pub reported: DatastoreConfig,
}

impl DatastoreSwitch {
    pub fn confirmed(&self) -> bool {
        self.requested == self.reported
    }
}

/// Set the datastore, then read it back. The server is the source of truth.
pub fn switch_datastore<T: Transport>(
    client: &RecognitionClient<T>,
    config: &DatastoreConfig,
) -> Result<DatastoreSwitch, ClientError> {
    let ack = client.set_datastore_config(config)?;
    let reported = client.datastore_config()?;
    let switch = DatastoreSwitch {
        requested: config.clone(),
        ack,
        reported,
    };
    if switch.confirmed() {
        tracing::info!(kind = config.kind(), "datastore switch confirmed");
    } else {
        tracing::warn!(
            requested = config.kind(),
            reported = switch.reported.kind(),
            "datastore switch not reflected by the service"
        );
    }
    Ok(switch)
}
