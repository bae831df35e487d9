use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_DET_PROB_THRESHOLD: f32 = 0.5;
pub const DEFAULT_PREDICTION_COUNT: u32 = 3;
pub const DEFAULT_SEARCH_THRESHOLD: f32 = 0.5;
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A face stored under a subject, as returned by register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredFace {
    pub image_id: String,
    pub subject: String,
}

/// The face removed by a delete-one call.
pub type DeletedFace = RegisteredFace;

/// Detected face region in image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub probability: f32,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// One `(subject, similarity)` guess for a detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub subject: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    #[serde(rename = "box")]
    pub bbox: FaceBox,
    #[serde(default)]
    pub landmarks: Vec<[f32; 2]>,
    /// Ranked best-first, at most `prediction_count` entries.
    #[serde(default, rename = "subjects")]
    pub predictions: Vec<Prediction>,
    /// Per-stage server timings in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<BTreeMap<String, f64>>,
}

impl DetectedFace {
    pub fn top_prediction(&self) -> Option<&Prediction> {
        self.predictions.first()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecognitionResult {
    #[serde(default, rename = "result")]
    pub faces: Vec<DetectedFace>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub subject: String,
    pub similarity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SearchResult {
    /// Faces the service detected in the query image, as it reported them.
    /// Independent of how many matches survive the threshold and limit.
    pub faces_found: usize,
    /// Ranked best-first; all at or above the requested threshold.
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchWire {
    #[serde(default)]
    pub faces_found: Option<usize>,
    #[serde(default, alias = "matches", alias = "results")]
    pub result: Vec<SearchMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceSummary {
    pub image_id: String,
    pub subject: String,
}

/// One page of stored faces. `page` and `size` echo the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginatedListing {
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    pub faces: Vec<FaceSummary>,
}

impl PaginatedListing {
    pub fn image_ids(&self) -> Vec<&str> {
        self.faces.iter().map(|f| f.image_id.as_str()).collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingWire {
    #[serde(default)]
    pub faces: Vec<FaceSummary>,
    #[serde(default)]
    pub total_elements: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u64>,
}

/// Result of a bulk delete. Ids missing from the service's `deleted` list
/// have an unknown outcome, so they are reported as unconfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkDeleteOutcome {
    Complete {
        deleted: Vec<String>,
    },
    Partial {
        deleted: Vec<String>,
        unconfirmed: Vec<String>,
    },
}

impl BulkDeleteOutcome {
    pub fn deleted(&self) -> &[String] {
        match self {
            BulkDeleteOutcome::Complete { deleted } => deleted,
            BulkDeleteOutcome::Partial { deleted, .. } => deleted,
        }
    }

    pub fn unconfirmed(&self) -> &[String] {
        match self {
            BulkDeleteOutcome::Complete { .. } => &[],
            BulkDeleteOutcome::Partial { unconfirmed, .. } => unconfirmed,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, BulkDeleteOutcome::Partial { .. })
    }
}

/// Entries of the `deleted` array: bare ids or face objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum DeletedEntry {
    Id(String),
    Face { image_id: String },
}

impl DeletedEntry {
    pub fn into_id(self) -> String {
        match self {
            DeletedEntry::Id(id) => id,
            DeletedEntry::Face { image_id } => image_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkDeleteWire {
    #[serde(default)]
    pub deleted: Vec<DeletedEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAllOutcome {
    #[serde(default)]
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOutcome {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub updated: bool,
}

/// Acknowledgement of a datastore change. Not proof the change took effect.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DatastoreAck {
    #[serde(default)]
    pub message: String,
}

/// The service reports flags as `true` or `"true"`.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true") || s == "1",
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterOptions {
    pub det_prob_threshold: f32,
    pub encoding: crate::encoding::Encoding,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            det_prob_threshold: DEFAULT_DET_PROB_THRESHOLD,
            encoding: crate::encoding::Encoding::Multipart,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizeOptions {
    pub det_prob_threshold: f32,
    pub prediction_count: u32,
    /// Maximum faces returned; 0 means unbounded.
    pub limit: u32,
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self {
            det_prob_threshold: DEFAULT_DET_PROB_THRESHOLD,
            prediction_count: DEFAULT_PREDICTION_COUNT,
            limit: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    pub threshold: f32,
    /// Maximum matches returned; 0 means unbounded.
    pub limit: u32,
    pub det_prob_threshold: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SEARCH_THRESHOLD,
            limit: DEFAULT_SEARCH_LIMIT,
            det_prob_threshold: DEFAULT_DET_PROB_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub size: u32,
    pub subject: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            subject: None,
        }
    }
}

impl ListQuery {
    pub fn for_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }
}
