//! Reshape instance configs from a flat `additionalParams` map into
//! `{"input": {...}, "output": {...}}`.

use crate::ToolError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PARAMS_KEY: &str = "additionalParams";

const INPUT_KEYS: &[&str] = &[
    "FILE_PATH",
    "RTSP_SRC_URL",
    "RTSP_URL",
    "RTMP_SRC_URL",
    "RTMP_URL",
    "HLS_URL",
    "HTTP_URL",
    "MODEL_PATH",
    "SFACE_MODEL_PATH",
    "WEIGHTS_PATH",
    "CONFIG_PATH",
    "LABELS_PATH",
    "RESIZE_RATIO",
    "MODEL_NAME",
    "SFACE_MODEL_NAME",
    "FACE_DETECTION_MODEL_PATH",
    "BUFFALO_L_FACE_ENCODING_MODEL",
    "EMAP_FILE_FOR_EMBEDDINGS",
    "FACE_SWAP_MODEL_PATH",
    "SWAP_SOURCE_IMAGE",
    "INPUT_WIDTH",
    "INPUT_HEIGHT",
    "SCORE_THRESHOLD",
    "CROSSLINE_START_X",
    "CROSSLINE_START_Y",
    "CROSSLINE_END_X",
    "CROSSLINE_END_Y",
    "LINE_CHANNEL",
    "LINE_START_X",
    "LINE_START_Y",
    "LINE_END_X",
    "LINE_END_Y",
];

const OUTPUT_KEYS: &[&str] = &[
    "RTMP_URL",
    "RTMP_DES_URL",
    "MQTT_BROKER_URL",
    "MQTT_PORT",
    "MQTT_TOPIC",
    "MQTT_USERNAME",
    "MQTT_PASSWORD",
    "MQTT_RATE_LIMIT_MS",
    "ENABLE_SCREEN_DES",
    "RECORD_PATH",
    "BROKE_FOR",
    "PROCESSING_DELAY_MS",
];

const INPUT_HINTS: &[&str] = &[
    "PATH", "MODEL", "WEIGHT", "CONFIG", "LABEL", "URL", "SRC", "RATIO", "INPUT",
];
const OUTPUT_HINTS: &[&str] = &["OUTPUT", "DES", "MQTT", "SCREEN", "RECORD", "BROKE"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Input,
    Output,
    Unknown,
}

fn classify(key: &str, rtmp_is_output: bool) -> Section {
    if INPUT_KEYS.contains(&key) {
        // RTMP_URL is the push target when a destination URL is also configured.
        if key == "RTMP_URL" && rtmp_is_output {
            return Section::Output;
        }
        return Section::Input;
    }
    if OUTPUT_KEYS.contains(&key) {
        return Section::Output;
    }
    let upper = key.to_ascii_uppercase();
    if INPUT_HINTS.iter().any(|hint| upper.contains(hint)) {
        Section::Input
    } else if OUTPUT_HINTS.iter().any(|hint| upper.contains(hint)) {
        Section::Output
    } else {
        Section::Unknown
    }
}

/// Split flat params into the sectioned shape. Unclassified keys go to
/// `input` after the classified ones; empty sections are omitted.
pub fn migrate_params(params: &Map<String, Value>) -> Map<String, Value> {
    let rtmp_is_output = params.contains_key("RTMP_DES_URL");
    let mut input = Map::new();
    let mut output = Map::new();
    let mut unknown = Map::new();

    for (key, value) in params {
        let target = match classify(key, rtmp_is_output) {
            Section::Input => &mut input,
            Section::Output => &mut output,
            Section::Unknown => &mut unknown,
        };
        target.insert(key.clone(), value.clone());
    }
    input.extend(unknown);

    let mut sectioned = Map::new();
    if !input.is_empty() {
        sectioned.insert("input".into(), Value::Object(input));
    }
    if !output.is_empty() {
        sectioned.insert("output".into(), Value::Object(output));
    }
    sectioned
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    Updated,
    AlreadyMigrated,
    /// No `additionalParams` object to reshape.
    NoParams,
}

/// Migrate one file in place. With `dry_run`, report without writing.
pub fn migrate_file(path: &Path, dry_run: bool) -> Result<FileOutcome, ToolError> {
    let text = std::fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut doc: Value = serde_json::from_str(&text).map_err(|source| ToolError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let root = doc
        .as_object_mut()
        .ok_or_else(|| ToolError::NotAnObject(path.to_path_buf()))?;

    let Some(Value::Object(params)) = root.get(PARAMS_KEY) else {
        return Ok(FileOutcome::NoParams);
    };
    if params.contains_key("input") || params.contains_key("output") {
        return Ok(FileOutcome::AlreadyMigrated);
    }

    let sectioned = migrate_params(params);
    root.insert(PARAMS_KEY.into(), Value::Object(sectioned));

    if !dry_run {
        let mut out = serde_json::to_string_pretty(&doc).map_err(|source| ToolError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        out.push('\n');
        std::fs::write(path, out).map_err(|source| ToolError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    tracing::info!(path = %path.display(), dry_run, "instance config migrated");
    Ok(FileOutcome::Updated)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<MigrationFailure>,
}

fn is_report_body(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_ascii_lowercase().contains("report_body"))
}

/// Migrate every `*.json` under `dir`, in path order. A file that fails is
/// recorded and the walk continues.
pub fn migrate_dir(dir: &Path, dry_run: bool) -> Result<MigrationSummary, ToolError> {
    let mut summary = MigrationSummary::default();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| ToolError::Io {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if is_report_body(path) {
            summary.skipped += 1;
            continue;
        }
        match migrate_file(path, dry_run) {
            Ok(FileOutcome::Updated) => summary.updated += 1,
            Ok(outcome) => {
                tracing::debug!(path = %path.display(), ?outcome, "skipped");
                summary.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "migration failed");
                summary.errors.push(MigrationFailure {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        updated = summary.updated,
        skipped = summary.skipped,
        errors = summary.errors.len(),
        "migration finished"
    );
    Ok(summary)
}
