//! Offline helpers that sit beside the recognition client: reshaping instance
//! config files and summarising the instance monitor CSV.

pub mod migrate;
pub mod monitor;

use std::path::PathBuf;
use thiserror::Error;

pub use migrate::{migrate_dir, migrate_file, migrate_params, FileOutcome, MigrationSummary};
pub use monitor::{read_samples, summarize, InstanceSummary, MonitorSample};

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("{} is not a JSON object", .0.display())]
    NotAnObject(PathBuf),
}
