use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Network-level failure: no usable HTTP exchange took place.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Body of a non-2xx response, exactly as the service sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Json(serde_json::Value),
    Text(String),
}

impl ErrorBody {
    /// Human-oriented summary: the `message` field, then `error`, then the raw body.
    pub fn message(&self) -> String {
        match self {
            ErrorBody::Json(value) => ["message", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
            ErrorBody::Text(text) => text.clone(),
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBody::Json(value) => write!(f, "{value}"),
            ErrorBody::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    /// A local parameter was rejected before any request was issued.
    #[error("invalid parameter: {0}")]
    Validation(String),
    #[error("not found: {target}: {body}")]
    NotFound { target: String, body: ErrorBody },
    #[error("rejected by service (HTTP {status}): {body}")]
    Rejected { status: u16, body: ErrorBody },
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// A missing id or subject. Callers may treat this as non-fatal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ClientError::Rejected { .. })
    }

    /// HTTP status for application-level failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound { .. } => Some(404),
            ClientError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
