//! Image submission encodings.
//!
//! The service accepts an image either as a multipart part named `file` or as
//! a JSON body `{"file": "<base64>"}`. Both produce the same registration.

use crate::error::ClientError;
use crate::transport::{FilePart, RequestBody};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::path::Path;

/// Form field / JSON key carrying the image.
pub const FILE_FIELD: &str = "file";

/// Image bytes plus the file name they were read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    file_name: String,
    bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read an image file from disk.
    pub fn from_path(path: &Path) -> Result<Self, ClientError> {
        let bytes = std::fs::read(path).map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());
        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// MIME type guessed from the file extension, defaulting to JPEG.
    pub fn mime_type(&self) -> &'static str {
        let ext = Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("bmp") => "image/bmp",
            _ => "image/jpeg",
        }
    }
}

/// How an image is placed in the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Multipart,
    Base64Json,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Multipart => "multipart",
            Encoding::Base64Json => "base64",
        }
    }

    pub fn encode(self, image: &ImageUpload) -> RequestBody {
        match self {
            Encoding::Multipart => RequestBody::Multipart(FilePart {
                field: FILE_FIELD.to_string(),
                file_name: image.file_name.clone(),
                mime: image.mime_type().to_string(),
                bytes: image.bytes.clone(),
            }),
            Encoding::Base64Json => RequestBody::Json(serde_json::json!({
                FILE_FIELD: BASE64.encode(&image.bytes),
            })),
        }
    }
}
