//! HTTP transport for the recognition API.
//!
//! The client builds [`ApiRequest`]s and hands them to a [`Transport`]. Every
//! HTTP status comes back as an [`ApiResponse`] with its body intact; only
//! network-level failures become a [`TransportError`].

use crate::error::TransportError;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// HTTP verbs used by the recognition API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A single binary file part of a multipart form.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    None,
    Json(Value),
    Multipart(FilePart),
}

impl RequestBody {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::None => "none",
            RequestBody::Json(_) => "json",
            RequestBody::Multipart(_) => "multipart",
        }
    }
}

/// One request against the API, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path segments below the base URL, unescaped (`["faces", "old name"]`).
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl ApiRequest {
    pub fn new(method: Method, segments: &[&str], timeout: Duration) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
            body: RequestBody::None,
            timeout,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Display form of the path, e.g. `/faces/delete`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Value of the first query parameter named `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Text(String),
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Parse the raw body as JSON when possible, keeping the text otherwise.
    pub fn from_raw(status: u16, text: String) -> Self {
        let body = if text.trim().is_empty() {
            ResponseBody::Empty
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => ResponseBody::Json(value),
                Err(_) => ResponseBody::Text(text),
            }
        };
        Self { status, body }
    }

    pub fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            body: ResponseBody::Json(value),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode a successful body into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, TransportError> {
        let value = match self.body {
            ResponseBody::Json(value) => value,
            ResponseBody::Empty => Value::Object(Default::default()),
            ResponseBody::Text(text) => {
                return Err(TransportError::MalformedResponse(format!(
                    "expected JSON body, got: {}",
                    truncate(&text, 200)
                )))
            }
        };
        serde_json::from_value(value)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Sends requests to the recognition service.
pub trait Transport {
    fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Blocking HTTP transport backed by a pooled `reqwest` client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for a request's path segments. Segments are percent-encoded.
    pub fn url_for(&self, segments: &[String]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.segments)?;
        let timeout = request.timeout;

        tracing::debug!(
            method = request.method.as_str(),
            %url,
            body = request.body.kind(),
            timeout_secs = timeout.as_secs(),
            "sending request"
        );

        let mut builder = self
            .client
            .request(request.method.to_reqwest(), url)
            .timeout(timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref key) = self.api_key {
            builder = builder.header("x-api-key", key);
        }

        builder = match request.body {
            RequestBody::None => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(file) => {
                let part = Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime)
                    .map_err(|e| TransportError::Request(format!("invalid MIME type: {e}")))?;
                builder.multipart(Form::new().part(file.field, part))
            }
        };

        let response = builder.send().map_err(|e| classify(e, timeout))?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|e| classify(e, timeout))?;

        tracing::debug!(status, bytes = text.len(), "response received");
        Ok(ApiResponse::from_raw(status, text))
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
