//! In-memory stand-in for the recognition service, used by unit tests.
//!
//! Images whose bytes start with `FACE` contain one face; anything else has
//! none. Identical bytes match with similarity 1.0; other faces score lower
//! the further apart their seed bytes are.

use crate::encoding::ImageUpload;
use crate::error::TransportError;
use crate::transport::{ApiRequest, ApiResponse, Method, RequestBody, Transport};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::time::Duration;

const FACE_MARKER: &[u8] = b"FACE";
const DETECTION_PROBABILITY: f64 = 0.99;

/// An image containing one face, distinguishable by `seed`.
pub fn face_image(file_name: &str, seed: u8) -> ImageUpload {
    let mut bytes = FACE_MARKER.to_vec();
    bytes.extend(std::iter::repeat(seed).take(16));
    ImageUpload::new(file_name, bytes)
}

pub fn no_face_image(file_name: &str) -> ImageUpload {
    ImageUpload::new(file_name, b"LANDSCAPE-NO-PEOPLE".to_vec())
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body_kind: &'static str,
    pub timeout: Duration,
}

struct StoredFace {
    image_id: String,
    subject: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
pub struct FakeService {
    faces: RefCell<Vec<StoredFace>>,
    datastore: RefCell<Option<Value>>,
    requests: RefCell<Vec<RecordedRequest>>,
    next_id: Cell<u32>,
    /// Respond with this status to every request whose path starts with the prefix.
    fail_path: RefCell<Option<(String, u16)>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub fn face_count(&self) -> usize {
        self.faces.borrow().len()
    }

    pub fn fail_requests_to(&self, path_prefix: &str, status: u16) {
        *self.fail_path.borrow_mut() = Some((path_prefix.to_string(), status));
    }

    fn image_bytes(body: &RequestBody) -> Option<Vec<u8>> {
        match body {
            RequestBody::Multipart(part) if part.field == "file" => Some(part.bytes.clone()),
            RequestBody::Json(value) => value
                .get("file")
                .and_then(Value::as_str)
                .and_then(|s| BASE64.decode(s).ok()),
            _ => None,
        }
    }

    fn similarity(a: &[u8], b: &[u8]) -> f64 {
        if a == b {
            return 1.0;
        }
        let seed_a = *a.last().unwrap_or(&0) as f64;
        let seed_b = *b.last().unwrap_or(&0) as f64;
        (0.5 - 0.05 * (seed_a - seed_b).abs()).max(0.0)
    }

    fn error(status: u16, error: &str, message: &str) -> ApiResponse {
        ApiResponse::json(status, json!({ "error": error, "message": message }))
    }

    fn detect(request: &ApiRequest) -> Result<Vec<u8>, ApiResponse> {
        let bytes = Self::image_bytes(&request.body)
            .ok_or_else(|| Self::error(400, "Invalid request", "Missing image file"))?;
        let threshold: f64 = request
            .query_value("det_prob_threshold")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.5);
        if !bytes.starts_with(FACE_MARKER) || threshold > DETECTION_PROBABILITY {
            return Err(Self::error(400, "Invalid request", "No face detected in image"));
        }
        Ok(bytes)
    }

    fn register(&self, request: &ApiRequest) -> ApiResponse {
        let Some(subject) = request.query_value("subject").filter(|s| !s.is_empty()) else {
            return Self::error(400, "Invalid request", "Missing subject");
        };
        let bytes = match Self::detect(request) {
            Ok(bytes) => bytes,
            Err(resp) => return resp,
        };
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        let image_id = format!("00000000-0000-4000-8000-{n:012}");
        self.faces.borrow_mut().push(StoredFace {
            image_id: image_id.clone(),
            subject: subject.to_string(),
            bytes,
        });
        ApiResponse::json(200, json!({ "image_id": image_id, "subject": subject }))
    }

    fn recognize(&self, request: &ApiRequest) -> ApiResponse {
        let Ok(bytes) = Self::detect(request) else {
            return ApiResponse::json(200, json!({ "result": [] }));
        };
        // Best similarity per subject, in registration order (unsorted).
        let mut subjects: Vec<(String, f64)> = Vec::new();
        for face in self.faces.borrow().iter() {
            let sim = Self::similarity(&bytes, &face.bytes);
            match subjects.iter_mut().find(|(s, _)| *s == face.subject) {
                Some(entry) => entry.1 = entry.1.max(sim),
                None => subjects.push((face.subject.clone(), sim)),
            }
        }
        let subjects: Vec<Value> = subjects
            .into_iter()
            .map(|(subject, similarity)| json!({ "subject": subject, "similarity": similarity }))
            .collect();
        ApiResponse::json(
            200,
            json!({
                "result": [{
                    "box": { "probability": DETECTION_PROBABILITY, "x_min": 100, "y_min": 100, "x_max": 300, "y_max": 300 },
                    "landmarks": [[150, 150], [250, 150], [200, 200], [160, 250], [240, 250]],
                    "subjects": subjects,
                    "execution_time": { "detector": 117.0, "calculator": 45.0 }
                }]
            }),
        )
    }

    fn search(&self, request: &ApiRequest) -> ApiResponse {
        let bytes = match Self::detect(request) {
            Ok(bytes) => bytes,
            Err(resp) => return resp,
        };
        let result: Vec<Value> = self
            .faces
            .borrow()
            .iter()
            .map(|face| {
                json!({
                    "subject": face.subject,
                    "similarity": Self::similarity(&bytes, &face.bytes),
                    "image_id": face.image_id,
                })
            })
            .collect();
        ApiResponse::json(200, json!({ "faces_found": 1, "result": result }))
    }

    fn list(&self, request: &ApiRequest) -> ApiResponse {
        let page: usize = request.query_value("page").and_then(|v| v.parse().ok()).unwrap_or(0);
        let size: usize = request.query_value("size").and_then(|v| v.parse().ok()).unwrap_or(20);
        let subject = request.query_value("subject");

        let faces = self.faces.borrow();
        let matching: Vec<&StoredFace> = faces
            .iter()
            .filter(|f| subject.map_or(true, |s| f.subject == s))
            .collect();
        let total = matching.len();
        let page_faces: Vec<Value> = matching
            .iter()
            .skip(page * size)
            .take(size)
            .map(|f| json!({ "image_id": f.image_id, "subject": f.subject }))
            .collect();
        ApiResponse::json(
            200,
            json!({
                "faces": page_faces,
                "page_number": page,
                "page_size": size,
                "total_pages": total.div_ceil(size.max(1)),
                "total_elements": total,
            }),
        )
    }

    fn delete_one(&self, target: &str) -> ApiResponse {
        let mut faces = self.faces.borrow_mut();
        if let Some(pos) = faces.iter().position(|f| f.image_id == target) {
            let face = faces.remove(pos);
            return ApiResponse::json(200, json!({ "image_id": face.image_id, "subject": face.subject }));
        }
        if let Some(pos) = faces.iter().position(|f| f.subject == target) {
            let first = faces.remove(pos);
            faces.retain(|f| f.subject != target);
            return ApiResponse::json(200, json!({ "image_id": first.image_id, "subject": first.subject }));
        }
        Self::error(404, "Not found", &format!("Face not found: {target}"))
    }

    fn delete_many(&self, request: &ApiRequest) -> ApiResponse {
        let RequestBody::Json(Value::Array(ids)) = &request.body else {
            return Self::error(400, "Invalid request", "Body must be a JSON array");
        };
        let mut faces = self.faces.borrow_mut();
        let mut deleted = Vec::new();
        for id in ids.iter().filter_map(Value::as_str) {
            if let Some(pos) = faces.iter().position(|f| f.image_id == id) {
                let face = faces.remove(pos);
                deleted.push(json!({ "image_id": face.image_id, "subject": face.subject }));
            }
        }
        ApiResponse::json(200, json!({ "deleted": deleted }))
    }

    fn rename(&self, old: &str, request: &ApiRequest) -> ApiResponse {
        let new = match &request.body {
            RequestBody::Json(value) => value.get("subject").and_then(Value::as_str).unwrap_or(""),
            _ => "",
        };
        if new.is_empty() {
            return Self::error(400, "Invalid request", "Missing subject field");
        }
        let mut faces = self.faces.borrow_mut();
        if !faces.iter().any(|f| f.subject == old) {
            return Self::error(404, "Not found", &format!("Subject not found: {old}"));
        }
        if faces.iter().any(|f| f.subject == new) {
            return Self::error(409, "Conflict", &format!("Subject already exists: {new}"));
        }
        for face in faces.iter_mut().filter(|f| f.subject == old) {
            face.subject = new.to_string();
        }
        ApiResponse::json(200, json!({ "updated": "true" }))
    }
}

impl Transport for FakeService {
    fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = request.path();
        self.requests.borrow_mut().push(RecordedRequest {
            method: request.method,
            path: path.clone(),
            body_kind: request.body.kind(),
            timeout: request.timeout,
        });

        if let Some((prefix, status)) = self.fail_path.borrow().as_ref() {
            if path.starts_with(prefix.as_str()) {
                return Ok(Self::error(*status, "Injected failure", "service unavailable"));
            }
        }

        let segments: Vec<&str> = request.segments.iter().map(String::as_str).collect();
        let response = match (request.method, segments.as_slice()) {
            (Method::Post, ["faces"]) => self.register(&request),
            (Method::Get, ["faces"]) => self.list(&request),
            (Method::Post, ["faces", "delete"]) => self.delete_many(&request),
            (Method::Delete, ["faces", "all"]) => {
                let count = self.faces.borrow().len();
                self.faces.borrow_mut().clear();
                ApiResponse::json(200, json!({ "deleted_count": count }))
            }
            (Method::Delete, ["faces", target]) => self.delete_one(target),
            (Method::Put, ["subjects", old]) => self.rename(old, &request),
            (Method::Post, ["recognize"]) => self.recognize(&request),
            (Method::Post, ["search"]) => self.search(&request),
            (Method::Get, ["face-database", "connection"]) => ApiResponse::json(
                200,
                self.datastore
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| json!({ "enabled": false })),
            ),
            (Method::Post, ["face-database", "connection"]) => match &request.body {
                RequestBody::Json(value) => {
                    *self.datastore.borrow_mut() = Some(value.clone());
                    ApiResponse::json(200, json!({ "message": "Database configuration saved" }))
                }
                _ => Self::error(400, "Invalid request", "Body must be JSON"),
            },
            _ => ApiResponse::from_raw(404, format!("no route for {path}")),
        };
        Ok(response)
    }
}

/// Transport whose every request fails to connect.
pub struct FailingTransport;

impl Transport for FailingTransport {
    fn send(&self, _request: ApiRequest) -> Result<ApiResponse, TransportError> {
        Err(TransportError::Connect("connection refused".into()))
    }
}
