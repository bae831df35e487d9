//! Typed operations over the `/v1/recognition` API.
//!
//! Each method validates its parameters locally, issues exactly one request,
//! and maps the response onto the [`ClientError`] taxonomy. Nothing is retried.

use crate::config::Config;
use crate::datastore::DatastoreConfig;
use crate::encoding::{Encoding, ImageUpload};
use crate::error::{ClientError, ErrorBody};
use crate::transport::{
    ApiRequest, ApiResponse, HttpTransport, Method, RequestBody, ResponseBody, Transport,
};
use crate::types::{
    BulkDeleteOutcome, BulkDeleteWire, DatastoreAck, DeleteAllOutcome, DeletedEntry, DeletedFace,
    ListQuery, ListingWire, PaginatedListing, RecognitionResult, RecognizeOptions,
    RegisterOptions, RegisteredFace, RenameOutcome, SearchOptions, SearchResult, SearchWire,
};
use serde::de::DeserializeOwned;
use std::cmp::Ordering;
use std::time::Duration;

/// Token the caller must supply to delete every stored face.
pub const DELETE_ALL_TOKEN: &str = "YES";

/// `faces/all` is the delete-all route, never a single target.
const RESERVED_DELETE_SEGMENT: &str = "all";

/// Request timeouts. `long` covers calls that run detection server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub short: Duration,
    pub long: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Config::default().timeouts()
    }
}

/// Proof that a human deliberately asked to wipe the store.
#[derive(Debug)]
pub struct DeleteAllConfirmation(());

impl DeleteAllConfirmation {
    /// Accepts only the literal token `YES`.
    pub fn from_token(token: &str) -> Result<Self, ClientError> {
        if token == DELETE_ALL_TOKEN {
            Ok(Self(()))
        } else {
            Err(ClientError::Validation(format!(
                "delete-all requires the confirmation token {DELETE_ALL_TOKEN:?}"
            )))
        }
    }
}

pub struct RecognitionClient<T: Transport = HttpTransport> {
    transport: T,
    timeouts: Timeouts,
}

impl RecognitionClient<HttpTransport> {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(&config.base_url, config.api_key.clone())?;
        tracing::info!(base_url = %config.base_url, "recognition client ready");
        Ok(Self::with_transport(transport, config.timeouts()))
    }
}

impl<T: Transport> RecognitionClient<T> {
    pub fn with_transport(transport: T, timeouts: Timeouts) -> Self {
        Self {
            transport,
            timeouts,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Register a face under `subject`. Fails if the service detects no face.
    pub fn register(
        &self,
        subject: &str,
        image: &ImageUpload,
        options: RegisterOptions,
    ) -> Result<RegisteredFace, ClientError> {
        check_subject("subject", subject)?;
        check_image(image)?;
        check_unit_interval("det_prob_threshold", options.det_prob_threshold)?;

        let request = ApiRequest::new(Method::Post, &["faces"], self.timeouts.long)
            .query("subject", subject)
            .query("det_prob_threshold", options.det_prob_threshold)
            .body(options.encoding.encode(image));

        let face: RegisteredFace = self.execute(request, subject)?;
        tracing::info!(
            subject = %face.subject,
            image_id = %face.image_id,
            encoding = options.encoding.name(),
            "face registered"
        );
        Ok(face)
    }

    /// Recognize every face in `image` against the stored subjects.
    pub fn recognize(
        &self,
        image: &ImageUpload,
        options: RecognizeOptions,
    ) -> Result<RecognitionResult, ClientError> {
        check_image(image)?;
        check_unit_interval("det_prob_threshold", options.det_prob_threshold)?;
        if options.prediction_count == 0 {
            return Err(ClientError::Validation(
                "prediction_count must be at least 1".into(),
            ));
        }

        let request = ApiRequest::new(Method::Post, &["recognize"], self.timeouts.long)
            .query("det_prob_threshold", options.det_prob_threshold)
            .query("prediction_count", options.prediction_count)
            .query("limit", options.limit)
            .body(Encoding::Multipart.encode(image));

        let mut result: RecognitionResult = self.execute(request, "recognize")?;
        if options.limit > 0 {
            result.faces.truncate(options.limit as usize);
        }
        for face in &mut result.faces {
            face.predictions
                .sort_by(|a, b| descending(a.similarity, b.similarity));
            face.predictions.truncate(options.prediction_count as usize);
        }

        tracing::info!(faces = result.faces.len(), "recognition complete");
        Ok(result)
    }

    /// One page of stored faces, optionally restricted to a subject.
    pub fn list(&self, query: &ListQuery) -> Result<PaginatedListing, ClientError> {
        if query.size == 0 {
            return Err(ClientError::Validation("page size must be at least 1".into()));
        }

        let mut request = ApiRequest::new(Method::Get, &["faces"], self.timeouts.short)
            .query("page", query.page)
            .query("size", query.size);
        if let Some(subject) = query.subject.as_deref().filter(|s| !s.is_empty()) {
            request = request.query("subject", subject);
        }

        let wire: ListingWire = self.execute(request, "faces")?;
        let listing = PaginatedListing {
            page: query.page,
            size: query.size,
            total_elements: wire.total_elements.unwrap_or(wire.faces.len() as u64),
            total_pages: wire.total_pages,
            faces: wire.faces,
        };
        tracing::debug!(
            page = listing.page,
            returned = listing.faces.len(),
            total = listing.total_elements,
            "faces listed"
        );
        Ok(listing)
    }

    /// Delete one face by image id, or every face of a subject.
    ///
    /// A missing target is [`ClientError::NotFound`]. The target `all` is
    /// rejected locally; use [`delete_all`](Self::delete_all).
    pub fn delete(&self, image_id_or_subject: &str) -> Result<DeletedFace, ClientError> {
        check_subject("image_id or subject", image_id_or_subject)?;
        if image_id_or_subject == RESERVED_DELETE_SEGMENT {
            return Err(ClientError::Validation(format!(
                "{RESERVED_DELETE_SEGMENT:?} is reserved for delete-all, which requires a confirmation"
            )));
        }
        let request = ApiRequest::new(
            Method::Delete,
            &["faces", image_id_or_subject],
            self.timeouts.short,
        );
        let deleted: DeletedFace = self.execute(request, image_id_or_subject)?;
        tracing::info!(image_id = %deleted.image_id, subject = %deleted.subject, "face deleted");
        Ok(deleted)
    }

    /// Delete several faces by image id. Ids the service does not list as
    /// deleted are returned as unconfirmed rather than raised as an error.
    pub fn delete_many(&self, image_ids: &[String]) -> Result<BulkDeleteOutcome, ClientError> {
        if image_ids.is_empty() {
            return Err(ClientError::Validation("no image ids to delete".into()));
        }
        if image_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ClientError::Validation("image ids must not be empty".into()));
        }

        let request = ApiRequest::new(Method::Post, &["faces", "delete"], self.timeouts.short)
            .body(RequestBody::Json(serde_json::json!(image_ids)));
        let wire: BulkDeleteWire = self.execute(request, "faces/delete")?;

        let deleted: Vec<String> = wire.deleted.into_iter().map(DeletedEntry::into_id).collect();
        let mut unconfirmed: Vec<String> = Vec::new();
        for id in image_ids {
            if !deleted.contains(id) && !unconfirmed.contains(id) {
                unconfirmed.push(id.clone());
            }
        }

        if unconfirmed.is_empty() {
            tracing::info!(deleted = deleted.len(), "bulk delete complete");
            Ok(BulkDeleteOutcome::Complete { deleted })
        } else {
            tracing::warn!(
                deleted = deleted.len(),
                unconfirmed = unconfirmed.len(),
                "bulk delete partially confirmed"
            );
            Ok(BulkDeleteOutcome::Partial {
                deleted,
                unconfirmed,
            })
        }
    }

    /// Delete every stored face. Irreversible.
    pub fn delete_all(
        &self,
        _confirmation: DeleteAllConfirmation,
    ) -> Result<DeleteAllOutcome, ClientError> {
        tracing::warn!("deleting all stored faces");
        let request = ApiRequest::new(Method::Delete, &["faces", "all"], self.timeouts.long);
        let outcome: DeleteAllOutcome = self.execute(request, "faces/all")?;
        tracing::info!(deleted = outcome.deleted_count, "all faces deleted");
        Ok(outcome)
    }

    /// Rename a subject. Its image ids are unchanged.
    pub fn rename(&self, old_subject: &str, new_subject: &str) -> Result<RenameOutcome, ClientError> {
        check_subject("old subject", old_subject)?;
        check_subject("new subject", new_subject)?;

        let request = ApiRequest::new(Method::Put, &["subjects", old_subject], self.timeouts.short)
            .body(RequestBody::Json(serde_json::json!({ "subject": new_subject })));
        let outcome: RenameOutcome = self.execute(request, old_subject)?;
        tracing::info!(from = old_subject, to = new_subject, updated = outcome.updated, "subject renamed");
        Ok(outcome)
    }

    /// Subjects similar to the faces in `image`. No match is an empty list.
    pub fn search(
        &self,
        image: &ImageUpload,
        options: SearchOptions,
    ) -> Result<SearchResult, ClientError> {
        check_image(image)?;
        check_unit_interval("threshold", options.threshold)?;
        check_unit_interval("det_prob_threshold", options.det_prob_threshold)?;

        let request = ApiRequest::new(Method::Post, &["search"], self.timeouts.long)
            .query("threshold", options.threshold)
            .query("limit", options.limit)
            .query("det_prob_threshold", options.det_prob_threshold)
            .body(Encoding::Multipart.encode(image));

        let wire: SearchWire = self.execute(request, "search")?;
        // Any candidate at all implies a detected face when the count is omitted.
        let faces_found = wire
            .faces_found
            .unwrap_or(usize::from(!wire.result.is_empty()));
        let mut matches: Vec<_> = wire
            .result
            .into_iter()
            .filter(|m| m.similarity >= options.threshold)
            .collect();
        matches.sort_by(|a, b| descending(a.similarity, b.similarity));
        if options.limit > 0 {
            matches.truncate(options.limit as usize);
        }

        let result = SearchResult {
            faces_found,
            matches,
        };
        tracing::info!(matches = result.matches.len(), "search complete");
        Ok(result)
    }

    /// Datastore currently reported by the service.
    pub fn datastore_config(&self) -> Result<DatastoreConfig, ClientError> {
        let request = ApiRequest::new(
            Method::Get,
            &["face-database", "connection"],
            self.timeouts.short,
        );
        let value: serde_json::Value = self.execute(request, "face-database/connection")?;
        DatastoreConfig::from_json(&value).map_err(|e| {
            ClientError::Transport(crate::error::TransportError::MalformedResponse(format!(
                "datastore config: {e}"
            )))
        })
    }

    /// Ask the service to switch datastores. Success means "accepted"; only a
    /// later [`datastore_config`](Self::datastore_config) confirms it.
    pub fn set_datastore_config(&self, config: &DatastoreConfig) -> Result<DatastoreAck, ClientError> {
        config.validate()?;
        let request = ApiRequest::new(
            Method::Post,
            &["face-database", "connection"],
            self.timeouts.short,
        )
        .body(RequestBody::Json(config.to_json()));
        let ack: DatastoreAck = self.execute(request, "face-database/connection")?;
        tracing::info!(kind = config.kind(), message = %ack.message, "datastore change accepted");
        Ok(ack)
    }

    fn execute<R: DeserializeOwned>(&self, request: ApiRequest, target: &str) -> Result<R, ClientError> {
        let method = request.method;
        let path = request.path();
        let response = self.transport.send(request).map_err(|e| {
            tracing::error!(method = method.as_str(), %path, error = %e, "request failed");
            ClientError::Transport(e)
        })?;

        if response.is_success() {
            return Ok(response.decode()?);
        }

        let status = response.status;
        let body = error_body(response);
        tracing::warn!(method = method.as_str(), %path, status, body = %body, "request rejected");
        if status == 404 {
            Err(ClientError::NotFound {
                target: target.to_string(),
                body,
            })
        } else {
            Err(ClientError::Rejected { status, body })
        }
    }
}

fn error_body(response: ApiResponse) -> ErrorBody {
    match response.body {
        ResponseBody::Json(value) => ErrorBody::Json(value),
        ResponseBody::Text(text) => ErrorBody::Text(text),
        ResponseBody::Empty => ErrorBody::Text(String::new()),
    }
}

fn descending(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Thresholds are probabilities: finite and within [0.0, 1.0].
pub(crate) fn check_unit_interval(name: &str, value: f32) -> Result<(), ClientError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ClientError::Validation(format!(
            "{name} must be within [0.0, 1.0], got {value}"
        )))
    }
}

fn check_subject(name: &str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        Err(ClientError::Validation(format!("{name} must not be empty")))
    } else {
        Ok(())
    }
}

fn check_image(image: &ImageUpload) -> Result<(), ClientError> {
    if image.is_empty() {
        Err(ClientError::Validation(format!(
            "image {} is empty",
            image.file_name()
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{MySqlConfig, DEFAULT_MYSQL_CHARSET};
    use crate::testing::{face_image, no_face_image, FailingTransport, FakeService};
    use crate::TransportError;

    fn client() -> RecognitionClient<FakeService> {
        RecognitionClient::with_transport(FakeService::new(), Timeouts::default())
    }

    #[test]
    fn test_register_both_encodings_succeed() {
        let client = client();
        let image = face_image("alice.jpg", 1);

        for encoding in [Encoding::Multipart, Encoding::Base64Json] {
            let options = RegisterOptions {
                encoding,
                ..RegisterOptions::default()
            };
            let face = client.register("alice", &image, options).unwrap();
            assert_eq!(face.subject, "alice");
            assert!(!face.image_id.is_empty());
        }

        let kinds: Vec<&str> = client
            .transport()
            .requests()
            .iter()
            .map(|r| r.body_kind)
            .collect();
        assert_eq!(kinds, vec!["multipart", "json"]);
    }

    #[test]
    fn test_register_without_face_rejected_for_both_encodings() {
        let client = client();
        let image = no_face_image("landscape.jpg");

        for encoding in [Encoding::Multipart, Encoding::Base64Json] {
            let options = RegisterOptions {
                encoding,
                ..RegisterOptions::default()
            };
            let err = client.register("nobody", &image, options).unwrap_err();
            match err {
                ClientError::Rejected { status, body } => {
                    assert_eq!(status, 400);
                    assert_eq!(body.message(), "No face detected in image");
                }
                other => panic!("expected rejection, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_threshold_out_of_range_never_reaches_transport() {
        let client = client();
        let image = face_image("a.jpg", 1);

        let options = RegisterOptions {
            det_prob_threshold: 1.5,
            ..RegisterOptions::default()
        };
        assert!(matches!(
            client.register("a", &image, options),
            Err(ClientError::Validation(_))
        ));

        let options = SearchOptions {
            threshold: -0.1,
            ..SearchOptions::default()
        };
        assert!(matches!(client.search(&image, options), Err(ClientError::Validation(_))));

        let options = RecognizeOptions {
            det_prob_threshold: f32::NAN,
            ..RecognizeOptions::default()
        };
        assert!(matches!(
            client.recognize(&image, options),
            Err(ClientError::Validation(_))
        ));

        assert!(client.transport().requests().is_empty());
    }

    #[test]
    fn test_register_then_recognize_top_prediction() {
        let client = client();
        let alice = face_image("alice.jpg", 1);
        client.register("alice", &alice, RegisterOptions::default()).unwrap();
        client
            .register("bob", &face_image("bob.jpg", 2), RegisterOptions::default())
            .unwrap();

        let result = client.recognize(&alice, RecognizeOptions::default()).unwrap();
        assert_eq!(result.faces.len(), 1);
        let top = result.faces[0].top_prediction().unwrap();
        assert_eq!(top.subject, "alice");
    }

    #[test]
    fn test_recognize_caps_prediction_count() {
        let client = client();
        for seed in 1..=5u8 {
            let name = format!("s{seed}");
            client
                .register(&name, &face_image("x.jpg", seed), RegisterOptions::default())
                .unwrap();
        }
        let options = RecognizeOptions {
            prediction_count: 2,
            ..RecognizeOptions::default()
        };
        let result = client.recognize(&face_image("q.jpg", 3), options).unwrap();
        let predictions = &result.faces[0].predictions;
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].subject, "s3");
        assert!(predictions[0].similarity >= predictions[1].similarity);
    }

    #[test]
    fn test_recognize_no_face_is_empty() {
        let client = client();
        let result = client
            .recognize(&no_face_image("wall.jpg"), RecognizeOptions::default())
            .unwrap();
        assert!(result.faces.is_empty());
    }

    #[test]
    fn test_list_empty_store() {
        let listing = client().list(&ListQuery::default()).unwrap();
        assert_eq!(listing.total_elements, 0);
        assert!(listing.faces.is_empty());
        assert_eq!(listing.page, 0);
        assert_eq!(listing.size, 20);
    }

    #[test]
    fn test_list_last_page_shorter_than_size() {
        let client = client();
        for seed in 1..=5u8 {
            client
                .register("crowd", &face_image("c.jpg", seed), RegisterOptions::default())
                .unwrap();
        }
        let query = ListQuery {
            page: 1,
            size: 3,
            subject: None,
        };
        let listing = client.list(&query).unwrap();
        assert_eq!(listing.size, 3);
        assert_eq!(listing.faces.len(), 2);
        assert_eq!(listing.total_elements, 5);
    }

    #[test]
    fn test_list_zero_size_rejected() {
        let query = ListQuery {
            size: 0,
            ..ListQuery::default()
        };
        assert!(matches!(client().list(&query), Err(ClientError::Validation(_))));
    }

    #[test]
    fn test_delete_unknown_is_not_found() {
        let err = client().delete("non-existent-id").unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[test]
    fn test_delete_by_id() {
        let client = client();
        let face = client
            .register("alice", &face_image("a.jpg", 1), RegisterOptions::default())
            .unwrap();
        let deleted = client.delete(&face.image_id).unwrap();
        assert_eq!(deleted, face);
        assert_eq!(client.list(&ListQuery::default()).unwrap().total_elements, 0);
    }

    #[test]
    fn test_delete_many_partial() {
        let client = client();
        let a = client
            .register("alice", &face_image("a.jpg", 1), RegisterOptions::default())
            .unwrap();

        let outcome = client
            .delete_many(&[a.image_id.clone(), "missing-id".to_string()])
            .unwrap();
        assert!(outcome.is_partial());
        assert_eq!(outcome.deleted(), &[a.image_id]);
        assert_eq!(outcome.unconfirmed(), &["missing-id".to_string()]);
    }

    #[test]
    fn test_delete_many_complete() {
        let client = client();
        let a = client
            .register("alice", &face_image("a.jpg", 1), RegisterOptions::default())
            .unwrap();
        let outcome = client.delete_many(&[a.image_id.clone()]).unwrap();
        assert_eq!(
            outcome,
            BulkDeleteOutcome::Complete {
                deleted: vec![a.image_id]
            }
        );
    }

    #[test]
    fn test_delete_all_requires_token() {
        assert!(DeleteAllConfirmation::from_token("yes").is_err());
        assert!(DeleteAllConfirmation::from_token("").is_err());

        let client = client();
        client
            .register("alice", &face_image("a.jpg", 1), RegisterOptions::default())
            .unwrap();
        client
            .register("bob", &face_image("b.jpg", 2), RegisterOptions::default())
            .unwrap();
        let confirmation = DeleteAllConfirmation::from_token("YES").unwrap();
        let outcome = client.delete_all(confirmation).unwrap();
        assert_eq!(outcome.deleted_count, 2);
    }

    #[test]
    fn test_rename_preserves_image_ids() {
        let client = client();
        for seed in 1..=3u8 {
            client
                .register("old name", &face_image("o.jpg", seed), RegisterOptions::default())
                .unwrap();
        }
        let before = client.list(&ListQuery::for_subject("old name")).unwrap();

        let outcome = client.rename("old name", "new name").unwrap();
        assert!(outcome.updated);

        let after = client.list(&ListQuery::for_subject("new name")).unwrap();
        assert_eq!(before.image_ids(), after.image_ids());
        assert_eq!(
            client.list(&ListQuery::for_subject("old name")).unwrap().total_elements,
            0
        );
    }

    #[test]
    fn test_rename_missing_and_collision() {
        let client = client();
        assert!(client.rename("ghost", "anyone").unwrap_err().is_not_found());

        client
            .register("alice", &face_image("a.jpg", 1), RegisterOptions::default())
            .unwrap();
        client
            .register("bob", &face_image("b.jpg", 2), RegisterOptions::default())
            .unwrap();
        let err = client.rename("alice", "bob").unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn test_search_exact_threshold_without_duplicate_is_empty() {
        let client = client();
        client
            .register("alice", &face_image("a.jpg", 1), RegisterOptions::default())
            .unwrap();
        let options = SearchOptions {
            threshold: 1.0,
            ..SearchOptions::default()
        };
        let result = client.search(&face_image("q.jpg", 9), options).unwrap();
        assert!(result.matches.is_empty());

        let result = client.search(&face_image("q.jpg", 1), options).unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].subject, "alice");
    }

    #[test]
    fn test_search_ranks_and_limits() {
        let client = client();
        for seed in 1..=4u8 {
            client
                .register(&format!("s{seed}"), &face_image("x.jpg", seed), RegisterOptions::default())
                .unwrap();
        }
        let options = SearchOptions {
            threshold: 0.1,
            limit: 2,
            ..SearchOptions::default()
        };
        let result = client.search(&face_image("q.jpg", 4), options).unwrap();
        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.matches[0].subject, "s4");
    }

    #[test]
    fn test_datastore_set_then_get_round_trip() {
        let client = client();
        assert_eq!(client.datastore_config().unwrap(), DatastoreConfig::Embedded);

        let config = DatastoreConfig::MySql(MySqlConfig {
            host: "localhost".into(),
            port: 3306,
            database: "faces".into(),
            username: "svc".into(),
            password: "pw".into(),
            charset: DEFAULT_MYSQL_CHARSET.into(),
        });
        let ack = client.set_datastore_config(&config).unwrap();
        assert!(!ack.message.is_empty());
        assert_eq!(client.datastore_config().unwrap(), config);
    }

    #[test]
    fn test_transport_failure_is_distinct() {
        let client = RecognitionClient::with_transport(FailingTransport, Timeouts::default());
        let err = client.delete("abc").unwrap_err();
        assert!(matches!(err, ClientError::Transport(TransportError::Connect(_))));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_empty_image_rejected_locally() {
        let client = client();
        let image = ImageUpload::new("empty.jpg", Vec::new());
        assert!(matches!(
            client.register("a", &image, RegisterOptions::default()),
            Err(ClientError::Validation(_))
        ));
        assert!(client.transport().requests().is_empty());
    }

    #[test]
    fn test_delete_reserved_all_target_rejected_locally() {
        let client = client();
        client
            .register("alice", &face_image("a.jpg", 1), RegisterOptions::default())
            .unwrap();
        client
            .register("bob", &face_image("b.jpg", 2), RegisterOptions::default())
            .unwrap();

        let err = client.delete("all").unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)), "got {err:?}");
        assert_eq!(client.transport().requests().len(), 2);
        assert_eq!(client.transport().face_count(), 2);
    }

    #[test]
    fn test_operations_use_expected_timeouts() {
        let short = Duration::from_secs(1);
        let long = Duration::from_secs(2);
        let client = RecognitionClient::with_transport(FakeService::new(), Timeouts { short, long });
        let image = face_image("a.jpg", 1);

        let face = client.register("alice", &image, RegisterOptions::default()).unwrap();
        client.recognize(&image, RecognizeOptions::default()).unwrap();
        client.search(&image, SearchOptions::default()).unwrap();
        client.list(&ListQuery::default()).unwrap();
        client.rename("alice", "carol").unwrap();
        client.delete_many(&[face.image_id]).unwrap();
        assert!(client.delete("ghost").unwrap_err().is_not_found());
        client.datastore_config().unwrap();
        client.set_datastore_config(&DatastoreConfig::Embedded).unwrap();
        client
            .delete_all(DeleteAllConfirmation::from_token("YES").unwrap())
            .unwrap();

        let sent: Vec<(Method, String, Duration)> = client
            .transport()
            .requests()
            .into_iter()
            .map(|r| (r.method, r.path, r.timeout))
            .collect();
        let expected = vec![
            (Method::Post, "/faces".to_string(), long),
            (Method::Post, "/recognize".to_string(), long),
            (Method::Post, "/search".to_string(), long),
            (Method::Get, "/faces".to_string(), short),
            (Method::Put, "/subjects/alice".to_string(), short),
            (Method::Post, "/faces/delete".to_string(), short),
            (Method::Delete, "/faces/ghost".to_string(), short),
            (Method::Get, "/face-database/connection".to_string(), short),
            (Method::Post, "/face-database/connection".to_string(), short),
            (Method::Delete, "/faces/all".to_string(), long),
        ];
        assert_eq!(sent, expected);
    }

    #[test]
    fn test_search_faces_found_is_reported_count() {
        let client = client();
        client
            .register("alice", &face_image("a.jpg", 1), RegisterOptions::default())
            .unwrap();
        let options = SearchOptions {
            threshold: 0.9,
            ..SearchOptions::default()
        };
        let result = client.search(&face_image("q.jpg", 9), options).unwrap();
        assert!(result.matches.is_empty());
        assert_eq!(result.faces_found, 1);
    }
}
