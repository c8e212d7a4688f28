//! Test harness for mock Google endpoints and an in-memory gateway
//!
//! `TestHarness` runs a mockito server that stands in for the token endpoint,
//! Firestore and Cloud Storage. `RecordingGateway` skips HTTP entirely and
//! records what the uploader asked for.

use crate::api_contracts::StoredObject;
use crate::config::UploaderConfig;
use crate::error::GatewayError;
use crate::gateway::{CloudGateway, DocumentPage, FieldMap, ObjectUpload};
use crate::pacing::PacingPolicy;
use crate::service_account::ServiceAccountKey;
use crate::types::ExportedDocument;
use async_trait::async_trait;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const TEST_PROJECT_ID: &str = "test-project";
pub const TEST_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/test_service_account_key.pem");
pub const TEST_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/test_service_account_pub.pem");

/// A service account key backed by the fixture RSA key
pub fn test_service_account(token_uri: &str) -> ServiceAccountKey {
    ServiceAccountKey {
        key_type: "service_account".to_string(),
        project_id: TEST_PROJECT_ID.to_string(),
        private_key_id: "test-key-id".to_string(),
        private_key: TEST_PRIVATE_KEY_PEM.to_string(),
        client_email: format!("uploader@{}.iam.gserviceaccount.com", TEST_PROJECT_ID),
        token_uri: token_uri.to_string(),
    }
}

/// A mock server for the token, Firestore and Storage endpoints
pub struct TestHarness {
    pub server: ServerGuard,
}

impl TestHarness {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        Self { server }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    pub fn token_uri(&self) -> String {
        format!("{}/token", self.server.url())
    }

    fn commit_path() -> String {
        format!("/v1/projects/{}/databases/(default)/documents:commit", TEST_PROJECT_ID)
    }

    fn collection_path(collection: &str) -> String {
        format!("/v1/projects/{}/databases/(default)/documents/{}", TEST_PROJECT_ID, collection)
    }

    fn upload_path(bucket: &str) -> String {
        format!("/upload/storage/v1/b/{}/o", bucket)
    }

    /// Config pointing every endpoint at the mock server, without pacing
    pub fn config(&self, bucket: &str) -> UploaderConfig {
        UploaderConfig {
            bucket: Some(bucket.to_string()),
            pacing: PacingPolicy::None,
            firestore_endpoint: self.url(),
            storage_endpoint: self.url(),
            ..UploaderConfig::default()
        }
    }

    /// Token endpoint granting `access_token`
    pub async fn mock_token(&mut self, access_token: &str) -> Mock {
        self.server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "grant_type".to_string(),
                    "urn:ietf:params:oauth:grant-type:jwt-bearer".to_string(),
                ),
                Matcher::Regex("assertion=.+".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "access_token": access_token,
                    "expires_in": 3599,
                    "token_type": "Bearer"
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    /// Token endpoint rejecting the assertion
    pub async fn mock_token_failure(&mut self, status: usize, error: &str) -> Mock {
        self.server
            .mock("POST", "/token")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(json!({ "error": error }).to_string())
            .create_async()
            .await
    }

    /// Firestore commit accepting any create
    pub async fn mock_commit(&mut self) -> Mock {
        self.server
            .mock("POST", Self::commit_path().as_str())
            .match_header("authorization", Matcher::Regex(r"Bearer .+".to_string()))
            .match_body(Matcher::Regex(r#""currentDocument":\{"exists":false\}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "writeResults": [{"updateTime": "2025-01-01T00:00:00.000001Z"}],
                    "commitTime": "2025-01-01T00:00:00.000001Z"
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    pub async fn mock_commit_failure(&mut self, status: usize, reason: &str) -> Mock {
        self.server
            .mock("POST", Self::commit_path().as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(json!({ "error": { "code": status, "status": reason } }).to_string())
            .create_async()
            .await
    }

    /// Storage upload accepting any multipart body
    pub async fn mock_upload_success(&mut self, bucket: &str) -> Mock {
        self.server
            .mock("POST", Self::upload_path(bucket).as_str())
            .match_query(Matcher::UrlEncoded("uploadType".to_string(), "multipart".to_string()))
            .match_header("authorization", Matcher::Regex(r"Bearer .+".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "name": "uploaded-object",
                    "bucket": bucket,
                    "contentType": "image/jpeg",
                    "size": "9"
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    /// Storage upload that only matches the given content type and tag metadata
    pub async fn mock_upload_matching(&mut self, bucket: &str, content_type: &str, tag: &str) -> Mock {
        self.server
            .mock("POST", Self::upload_path(bucket).as_str())
            .match_query(Matcher::UrlEncoded("uploadType".to_string(), "multipart".to_string()))
            .match_header(
                "content-type",
                Matcher::Regex(r"^multipart/related; boundary=.+".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(format!(r#""contentType":"{}""#, content_type)),
                Matcher::Regex(format!(r#""tag":"{}""#, tag)),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "name": "uploaded-object",
                    "bucket": bucket,
                    "contentType": content_type,
                    "metadata": { "tag": tag }
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    pub async fn mock_upload_failure(&mut self, bucket: &str, status: usize, reason: &str) -> Mock {
        self.server
            .mock("POST", Self::upload_path(bucket).as_str())
            .match_query(Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(json!({ "error": { "code": status, "message": reason } }).to_string())
            .create_async()
            .await
    }

    /// One page of a collection listing. Without `page_token` only the first
    /// page request matches.
    pub async fn mock_list_page(&mut self, collection: &str, page_token: Option<&str>, body: serde_json::Value) -> Mock {
        let query = match page_token {
            Some(token) => format!(r"^pageSize=\d+&orderBy=__name__&pageToken={}$", token),
            None => r"^pageSize=\d+&orderBy=__name__$".to_string(),
        };

        self.server
            .mock("GET", Self::collection_path(collection).as_str())
            .match_query(Matcher::Regex(query))
            .match_header("authorization", Matcher::Regex(r"Bearer .+".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    pub async fn mock_list_failure(&mut self, collection: &str, status: usize, reason: &str) -> Mock {
        self.server
            .mock("GET", Self::collection_path(collection).as_str())
            .match_query(Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(json!({ "error": { "code": status, "status": reason } }).to_string())
            .create_async()
            .await
    }

    /// A signed URL download served at `path`
    pub async fn mock_download(&mut self, path: &str, bytes: &[u8]) -> Mock {
        self.server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(bytes)
            .create_async()
            .await
    }

    pub async fn mock_download_failure(&mut self, path: &str, status: usize, code: &str) -> Mock {
        self.server
            .mock("GET", path)
            .with_status(status)
            .with_header("content-type", "application/xml")
            .with_body(format!("<Error><Code>{}</Code></Error>", code))
            .create_async()
            .await
    }
}

/// An upload seen by `RecordingGateway`
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub local_path: PathBuf,
    pub destination: String,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// In-memory gateway that records calls and can fail selected files
#[derive(Default)]
pub struct RecordingGateway {
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub documents: Mutex<Vec<(String, FieldMap)>>,
    /// `(collection, page_size, page_token)` of every list call
    pub list_calls: Mutex<Vec<(String, u32, Option<String>)>>,
    /// URLs fetched, in order
    pub fetches: Mutex<Vec<String>>,
    failing_files: HashSet<String>,
    fail_documents: bool,
    fail_listing: bool,
    stored_documents: Vec<ExportedDocument>,
    downloads: HashMap<String, Vec<u8>>,
    next_id: AtomicUsize,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads of files with this name fail
    pub fn failing_on(mut self, filename: &str) -> Self {
        self.failing_files.insert(filename.to_string());
        self
    }

    /// Every document write fails
    pub fn failing_documents(mut self) -> Self {
        self.fail_documents = true;
        self
    }

    /// Documents served by `list_documents`, in the given order
    pub fn with_documents(mut self, documents: Vec<ExportedDocument>) -> Self {
        self.stored_documents = documents;
        self
    }

    /// Every list call fails with a permission error
    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Serve `bytes` for `url`; other URLs answer 404
    pub fn with_download(mut self, url: &str, bytes: &[u8]) -> Self {
        self.downloads.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn list_calls(&self) -> Vec<(String, u32, Option<String>)> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn documents(&self) -> Vec<(String, FieldMap)> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudGateway for RecordingGateway {
    async fn add_document(&self, collection: &str, fields: FieldMap) -> Result<String, GatewayError> {
        if self.fail_documents {
            return Err(GatewayError::Api {
                service: "firestore",
                status: 500,
                body: "simulated write failure".to_string(),
            });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.documents.lock().unwrap().push((collection.to_string(), fields));
        Ok(format!("doc{}", n))
    }

    async fn upload_object(&self, upload: ObjectUpload<'_>) -> Result<StoredObject, GatewayError> {
        let filename = upload
            .local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        if self.failing_files.contains(filename) {
            return Err(GatewayError::Api {
                service: "storage",
                status: 500,
                body: format!("simulated failure for {}", filename),
            });
        }

        self.uploads.lock().unwrap().push(RecordedUpload {
            local_path: upload.local_path.to_path_buf(),
            destination: upload.destination.to_string(),
            content_type: upload.content_type.to_string(),
            metadata: upload.metadata.clone(),
        });

        Ok(StoredObject {
            name: upload.destination.to_string(),
            bucket: "recording-bucket".to_string(),
            content_type: Some(upload.content_type.to_string()),
            size: None,
            generation: None,
            metadata: upload.metadata,
        })
    }

    async fn signed_read_url(&self, object: &str, ttl: Duration) -> Result<String, GatewayError> {
        Ok(format!("https://signed.example/{}?expires={}", object, ttl.as_secs()))
    }

    /// Page tokens are plain offsets into the stored documents
    async fn list_documents(
        &self,
        collection: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, GatewayError> {
        self.list_calls.lock().unwrap().push((
            collection.to_string(),
            page_size,
            page_token.map(str::to_string),
        ));

        if self.fail_listing {
            return Err(GatewayError::Api {
                service: "firestore",
                status: 403,
                body: "simulated permission denied".to_string(),
            });
        }

        let start = page_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let end = (start + page_size as usize).min(self.stored_documents.len());
        let start = start.min(end);

        Ok(DocumentPage {
            documents: self.stored_documents[start..end].to_vec(),
            next_page_token: (end < self.stored_documents.len()).then(|| end.to_string()),
        })
    }

    async fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<u64, GatewayError> {
        self.fetches.lock().unwrap().push(url.to_string());

        let bytes = self.downloads.get(url).ok_or_else(|| GatewayError::Api {
            service: "storage",
            status: 404,
            body: format!("no object at {}", url),
        })?;

        tokio::fs::write(destination, bytes).await.map_err(|e| GatewayError::Io {
            path: destination.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(bytes.len() as u64)
    }
}
