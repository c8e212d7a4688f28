//! Cloud service gateway
//!
//! One explicitly constructed client for the document database, object
//! storage and the credential authority. Entry points build it and pass it
//! down; nothing here is global.

use crate::api_contracts::StoredObject;
use crate::auth::TokenProvider;
use crate::config::UploaderConfig;
use crate::error::{CredentialError, GatewayError};
use crate::firestore::FirestoreClient;
use crate::service_account::ServiceAccountKey;
use crate::storage::StorageClient;
use crate::types::ExportedDocument;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// A value in a document field map
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Null,
    Timestamp(DateTime<Utc>),
    /// Filled in by the server at commit time
    ServerTimestamp,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

pub type FieldMap = BTreeMap<String, FieldValue>;

/// A local file to store under `destination`
#[derive(Debug, Clone)]
pub struct ObjectUpload<'a> {
    pub local_path: &'a Path,
    pub destination: &'a str,
    pub content_type: &'a str,
    /// Custom metadata saved with the object
    pub metadata: HashMap<String, String>,
}

/// One page of a collection listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPage {
    pub documents: Vec<ExportedDocument>,
    /// Pass back to get the next page; `None` on the last page
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait CloudGateway: Send + Sync {
    /// Add a document with a generated id to `collection`, returning the id.
    async fn add_document(&self, collection: &str, fields: FieldMap) -> Result<String, GatewayError>;

    /// Upload a local file to object storage.
    async fn upload_object(&self, upload: ObjectUpload<'_>) -> Result<StoredObject, GatewayError>;

    /// Time-limited read URL for a stored object.
    async fn signed_read_url(&self, object: &str, ttl: Duration) -> Result<String, GatewayError>;

    /// One page of `collection` in document-name order.
    async fn list_documents(
        &self,
        collection: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, GatewayError>;

    /// Download a (signed) object URL to `destination`, returning the byte count.
    async fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<u64, GatewayError>;
}

/// Gateway backed by Firestore and Cloud Storage REST APIs
pub struct FirebaseGateway {
    firestore: FirestoreClient,
    storage: StorageClient,
}

impl FirebaseGateway {
    pub fn new(key: &ServiceAccountKey, config: &UploaderConfig) -> Result<Self, CredentialError> {
        let version = env!("CARGO_PKG_VERSION");
        let user_agent = format!("PortfolioUploader/{}", version);

        // Large images on slow links
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(&user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let tokens = Arc::new(TokenProvider::new(key, client.clone())?);
        let bucket = config.bucket_for(&key.project_id);

        tracing::info!(project = %key.project_id, bucket = %bucket, "Cloud gateway initialised");

        Ok(Self {
            firestore: FirestoreClient::new(
                config.firestore_endpoint.clone(),
                key.project_id.clone(),
                client.clone(),
                Arc::clone(&tokens),
            ),
            storage: StorageClient::new(config.storage_endpoint.clone(), bucket, client, tokens),
        })
    }

    pub fn bucket(&self) -> &str {
        self.storage.bucket()
    }
}

#[async_trait]
impl CloudGateway for FirebaseGateway {
    async fn add_document(&self, collection: &str, fields: FieldMap) -> Result<String, GatewayError> {
        self.firestore.add_document(collection, fields).await
    }

    async fn upload_object(&self, upload: ObjectUpload<'_>) -> Result<StoredObject, GatewayError> {
        self.storage.upload_object(upload).await
    }

    async fn signed_read_url(&self, object: &str, ttl: Duration) -> Result<String, GatewayError> {
        self.storage.signed_read_url(object, ttl, Utc::now())
    }

    async fn list_documents(
        &self,
        collection: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, GatewayError> {
        self.firestore.list_documents(collection, page_size, page_token).await
    }

    async fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<u64, GatewayError> {
        self.storage.download_to_file(url, destination).await
    }
}
