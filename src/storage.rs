//! Cloud Storage REST client
//!
//! Uploads go through the JSON API's multipart upload so the object's
//! content type and custom metadata are set in the same request as the bytes.
//! Downloads fetch previously signed URLs and need no token.

use crate::api_contracts::{ObjectMetadata, StoredObject};
use crate::auth::TokenProvider;
use crate::error::GatewayError;
use crate::gateway::ObjectUpload;
use crate::signed_url::{signed_read_url, SignedUrlRequest};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use std::time::Duration;

pub struct StorageClient {
    endpoint: String,
    bucket: String,
    client: reqwest::Client,
    tokens: Arc<TokenProvider>,
}

impl StorageClient {
    pub fn new(endpoint: String, bucket: String, client: reqwest::Client, tokens: Arc<TokenProvider>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket,
            client,
            tokens,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// URL for multipart uploads into the bucket
    fn upload_url(&self) -> Result<reqwest::Url, GatewayError> {
        let mut url = reqwest::Url::parse(&self.endpoint).map_err(|e| GatewayError::InvalidResponse {
            service: "storage",
            message: format!("Invalid storage endpoint: {}", e),
        })?;

        // Bucket names may contain dots; path_segments_mut encodes anything else
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidResponse {
                service: "storage",
                message: "Storage endpoint cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["upload", "storage", "v1", "b", self.bucket.as_str(), "o"]);
        url.query_pairs_mut().append_pair("uploadType", "multipart");
        Ok(url)
    }

    pub async fn upload_object(&self, upload: ObjectUpload<'_>) -> Result<StoredObject, GatewayError> {
        let contents = tokio::fs::read(upload.local_path)
            .await
            .map_err(|e| GatewayError::Io {
                path: upload.local_path.to_path_buf(),
                message: e.to_string(),
            })?;

        let metadata = ObjectMetadata {
            name: upload.destination.to_string(),
            content_type: upload.content_type.to_string(),
            metadata: upload.metadata,
        };
        let boundary = format!("portfolio-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related_body(&boundary, &metadata, &contents)?;

        let url = self.upload_url()?;
        let token = self.tokens.access_token().await?;

        tracing::debug!(
            object = %upload.destination,
            bytes = contents.len(),
            content_type = %upload.content_type,
            "Uploading object"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::network("storage", e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                service: "storage",
                status,
                body,
            });
        }

        response.json::<StoredObject>().await.map_err(|e| GatewayError::InvalidResponse {
            service: "storage",
            message: e.to_string(),
        })
    }

    /// Sign a V4 read URL for `object`, valid for `ttl` from `now`
    pub fn signed_read_url(&self, object: &str, ttl: Duration, now: DateTime<Utc>) -> Result<String, GatewayError> {
        let request = SignedUrlRequest {
            endpoint: &self.endpoint,
            bucket: &self.bucket,
            object,
            client_email: self.tokens.client_email(),
            ttl,
            now,
        };
        signed_read_url(&request, |message| self.tokens.sign(message))
    }
}

impl StorageClient {
    /// Stream `url` into `destination` through a `.part` file, returning the byte count.
    /// Nothing is left at `destination` when the download fails.
    pub async fn download_to_file(&self, url: &str, destination: &Path) -> Result<u64, GatewayError> {
        let part = part_path(destination);
        let result = self.stream_to(url, &part).await;

        match result {
            Ok(bytes) => {
                tokio::fs::rename(&part, destination).await.map_err(|e| GatewayError::Io {
                    path: destination.to_path_buf(),
                    message: e.to_string(),
                })?;
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    async fn stream_to(&self, url: &str, part: &Path) -> Result<u64, GatewayError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::network("storage", e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                service: "storage",
                status,
                body,
            });
        }

        let io_error = |e: std::io::Error| GatewayError::Io {
            path: part.to_path_buf(),
            message: e.to_string(),
        };

        let mut file = tokio::fs::File::create(part).await.map_err(io_error)?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| GatewayError::network("storage", e))? {
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;

        Ok(written)
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!("{}.part", name))
}

/// Assemble a `multipart/related` body: JSON metadata part, then media part
fn multipart_related_body(boundary: &str, metadata: &ObjectMetadata, media: &[u8]) -> Result<Vec<u8>, GatewayError> {
    let metadata_json = serde_json::to_string(metadata).map_err(|e| GatewayError::InvalidResponse {
        service: "storage",
        message: format!("Failed to serialize object metadata: {}", e),
    })?;

    let mut body = Vec::with_capacity(media.len() + metadata_json.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", metadata.content_type).as_bytes());
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::{test_service_account, TestHarness, TEST_PUBLIC_KEY_PEM};
    use crate::signed_url::canonical_parts;
    use base64::Engine;
    use chrono::TimeZone;
    use jsonwebtoken::{Algorithm, DecodingKey};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn client_for(endpoint: &str, token_uri: &str, bucket: &str) -> StorageClient {
        let key = test_service_account(token_uri);
        let tokens = Arc::new(TokenProvider::new(&key, reqwest::Client::new()).unwrap());
        StorageClient::new(endpoint.to_string(), bucket.to_string(), reqwest::Client::new(), tokens)
    }

    #[test]
    fn test_upload_url() {
        let client = client_for("https://storage.googleapis.com", "https://example.com/token", "portfolio-d5d1f.appspot.com");
        assert_eq!(
            client.upload_url().unwrap().as_str(),
            "https://storage.googleapis.com/upload/storage/v1/b/portfolio-d5d1f.appspot.com/o?uploadType=multipart"
        );
    }

    #[test]
    fn test_multipart_body_layout() {
        let metadata = ObjectMetadata {
            name: "1_a.webp".to_string(),
            content_type: "image/webp".to_string(),
            metadata: HashMap::from([("tag".to_string(), "street".to_string())]),
        };

        let body = multipart_related_body("XYZ", &metadata, b"RIFF....WEBP").unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with("--XYZ\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{"));
        assert!(text.contains(r#""contentType":"image/webp""#));
        assert!(text.contains(r#""metadata":{"tag":"street"}"#));
        assert!(text.contains("\r\n--XYZ\r\nContent-Type: image/webp\r\n\r\nRIFF....WEBP\r\n--XYZ--\r\n"));
    }

    #[test]
    fn test_signed_read_url_signature_verifies() {
        let client = client_for("https://storage.googleapis.com", "https://example.com/token", "bucket");
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let ttl = Duration::from_secs(7 * 24 * 3600);

        let url = client.signed_read_url("1_a.jpg", ttl, now).unwrap();
        let signature_hex = url.rsplit("X-Goog-Signature=").next().unwrap();
        let signature = hex::decode(signature_hex).unwrap();

        let parts = canonical_parts(&SignedUrlRequest {
            endpoint: "https://storage.googleapis.com",
            bucket: "bucket",
            object: "1_a.jpg",
            client_email: client.tokens.client_email(),
            ttl,
            now,
        })
        .unwrap();

        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(signature);
        let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY_PEM.as_bytes()).unwrap();
        assert!(jsonwebtoken::crypto::verify(&encoded, parts.string_to_sign.as_bytes(), &key, Algorithm::RS256).unwrap());
    }

    #[tokio::test]
    async fn test_upload_sends_content_type_and_metadata() {
        let mut harness = TestHarness::new().await;
        let _token = harness.mock_token("ya29.storage").await;
        let upload = harness.mock_upload_matching("bucket", "image/png", "portraits").await;

        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("b.png");
        std::fs::write(&file, b"fake png bytes").unwrap();

        let client = client_for(&harness.url(), &harness.token_uri(), "bucket");
        let object = client
            .upload_object(ObjectUpload {
                local_path: &file,
                destination: "1_b.png",
                content_type: "image/png",
                metadata: HashMap::from([("tag".to_string(), "portraits".to_string())]),
            })
            .await
            .unwrap();

        assert_eq!(object.bucket, "bucket");
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let client = client_for("https://storage.googleapis.com", "https://example.com/token", "bucket");
        let temp_dir = TempDir::new().unwrap();

        let err = client
            .upload_object(ObjectUpload {
                local_path: &temp_dir.path().join("gone.jpg"),
                destination: "1_gone.jpg",
                content_type: "image/jpeg",
                metadata: HashMap::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Io { .. }));
    }

    #[tokio::test]
    async fn test_upload_rejected_by_server() {
        let mut harness = TestHarness::new().await;
        let _token = harness.mock_token("ya29.storage").await;
        let _upload = harness.mock_upload_failure("bucket", 503, "backendError").await;

        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("c.jpg");
        std::fs::write(&file, b"jpeg").unwrap();

        let client = client_for(&harness.url(), &harness.token_uri(), "bucket");
        let err = client
            .upload_object(ObjectUpload {
                local_path: &file,
                destination: "1_c.jpg",
                content_type: "image/jpeg",
                metadata: HashMap::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let mut harness = TestHarness::new().await;
        let download = harness.mock_download("/signed/a.jpg", b"jpeg bytes").await;
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("a.jpg");

        let client = client_for(&harness.url(), &harness.token_uri(), "bucket");
        let bytes = client
            .download_to_file(&format!("{}/signed/a.jpg", harness.url()), &destination)
            .await
            .unwrap();

        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&destination).unwrap(), b"jpeg bytes");
        assert!(!temp_dir.path().join("a.jpg.part").exists());
        download.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_failure_leaves_nothing_behind() {
        let mut harness = TestHarness::new().await;
        let _download = harness.mock_download_failure("/signed/expired.jpg", 400, "ExpiredToken").await;
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("expired.jpg");

        let client = client_for(&harness.url(), &harness.token_uri(), "bucket");
        let err = client
            .download_to_file(&format!("{}/signed/expired.jpg", harness.url()), &destination)
            .await
            .unwrap_err();

        match err {
            GatewayError::Api { status, body, .. } => {
                assert_eq!(status, 400);
                assert!(body.contains("ExpiredToken"));
            }
            other => panic!("Expected API error, got {:?}", other),
        }
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
