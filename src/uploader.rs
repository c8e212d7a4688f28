//! Single-image upload: store the file, sign a read URL, index it.

use crate::error::UploadError;
use crate::gateway::{CloudGateway, FieldMap, FieldValue, ObjectUpload};
use crate::image_kind::ImageKind;
use crate::types::ImageRecord;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Hands out `<epoch-ms>_<filename>` object names.
///
/// The millisecond prefix is strictly increasing within one namer, so names
/// stay unique even for same-named files uploaded in the same millisecond.
#[derive(Debug, Default)]
pub struct ObjectNamer {
    last_ms: Mutex<i64>,
}

impl ObjectNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_name(&self, filename: &str) -> String {
        self.name_at(Utc::now().timestamp_millis(), filename)
    }

    fn name_at(&self, now_ms: i64, filename: &str) -> String {
        let mut last = self.last_ms.lock().unwrap_or_else(|e| e.into_inner());
        let ms = if now_ms > *last { now_ms } else { *last + 1 };
        *last = ms;
        format!("{}_{}", ms, filename)
    }
}

/// Uploads images through a `CloudGateway` and records them in a collection
pub struct ImageUploader<'g, G: CloudGateway + ?Sized> {
    gateway: &'g G,
    collection: String,
    url_ttl: Duration,
    namer: ObjectNamer,
}

impl<'g, G: CloudGateway + ?Sized> ImageUploader<'g, G> {
    pub fn new(gateway: &'g G, collection: impl Into<String>, url_ttl: Duration) -> Self {
        Self {
            gateway,
            collection: collection.into(),
            url_ttl,
            namer: ObjectNamer::new(),
        }
    }

    /// Upload `path` under `tag`. Errors are logged here and returned to the caller.
    pub async fn upload(&self, path: &Path, tag: &str) -> Result<ImageRecord, UploadError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let result = self.upload_inner(path, &filename, tag).await;

        match &result {
            Ok(record) => tracing::info!(file = %filename, id = %record.id, tag = %record.tag, "Upload complete"),
            Err(e) => tracing::error!(file = %filename, error = %e, "Upload failed"),
        }

        result
    }

    async fn upload_inner(&self, path: &Path, filename: &str, tag: &str) -> Result<ImageRecord, UploadError> {
        if tag.trim().is_empty() {
            return Err(UploadError::EmptyTag);
        }

        let kind = ImageKind::from_path(path).ok_or_else(|| UploadError::UnsupportedFile(path.to_path_buf()))?;
        if filename.is_empty() {
            return Err(UploadError::UnsupportedFile(path.to_path_buf()));
        }

        let destination = self.namer.next_name(filename);
        tracing::info!(file = %filename, object = %destination, "Starting upload");

        self.gateway
            .upload_object(ObjectUpload {
                local_path: path,
                destination: &destination,
                content_type: kind.content_type(),
                metadata: HashMap::from([("tag".to_string(), tag.to_string())]),
            })
            .await?;

        let url = self.gateway.signed_read_url(&destination, self.url_ttl).await?;

        let mut fields = FieldMap::new();
        fields.insert("name".to_string(), filename.into());
        fields.insert("url".to_string(), url.clone().into());
        fields.insert("tag".to_string(), tag.into());
        fields.insert("createdAt".to_string(), FieldValue::ServerTimestamp);

        let id = self.gateway.add_document(&self.collection, fields).await?;

        Ok(ImageRecord {
            id,
            name: filename.to_string(),
            url,
            tag: tag.to_string(),
        })
    }
}
