//! Core types for upload results and prior image metadata.
//!
//! These are the shapes written to `upload_results.json` and the export
//! files, and read from `image_data.json`.

use serde::{Deserialize, Serialize};

/// A successfully uploaded and indexed image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Generated document id in the images collection
    pub id: String,
    pub name: String,
    /// Signed read URL
    pub url: String,
    pub tag: String,
}

/// A file that could not be uploaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedUpload {
    pub file: String,
    pub error: String,
}

/// Result of processing one file in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadOutcome {
    Uploaded(ImageRecord),
    Failed(FailedUpload),
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded(_))
    }

    /// The failure, if this outcome is one
    pub fn failure(&self) -> Option<&FailedUpload> {
        match self {
            UploadOutcome::Uploaded(_) => None,
            UploadOutcome::Failed(f) => Some(f),
        }
    }
}

/// An entry from a previous run's `image_data.json`
///
/// `tag` and `url` are kept as raw JSON so an odd value in one entry does not
/// make the whole file unreadable; the accessors only return usable strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorImage {
    pub name: String,
    #[serde(default)]
    pub tag: Option<serde_json::Value>,
    #[serde(default)]
    pub url: Option<serde_json::Value>,
}

impl PriorImage {
    /// The recorded tag, if it is a non-empty string
    pub fn tag(&self) -> Option<&str> {
        non_empty_str(self.tag.as_ref())
    }

    /// The recorded read URL, if it is a non-empty string
    pub fn url(&self) -> Option<&str> {
        non_empty_str(self.url.as_ref())
    }
}

/// One exported document, as written to `<id>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedDocument {
    pub id: String,
    /// Field values as plain JSON; timestamps, references and geo points
    /// become `{"__timestamp__": ..}`, `{"__reference__": ..}`, `{"__geopoint__": ..}`
    pub data: serde_json::Map<String, serde_json::Value>,
}

fn non_empty_str(value: Option<&serde_json::Value>) -> Option<&str> {
    value
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
