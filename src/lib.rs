//! Portfolio image uploader
//!
//! Pushes compressed portfolio images to Cloud Storage, indexes each one in
//! Firestore with a signed read URL, and checks connectivity to the database.
//! The reverse direction is covered too: exporting the index collection to
//! JSON files and fetching listed images back into tag folders.
//!
//! The binaries are thin wrappers: `check-connection` around
//! [`connectivity::check_connection`], `upload-images` around
//! [`batch::BatchProcessor`], `export-collection` around
//! [`export::CollectionExporter`] and `download-images` around
//! [`download::ImageDownloader`].

pub mod api_contracts;
pub mod auth;
pub mod batch;
pub mod config;
pub mod connectivity;
pub mod download;
pub mod error;
pub mod export;
pub mod firestore;
pub mod gateway;
pub mod image_kind;
pub mod logging;
pub mod pacing;
pub mod result_log;
pub mod scanner;
pub mod service_account;
pub mod signed_url;
pub mod storage;
pub mod tag_lookup;
pub mod types;
pub mod uploader;

#[cfg(test)]
mod test_harness;

pub use batch::{BatchOptions, BatchProcessor, BatchReport};
pub use config::UploaderConfig;
pub use connectivity::{check_connection, ConnectionReport};
pub use download::{DownloadOptions, DownloadOutcome, DownloadReport, ImageDownloader};
pub use error::{BatchError, ConfigError, CredentialError, DownloadError, GatewayError, UploadError};
pub use export::{CollectionExporter, ExportOptions, ExportReport};
pub use gateway::{CloudGateway, DocumentPage, FirebaseGateway};
pub use pacing::PacingPolicy;
pub use service_account::ServiceAccountKey;
pub use types::{FailedUpload, ImageRecord, UploadOutcome};
pub use uploader::ImageUploader;
