//! Error types for the uploader.
//!
//! Startup problems (`ConfigError`, `CredentialError`) are fatal. Per-file
//! problems surface as `UploadError` and are recorded by the batch without
//! stopping it. `BatchError` covers everything that aborts a run.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or unreadable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Problems loading or using the service account key.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to read credential file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse credential file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported credential type '{0}', expected 'service_account'")]
    UnsupportedType(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),
}

/// Failures talking to the cloud services.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("Token request failed {status}: {body}")]
    Auth { status: u16, body: String },

    #[error("Network error calling {service}: {message}")]
    Network { service: &'static str, message: String },

    #[error("{service} request timed out")]
    Timeout { service: &'static str },

    #[error("{service} request failed {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to parse {service} response: {message}")]
    InvalidResponse { service: &'static str, message: String },

    #[error("File error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Signed URL lifetime must be between 1 and {max} seconds, got {requested}")]
    InvalidExpiry { requested: u64, max: u64 },
}

impl GatewayError {
    /// Map a transport error, keeping timeouts distinct
    pub(crate) fn network(service: &'static str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout { service }
        } else {
            GatewayError::Network {
                service,
                message: e.to_string(),
            }
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, GatewayError::Api { status: 403, .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }
}

/// Failure to upload and index a single image.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Tag must not be empty")]
    EmptyTag,

    #[error("Not a supported image file: {0}")]
    UnsupportedFile(PathBuf),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors that abort a whole batch run.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Input directory does not exist: {0}")]
    MissingInputDir(PathBuf),

    #[error("Failed to read directory {path}: {message}")]
    Scan { path: PathBuf, message: String },

    #[error("Failed to load tag lookup {path}: {message}")]
    TagLookup { path: PathBuf, message: String },

    #[error("Failed to write results to {path}: {message}")]
    ResultLog { path: PathBuf, message: String },

    #[error("Failed to read image list {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Failed to create output directory {path}: {message}")]
    OutputDir { path: PathBuf, message: String },

    #[error("Failed to list collection {collection}: {source}")]
    Query {
        collection: String,
        #[source]
        source: GatewayError,
    },
}

/// Failure to download a single listed image.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Entry has no usable {0}")]
    MissingField(&'static str),

    #[error("'{0}' is not a plain file or folder name")]
    UnsafeName(String),

    #[error("Failed to create {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
