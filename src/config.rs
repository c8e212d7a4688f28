//! Uploader configuration
//!
//! Values are layered: built-in defaults, then an optional JSON file
//! (`config/uploader.json`), then `PORTFOLIO_*` environment variables.
//! Paths are relative to the working directory, like the credential file.

use crate::error::ConfigError;
use crate::pacing::PacingPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "portfolio-uploader";

/// Default location of the optional config file.
pub const DEFAULT_CONFIG_FILE: &str = "config/uploader.json";

/// Longest lifetime a V4 signed URL may have (7 days).
pub const MAX_SIGNED_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

const TAG_LOOKUP_FILE: &str = "image_data.json";
const RESULTS_FILE: &str = "upload_results.json";
const JOURNAL_FILE: &str = "upload_results.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    pub credentials_path: PathBuf,
    pub input_dir: PathBuf,
    /// Defaults to `<project_id>.appspot.com` when unset
    pub bucket: Option<String>,
    pub images_collection: String,
    pub connection_collection: String,
    pub signed_url_ttl_secs: u64,
    pub pacing: PacingPolicy,
    pub firestore_endpoint: String,
    pub storage_endpoint: String,
    /// Where `export-collection` writes one JSON file per document
    pub export_dir: PathBuf,
    /// Root of `download-images`: reads `image_data.json`, writes `<tag>/<name>`
    pub download_dir: PathBuf,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("config/serviceAccount.json"),
            input_dir: PathBuf::from("output/compressed"),
            bucket: None,
            images_collection: "images".to_string(),
            connection_collection: "test-connection".to_string(),
            signed_url_ttl_secs: MAX_SIGNED_URL_TTL_SECS,
            pacing: PacingPolicy::FixedInterval { interval_ms: 1000 },
            firestore_endpoint: "https://firestore.googleapis.com".to_string(),
            storage_endpoint: "https://storage.googleapis.com".to_string(),
            export_dir: PathBuf::from("downloaded_data"),
            download_dir: PathBuf::from("output"),
        }
    }
}

impl UploaderConfig {
    /// Load configuration from the default file location and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
    }

    /// Load configuration from `config_file` (if it exists), then apply overrides
    /// looked up through `env`.
    pub fn load_with<F>(config_file: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match load_config_file::<UploaderConfig>(config_file)? {
            Some(config) => config,
            None => Self::default(),
        };

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env("PORTFOLIO_CREDENTIALS") {
            self.credentials_path = PathBuf::from(path);
        }
        if let Some(dir) = env("PORTFOLIO_INPUT_DIR") {
            self.input_dir = PathBuf::from(dir);
        }
        if let Some(bucket) = env("PORTFOLIO_BUCKET") {
            self.bucket = Some(bucket);
        }
        if let Some(collection) = env("PORTFOLIO_COLLECTION") {
            self.images_collection = collection;
        }
        if let Some(ms) = env("PORTFOLIO_PACING_MS") {
            let interval_ms = parse_number("PORTFOLIO_PACING_MS", &ms)?;
            self.pacing = if interval_ms == 0 {
                PacingPolicy::None
            } else {
                PacingPolicy::FixedInterval { interval_ms }
            };
        }
        if let Some(secs) = env("PORTFOLIO_URL_TTL_SECS") {
            self.signed_url_ttl_secs = parse_number("PORTFOLIO_URL_TTL_SECS", &secs)?;
        }
        if let Some(endpoint) = env("PORTFOLIO_FIRESTORE_ENDPOINT") {
            self.firestore_endpoint = endpoint;
        }
        if let Some(endpoint) = env("PORTFOLIO_STORAGE_ENDPOINT") {
            self.storage_endpoint = endpoint;
        }
        if let Some(dir) = env("PORTFOLIO_EXPORT_DIR") {
            self.export_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env("PORTFOLIO_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.signed_url_ttl_secs == 0 || self.signed_url_ttl_secs > MAX_SIGNED_URL_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                key: "signed_url_ttl_secs".to_string(),
                message: format!(
                    "must be between 1 and {}, got {}",
                    MAX_SIGNED_URL_TTL_SECS, self.signed_url_ttl_secs
                ),
            });
        }
        if self.images_collection.trim().is_empty() || self.connection_collection.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "collection".to_string(),
                message: "collection names must not be empty".to_string(),
            });
        }
        self.pacing.validate()
    }

    /// Bucket to upload into, falling back to the project's default bucket.
    pub fn bucket_for(&self, project_id: &str) -> String {
        self.bucket
            .clone()
            .unwrap_or_else(|| format!("{}.appspot.com", project_id))
    }

    /// `image_data.json` inside the input directory
    pub fn tag_lookup_path(&self) -> PathBuf {
        self.input_dir.join(TAG_LOOKUP_FILE)
    }

    /// `upload_results.json` inside the input directory
    pub fn results_path(&self) -> PathBuf {
        self.input_dir.join(RESULTS_FILE)
    }

    /// Append-only journal written while a batch runs
    pub fn journal_path(&self) -> PathBuf {
        self.input_dir.join(JOURNAL_FILE)
    }

    /// Image list read by `download-images`
    pub fn download_manifest_path(&self) -> PathBuf {
        self.download_dir.join(TAG_LOOKUP_FILE)
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{}' is not a number: {}", raw, e),
    })
}

/// Get the directory where log files are written.
///
/// Returns: `~/.portfolio-uploader/logs`
pub fn get_logs_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(format!(".{}", APP_DIR_NAME)).join("logs"))
}

/// Load JSON data from a file.
///
/// # Returns
/// * `Ok(Some(data))` if file exists and was parsed successfully
/// * `Ok(None)` if file doesn't exist
/// * `Err(...)` if file exists but couldn't be read/parsed
pub fn load_config_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let data = serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(Some(data))
}
