//! Image download
//!
//! Reads an `image_data.json` list and fetches every entry's signed URL into
//! `<output_dir>/<tag>/<name>`, the folder layout the uploader consumes.
//! Files already on disk are skipped, so an interrupted run can be repeated.

use crate::config::UploaderConfig;
use crate::error::{BatchError, DownloadError};
use crate::gateway::CloudGateway;
use crate::pacing::{Pacer, PacingPolicy};
use crate::types::PriorImage;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub manifest_path: PathBuf,
    pub output_dir: PathBuf,
    pub pacing: PacingPolicy,
}

impl DownloadOptions {
    pub fn from_config(config: &UploaderConfig) -> Self {
        Self {
            manifest_path: config.download_manifest_path(),
            output_dir: config.download_dir.clone(),
            pacing: config.pacing.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Downloaded { name: String, path: PathBuf, bytes: u64 },
    /// The target file already existed
    Skipped { name: String, path: PathBuf },
    Failed { name: String, error: String },
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub outcomes: Vec<DownloadOutcome>,
    pub elapsed: Duration,
}

impl DownloadReport {
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&DownloadOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

impl fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✅ Download finished")?;
        writeln!(f, "   Elapsed: {:.1} s", self.elapsed.as_secs_f64())?;
        writeln!(f, "   Downloaded: {}", self.downloaded())?;
        writeln!(f, "   Already present: {}", self.skipped())?;
        writeln!(f, "   Failed: {}", self.failed())?;

        if self.failed() > 0 {
            writeln!(f)?;
            writeln!(f, "❌ Failed files:")?;
            for outcome in &self.outcomes {
                if let DownloadOutcome::Failed { name, error } = outcome {
                    writeln!(f, "- {}: {}", name, error)?;
                }
            }
        }
        Ok(())
    }
}

/// True when `name` is exactly one normal path component
pub(crate) fn is_plain_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

fn load_manifest(path: &Path) -> Result<Vec<PriorImage>, BatchError> {
    let manifest_error = |message: String| BatchError::Manifest {
        path: path.to_path_buf(),
        message,
    };

    let contents = fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;
    serde_json::from_str(&contents).map_err(|e| manifest_error(e.to_string()))
}

pub struct ImageDownloader<'g, G: CloudGateway + ?Sized> {
    gateway: &'g G,
    options: DownloadOptions,
}

impl<'g, G: CloudGateway + ?Sized> ImageDownloader<'g, G> {
    pub fn new(gateway: &'g G, options: DownloadOptions) -> Self {
        Self { gateway, options }
    }

    pub async fn run(&self) -> Result<DownloadReport, BatchError> {
        let start = Instant::now();
        let entries = load_manifest(&self.options.manifest_path)?;

        fs::create_dir_all(&self.options.output_dir).map_err(|e| BatchError::OutputDir {
            path: self.options.output_dir.clone(),
            message: e.to_string(),
        })?;

        tracing::info!(
            manifest = %self.options.manifest_path.display(),
            entries = entries.len(),
            "Starting image download"
        );

        let mut pacer = Pacer::new(&self.options.pacing);
        let mut outcomes = Vec::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let outcome = match self.download_one(entry, &mut pacer).await {
                Ok(outcome) => outcome,
                Err(e) => DownloadOutcome::Failed {
                    name: entry.name.clone(),
                    error: e.to_string(),
                },
            };

            match &outcome {
                DownloadOutcome::Downloaded { path, bytes, .. } => {
                    tracing::info!(file = %path.display(), bytes, "Downloaded");
                    println!("✅ [{}/{}] {}", index + 1, entries.len(), path.display());
                }
                DownloadOutcome::Skipped { path, .. } => {
                    println!("⏭️  [{}/{}] Already present: {}", index + 1, entries.len(), path.display());
                }
                DownloadOutcome::Failed { name, error } => {
                    tracing::error!(file = %name, error = %error, "Download failed");
                    println!("❌ [{}/{}] {} failed: {}", index + 1, entries.len(), name, error);
                }
            }
            outcomes.push(outcome);
        }

        Ok(DownloadReport {
            outcomes,
            elapsed: start.elapsed(),
        })
    }

    async fn download_one(&self, entry: &PriorImage, pacer: &mut Pacer) -> Result<DownloadOutcome, DownloadError> {
        let tag = entry.tag().ok_or(DownloadError::MissingField("tag"))?;
        for part in [tag, entry.name.as_str()] {
            if !is_plain_name(part) {
                return Err(DownloadError::UnsafeName(part.to_string()));
            }
        }

        let tag_dir = self.options.output_dir.join(tag);
        let target = tag_dir.join(&entry.name);
        if target.exists() {
            return Ok(DownloadOutcome::Skipped {
                name: entry.name.clone(),
                path: target,
            });
        }

        let url = entry.url().ok_or(DownloadError::MissingField("url"))?;
        fs::create_dir_all(&tag_dir).map_err(|e| DownloadError::Io {
            path: tag_dir.clone(),
            message: e.to_string(),
        })?;

        pacer.ready().await;
        let bytes = self.gateway.fetch_to_file(url, &target).await?;

        Ok(DownloadOutcome::Downloaded {
            name: entry.name.clone(),
            path: target,
            bytes,
        })
    }
}
