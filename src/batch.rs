//! Batch folder processor
//!
//! Walks the tag folders, uploads each image one at a time and records every
//! outcome. A failed file is recorded and the batch moves on; only problems
//! with the input directory, the tag lookup or the result log stop a run.

use crate::config::UploaderConfig;
use crate::error::BatchError;
use crate::gateway::CloudGateway;
use crate::pacing::{Pacer, PacingPolicy};
use crate::result_log::{InterruptedRun, ResultLog};
use crate::scanner::scan_input_dir;
use crate::tag_lookup::TagLookup;
use crate::types::{FailedUpload, UploadOutcome};
use crate::uploader::ImageUploader;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

/// Where a batch reads from and writes to
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input_dir: PathBuf,
    pub tag_lookup_path: PathBuf,
    pub results_path: PathBuf,
    pub journal_path: PathBuf,
    pub pacing: PacingPolicy,
}

impl BatchOptions {
    pub fn from_config(config: &UploaderConfig) -> Self {
        Self {
            input_dir: config.input_dir.clone(),
            tag_lookup_path: config.tag_lookup_path(),
            results_path: config.results_path(),
            journal_path: config.journal_path(),
            pacing: config.pacing.clone(),
        }
    }
}

/// Outcome of a completed batch run
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<UploadOutcome>,
    pub elapsed: Duration,
    pub results_path: PathBuf,
    /// Set when a previous run's journal was found and set aside
    pub interrupted: Option<InterruptedRun>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailedUpload> {
        self.outcomes.iter().filter_map(UploadOutcome::failure)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✅ Upload finished")?;
        writeln!(f, "   Elapsed: {:.1} s", self.elapsed.as_secs_f64())?;
        writeln!(f, "   Succeeded: {}", self.succeeded())?;
        writeln!(f, "   Failed: {}", self.failed())?;
        writeln!(f, "   Results: {}", self.results_path.display())?;

        if let Some(interrupted) = &self.interrupted {
            writeln!(
                f,
                "⚠️  An earlier run was interrupted; its {} results are in {}",
                interrupted.outcome_count,
                interrupted.path.display()
            )?;
        }

        if self.failed() > 0 {
            writeln!(f)?;
            writeln!(f, "❌ Failed files:")?;
            for failure in self.failures() {
                writeln!(f, "- {}: {}", failure.file, failure.error)?;
            }
        }
        Ok(())
    }
}

/// Runs one pass over the input directory
pub struct BatchProcessor<'u, 'g, G: CloudGateway + ?Sized> {
    uploader: &'u ImageUploader<'g, G>,
    options: BatchOptions,
}

impl<'u, 'g, G: CloudGateway + ?Sized> BatchProcessor<'u, 'g, G> {
    pub fn new(uploader: &'u ImageUploader<'g, G>, options: BatchOptions) -> Self {
        Self { uploader, options }
    }

    pub async fn run(&self) -> Result<BatchReport, BatchError> {
        let start = Instant::now();

        // Checked before anything else so a bad path never touches the cloud
        let scan = scan_input_dir(&self.options.input_dir)?;
        let lookup = TagLookup::load_from_path(&self.options.tag_lookup_path)?;
        let total = scan.image_count();

        tracing::info!(
            folders = scan.folders.len(),
            images = total,
            skipped = scan.skipped_count,
            prior_tags = lookup.len(),
            "Scanned input directory"
        );

        let mut log = ResultLog::open(&self.options.journal_path, &self.options.results_path)?;
        let interrupted = log.interrupted().cloned();
        let mut pacer = Pacer::new(&self.options.pacing);
        let mut index = 0;

        for folder in &scan.folders {
            for image in &folder.images {
                index += 1;
                let tag = lookup.resolve(&image.filename, &folder.name);

                pacer.ready().await;
                println!("\n📷 [{}/{}] {} (tag: {})", index, total, image.filename, tag);

                let outcome = match self.uploader.upload(&image.path, tag).await {
                    Ok(record) => {
                        println!("✅ {} uploaded, document {}", record.name, record.id);
                        UploadOutcome::Uploaded(record)
                    }
                    Err(e) => {
                        println!("❌ {} failed: {}", image.filename, e);
                        UploadOutcome::Failed(FailedUpload {
                            file: image.filename.clone(),
                            error: e.to_string(),
                        })
                    }
                };
                log.record(outcome);
            }
        }

        let outcomes = log.finish()?;
        tracing::info!(
            results = %self.options.results_path.display(),
            count = outcomes.len(),
            "Results saved"
        );

        Ok(BatchReport {
            outcomes,
            elapsed: start.elapsed(),
            results_path: self.options.results_path.clone(),
            interrupted,
        })
    }
}
