//! Collection export
//!
//! Pages through a Firestore collection in document-name order and writes
//! each document to `<output_dir>/<id>.json` as `{"id": .., "data": ..}`.
//! A document that cannot be written is reported and skipped; a page that
//! cannot be fetched ends the run.

use crate::config::UploaderConfig;
use crate::download::is_plain_name;
use crate::error::BatchError;
use crate::gateway::CloudGateway;
use crate::pacing::{Pacer, PacingPolicy};
use crate::result_log::write_json_atomic;
use crate::types::ExportedDocument;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

pub const EXPORT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub collection: String,
    pub output_dir: PathBuf,
    pub page_size: u32,
    /// Applied between page requests
    pub pacing: PacingPolicy,
}

impl ExportOptions {
    pub fn from_config(config: &UploaderConfig) -> Self {
        Self {
            collection: config.images_collection.clone(),
            output_dir: config.export_dir.clone(),
            page_size: EXPORT_PAGE_SIZE,
            pacing: config.pacing.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedExport {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub collection: String,
    pub saved: usize,
    pub pages: usize,
    pub failures: Vec<FailedExport>,
    pub elapsed: Duration,
    pub output_dir: PathBuf,
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🎉 Export of '{}' finished", self.collection)?;
        writeln!(f, "   Elapsed: {:.1} s", self.elapsed.as_secs_f64())?;
        writeln!(f, "   Pages: {}", self.pages)?;
        writeln!(f, "   Documents saved: {}", self.saved)?;
        writeln!(f, "   Failed: {}", self.failures.len())?;
        writeln!(f, "   Output: {}", self.output_dir.display())?;

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "❌ Documents not saved:")?;
            for failure in &self.failures {
                writeln!(f, "- {}: {}", failure.id, failure.error)?;
            }
        }
        Ok(())
    }
}

fn save_document(output_dir: &Path, document: &ExportedDocument) -> Result<PathBuf, String> {
    if !is_plain_name(&document.id) {
        return Err(format!("'{}' is not usable as a file name", document.id));
    }
    let path = output_dir.join(format!("{}.json", document.id));
    write_json_atomic(&path, document).map_err(|e| e.to_string())?;
    Ok(path)
}

pub struct CollectionExporter<'g, G: CloudGateway + ?Sized> {
    gateway: &'g G,
    options: ExportOptions,
}

impl<'g, G: CloudGateway + ?Sized> CollectionExporter<'g, G> {
    pub fn new(gateway: &'g G, options: ExportOptions) -> Self {
        Self { gateway, options }
    }

    pub async fn run(&self) -> Result<ExportReport, BatchError> {
        let start = Instant::now();
        let collection = &self.options.collection;
        let output_dir = &self.options.output_dir;

        fs::create_dir_all(output_dir).map_err(|e| BatchError::OutputDir {
            path: output_dir.clone(),
            message: e.to_string(),
        })?;

        tracing::info!(collection = %collection, output = %output_dir.display(), "Starting collection export");

        let mut pacer = Pacer::new(&self.options.pacing);
        let mut page_token: Option<String> = None;
        let mut saved = 0;
        let mut pages = 0;
        let mut failures = Vec::new();

        loop {
            pacer.ready().await;
            let page_start = Instant::now();
            let page = self
                .gateway
                .list_documents(collection, self.options.page_size, page_token.as_deref())
                .await
                .map_err(|source| BatchError::Query {
                    collection: collection.clone(),
                    source,
                })?;
            pages += 1;

            for document in &page.documents {
                match save_document(output_dir, document) {
                    Ok(path) => {
                        tracing::debug!(file = %path.display(), "Document saved");
                        saved += 1;
                    }
                    Err(error) => {
                        tracing::warn!(id = %document.id, error = %error, "Document not saved");
                        failures.push(FailedExport {
                            id: document.id.clone(),
                            error,
                        });
                    }
                }
            }

            println!(
                "🔄 Page {}: {} documents, {} saved so far ({:.2} s)",
                pages,
                page.documents.len(),
                saved,
                page_start.elapsed().as_secs_f64()
            );

            match page.next_page_token {
                Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                    tracing::warn!(collection = %collection, token = %next, "Listing did not advance, stopping");
                    break;
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::info!(collection = %collection, saved, pages, "Collection export finished");

        Ok(ExportReport {
            collection: collection.clone(),
            saved,
            pages,
            failures,
            elapsed: start.elapsed(),
            output_dir: output_dir.clone(),
        })
    }
}
