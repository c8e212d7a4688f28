//! Persistent log of a batch run's outcomes
//!
//! Every outcome is appended to a JSON-lines journal as soon as it is known.
//! When the run completes the full array is written to the results file
//! atomically and the journal is removed. A journal that survives means the
//! previous run was interrupted; it is set aside before a new run starts.

use crate::error::BatchError;
use crate::types::UploadOutcome;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub struct ResultLog {
    journal_path: PathBuf,
    results_path: PathBuf,
    journal: File,
    outcomes: Vec<UploadOutcome>,
    interrupted: Option<InterruptedRun>,
}

/// Journal left behind by a run that never finished
#[derive(Debug, Clone, PartialEq)]
pub struct InterruptedRun {
    /// Where the journal was moved to
    pub path: PathBuf,
    /// Outcomes that journal still holds
    pub outcome_count: usize,
}

fn log_error(path: &Path, e: impl std::fmt::Display) -> BatchError {
    BatchError::ResultLog {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

impl ResultLog {
    /// Start a new journal at `journal_path`; the final array goes to `results_path`.
    pub fn open(journal_path: &Path, results_path: &Path) -> Result<Self, BatchError> {
        let interrupted = if journal_path.exists() {
            let stale = interrupted_journal_path(journal_path);
            fs::rename(journal_path, &stale).map_err(|e| log_error(journal_path, e))?;
            let outcome_count = read_journal(&stale)?.len();
            tracing::warn!(
                journal = %stale.display(),
                outcomes = outcome_count,
                "Previous run was interrupted, its partial results were kept"
            );
            Some(InterruptedRun {
                path: stale,
                outcome_count,
            })
        } else {
            None
        };

        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(journal_path)
            .map_err(|e| log_error(journal_path, e))?;

        Ok(Self {
            journal_path: journal_path.to_path_buf(),
            results_path: results_path.to_path_buf(),
            journal,
            outcomes: Vec::new(),
            interrupted,
        })
    }

    /// Record one outcome. Journal write failures are logged, not fatal:
    /// the outcome is still kept in memory for the final results file.
    pub fn record(&mut self, outcome: UploadOutcome) {
        if let Err(e) = self.append_to_journal(&outcome) {
            tracing::warn!(error = %e, "Failed to append to result journal");
        }
        self.outcomes.push(outcome);
    }

    fn append_to_journal(&mut self, outcome: &UploadOutcome) -> Result<(), BatchError> {
        let mut line = serde_json::to_string(outcome).map_err(|e| log_error(&self.journal_path, e))?;
        line.push('\n');
        self.journal
            .write_all(line.as_bytes())
            .map_err(|e| log_error(&self.journal_path, e))?;
        self.journal.flush().map_err(|e| log_error(&self.journal_path, e))
    }

    pub fn interrupted(&self) -> Option<&InterruptedRun> {
        self.interrupted.as_ref()
    }

    /// Write the results array and drop the journal
    pub fn finish(self) -> Result<Vec<UploadOutcome>, BatchError> {
        write_json_atomic(&self.results_path, &self.outcomes).map_err(|e| log_error(&self.results_path, e))?;

        drop(self.journal);
        if let Err(e) = fs::remove_file(&self.journal_path) {
            tracing::warn!(error = %e, journal = %self.journal_path.display(), "Failed to remove result journal");
        }

        Ok(self.outcomes)
    }
}

/// `upload_results.jsonl` -> `upload_results.interrupted-<epoch-ms>.jsonl`
fn interrupted_journal_path(journal_path: &Path) -> PathBuf {
    let stem = journal_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload_results");
    journal_path.with_file_name(format!("{}.interrupted-{}.jsonl", stem, Utc::now().timestamp_millis()))
}

/// Write pretty JSON using a temp file + rename so readers never see a partial file.
pub fn write_json_atomic<T: serde::Serialize + ?Sized>(path: &Path, data: &T) -> io::Result<()> {
    let tmp_path = path.with_file_name(format!(
        "{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("data.json")
    ));

    let contents = serde_json::to_string_pretty(data)?;
    let result = write_and_rename(&tmp_path, path, contents.as_bytes());
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_and_rename(tmp_path: &Path, path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = File::create(tmp_path)?;
    tmp.write_all(contents)?;
    tmp.sync_all()?;
    drop(tmp);
    fs::rename(tmp_path, path)
}

/// Read the outcomes from a journal file, skipping a torn final line
fn read_journal(path: &Path) -> Result<Vec<UploadOutcome>, BatchError> {
    let file = File::open(path).map_err(|e| log_error(path, e))?;
    let mut outcomes = Vec::new();

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| log_error(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<UploadOutcome>(&line) {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable journal line"),
        }
    }

    Ok(outcomes)
}
