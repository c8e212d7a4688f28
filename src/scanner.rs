//! Input folder scanning
//!
//! Layout: `<input_dir>/<tag-folder>/<image>`. Only the immediate
//! subdirectories are walked and only allow-listed images inside them are
//! returned. Folders and files are sorted by name so runs are reproducible.

use crate::error::BatchError;
use crate::image_kind::ImageKind;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// An image found under a tag folder
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub path: PathBuf,
    pub filename: String,
    pub kind: ImageKind,
}

/// A subdirectory of the input root and its images
#[derive(Debug, Clone, PartialEq)]
pub struct TagFolder {
    /// Folder name, used as the default tag
    pub name: String,
    pub path: PathBuf,
    pub images: Vec<ImageFile>,
}

/// Result of scanning the input root
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub folders: Vec<TagFolder>,
    /// Files inside tag folders that were not allow-listed images
    pub skipped_count: usize,
}

impl ScanResult {
    /// Number of images that will be processed
    pub fn image_count(&self) -> usize {
        self.folders.iter().map(|f| f.images.len()).sum()
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<fs::DirEntry>, BatchError> {
    let entries = fs::read_dir(dir).map_err(|e| scan_error(dir, e))?;
    collect_sorted(dir, entries, |e| e.file_name())
}

fn scan_error(dir: &Path, e: io::Error) -> BatchError {
    BatchError::Scan {
        path: dir.to_path_buf(),
        message: e.to_string(),
    }
}

/// Collect directory entries sorted by `key`. An unreadable entry fails the
/// scan rather than silently dropping a file.
fn collect_sorted<T, K, I, F>(dir: &Path, entries: I, key: F) -> Result<Vec<T>, BatchError>
where
    I: IntoIterator<Item = io::Result<T>>,
    K: Ord,
    F: FnMut(&T) -> K,
{
    let mut items = entries
        .into_iter()
        .collect::<io::Result<Vec<T>>>()
        .map_err(|e| scan_error(dir, e))?;
    items.sort_by_key(key);
    Ok(items)
}

/// Scan `input_dir` for tag folders and their images
pub fn scan_input_dir(input_dir: &Path) -> Result<ScanResult, BatchError> {
    if !input_dir.is_dir() {
        return Err(BatchError::MissingInputDir(input_dir.to_path_buf()));
    }

    let mut result = ScanResult::default();

    for entry in read_dir_sorted(input_dir)? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        let mut images = Vec::new();

        for file in read_dir_sorted(&path)? {
            let file_path = file.path();
            if !file_path.is_file() {
                continue;
            }

            match ImageKind::from_path(&file_path) {
                Some(kind) => images.push(ImageFile {
                    filename: file.file_name().to_string_lossy().to_string(),
                    path: file_path,
                    kind,
                }),
                None => {
                    result.skipped_count += 1;
                    tracing::debug!(file = %file_path.display(), "Skipping non-image file");
                }
            }
        }

        tracing::debug!(folder = %name, images = images.len(), "Scanned tag folder");
        result.folders.push(TagFolder { name, path, images });
    }

    Ok(result)
}
