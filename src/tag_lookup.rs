//! Tags recorded by earlier runs
//!
//! `image_data.json` lists previously indexed images; a non-empty tag there
//! wins over the name of the folder the file currently sits in.

use crate::error::BatchError;
use crate::types::PriorImage;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct TagLookup {
    entries: HashMap<String, PriorImage>,
}

impl TagLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON array of prior entries. A missing file is an empty table.
    pub fn load_from_path(path: &Path) -> Result<Self, BatchError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let contents = fs::read_to_string(path).map_err(|e| BatchError::TagLookup {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let entries: Vec<PriorImage> = serde_json::from_str(&contents).map_err(|e| BatchError::TagLookup {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self::from_entries(entries))
    }

    /// Later entries with the same name replace earlier ones
    pub fn from_entries(entries: Vec<PriorImage>) -> Self {
        let entries = entries.into_iter().map(|e| (e.name.clone(), e)).collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tag to use for `filename`: the recorded one if present and non-empty,
    /// otherwise `folder_tag`.
    pub fn resolve<'a>(&'a self, filename: &str, folder_tag: &'a str) -> &'a str {
        self.entries
            .get(filename)
            .and_then(PriorImage::tag)
            .unwrap_or(folder_tag)
    }
}
