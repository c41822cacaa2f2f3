//! Measurement sources
//!
//! The remote document store that holds affect samples is outside this
//! crate; [`MeasurementSource`] is the seam it plugs into.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::RawRecord;
use crate::error::SourceError;

pub trait MeasurementSource: Send + Sync {
    /// All stored records for `subject_id`, undecoded.
    fn fetch(&self, subject_id: &str) -> Result<Vec<RawRecord>, SourceError>;
}

#[derive(Debug, Default)]
pub struct InMemorySource {
    records: RwLock<HashMap<String, Vec<RawRecord>>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, subject_id: &str, record: RawRecord) {
        self.records
            .write()
            .entry(subject_id.to_string())
            .or_default()
            .push(record);
    }

    pub fn extend<I>(&self, subject_id: &str, records: I)
    where
        I: IntoIterator<Item = RawRecord>,
    {
        self.records
            .write()
            .entry(subject_id.to_string())
            .or_default()
            .extend(records);
    }
}

impl MeasurementSource for InMemorySource {
    fn fetch(&self, subject_id: &str) -> Result<Vec<RawRecord>, SourceError> {
        Ok(self
            .records
            .read()
            .get(subject_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// JSON export of the upstream store: an array of records, each tagged with
/// `subject_id` (or `user_id`). Re-read on every fetch so a refreshed export
/// is picked up without restarting.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MeasurementSource for JsonFileSource {
    fn fetch(&self, subject_id: &str) -> Result<Vec<RawRecord>, SourceError> {
        let text = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let records: Vec<RawRecord> = serde_json::from_str(&text)?;
        Ok(records
            .into_iter()
            .filter(|r| r.subject_id.as_deref() == Some(subject_id))
            .collect())
    }
}
