//! In-process metadata store for dry runs and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::MetadataStore;
use crate::domain::{MetadataRecord, WriteSet};
use crate::error::{Error, Result};

/// Holds records by path and applies write-sets to them.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<PathBuf, MetadataRecord>>,
    writes: Mutex<Vec<(PathBuf, WriteSet)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: MetadataRecord) {
        let path = record.source().to_path_buf();
        self.records.lock().unwrap_or_else(PoisonError::into_inner).insert(path, record);
    }

    /// Every write-set persisted so far, in order.
    pub fn writes(&self) -> Vec<(PathBuf, WriteSet)> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get(&self, path: &Path) -> Option<MetadataRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).get(path).cloned()
    }
}

impl MetadataStore for MemoryStore {
    fn read_tags(&self, path: &Path) -> Result<MetadataRecord> {
        self.get(path).ok_or_else(|| Error::ExifTool {
            path: path.to_path_buf(),
            message: "no such record".to_string(),
        })
    }

    fn write_tags(&self, path: &Path, write_set: &WriteSet) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = records.get_mut(path).ok_or_else(|| Error::ExifTool {
            path: path.to_path_buf(),
            message: "no such record".to_string(),
        })?;
        for (key, value) in write_set {
            record.set(key.clone(), value.clone());
        }
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.to_path_buf(), write_set.clone()));
        Ok(())
    }
}
