//! Index configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchableError};
use crate::index::writer::{DEFAULT_MAX_BUFFERED_DOCS, DEFAULT_MERGE_FACTOR, IndexWriterConfig};
use crate::storage::StorageConfig;
use crate::storage::file::FileStorageConfig;
use crate::storage::memory::MemoryStorageConfig;

/// Merge factor applied to writers opened in batch mode.
pub const BATCH_MERGE_FACTOR: usize = 500;

/// Where an index keeps its files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// A directory at the index path.
    #[default]
    File,
    /// Process memory, shared by every lifecycle using the same path and registry.
    Memory,
}

/// Configuration of one index.
///
/// # Example
///
/// ```
/// use searchable::config::{IndexConfig, StorageKind};
///
/// let config = IndexConfig::from_json_str(
///     r#"{ "index_path": "/var/lib/app/index", "batch_mode": true }"#,
/// )
/// .unwrap();
/// assert!(config.batch_mode);
/// assert_eq!(config.storage, StorageKind::File);
/// assert_eq!(config.batch_merge_factor, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Key of the index; also its directory for file storage.
    pub index_path: PathBuf,

    pub storage: StorageKind,

    /// Start in batch mode.
    pub batch_mode: bool,

    /// Merge factor of interactive writers.
    pub merge_factor: usize,

    /// Merge factor of writers opened in batch mode.
    pub batch_merge_factor: usize,

    /// Documents buffered by a writer before it writes a segment.
    pub max_buffered_docs: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            index_path: default_index_path(),
            storage: StorageKind::File,
            batch_mode: false,
            merge_factor: DEFAULT_MERGE_FACTOR,
            batch_merge_factor: BATCH_MERGE_FACTOR,
            max_buffered_docs: DEFAULT_MAX_BUFFERED_DOCS,
        }
    }
}

/// `searchable` under the system temporary directory.
pub fn default_index_path() -> PathBuf {
    std::env::temp_dir().join("searchable")
}

impl IndexConfig {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        IndexConfig {
            index_path: index_path.into(),
            ..Default::default()
        }
    }

    /// An index held in memory under `name`.
    pub fn memory(name: impl Into<PathBuf>) -> Self {
        IndexConfig {
            index_path: name.into(),
            storage: StorageKind::Memory,
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_batch_mode(mut self, batch_mode: bool) -> Self {
        self.batch_mode = batch_mode;
        self
    }

    pub fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_merge_factor(mut self, merge_factor: usize) -> Self {
        self.merge_factor = merge_factor;
        self
    }

    pub fn with_batch_merge_factor(mut self, batch_merge_factor: usize) -> Self {
        self.batch_merge_factor = batch_merge_factor;
        self
    }

    pub fn with_max_buffered_docs(mut self, max_buffered_docs: usize) -> Self {
        self.max_buffered_docs = max_buffered_docs;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.index_path.as_os_str().is_empty() {
            return Err(SearchableError::invalid_argument("index_path must not be empty"));
        }
        if self.merge_factor < 2 || self.batch_merge_factor < 2 {
            return Err(SearchableError::invalid_argument(
                "merge factors must be at least 2",
            ));
        }
        if self.max_buffered_docs == 0 {
            return Err(SearchableError::invalid_argument(
                "max_buffered_docs must be positive",
            ));
        }
        Ok(())
    }

    /// Registry key of this index.
    pub fn path_key(&self) -> String {
        path_key(&self.index_path)
    }

    pub(crate) fn storage_config(&self) -> StorageConfig {
        match self.storage {
            StorageKind::File => StorageConfig::File(FileStorageConfig::new(&self.index_path)),
            StorageKind::Memory => StorageConfig::Memory(MemoryStorageConfig {
                name: Some(self.path_key()),
            }),
        }
    }

    /// Writer configuration for the given mode.
    pub(crate) fn writer_config(&self, batch_mode: bool) -> IndexWriterConfig {
        IndexWriterConfig {
            merge_factor: if batch_mode {
                self.batch_merge_factor
            } else {
                self.merge_factor
            },
            max_buffered_docs: self.max_buffered_docs,
            ..Default::default()
        }
    }
}

pub(crate) fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.index_path, std::env::temp_dir().join("searchable"));
        assert_eq!(config.merge_factor, 10);
        assert_eq!(config.batch_merge_factor, BATCH_MERGE_FACTOR);
        assert!(!config.batch_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_writer_config_follows_mode() {
        let config = IndexConfig::memory("idx");
        assert_eq!(config.writer_config(false).merge_factor, 10);
        assert_eq!(config.writer_config(true).merge_factor, 500);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(IndexConfig::from_json_str(r#"{ "merge_factor": 1 }"#).is_err());
        assert!(IndexConfig::from_json_str(r#"{ "storage": "tape" }"#).is_err());
        let config = IndexConfig::from_json_str(r#"{ "storage": "memory" }"#).unwrap();
        assert_eq!(config.storage, StorageKind::Memory);
    }
}
