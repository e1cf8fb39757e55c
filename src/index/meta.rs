//! The commit point of an index.
//!
//! `index.meta` lists the live segments and their deletions. It is the only
//! file rewritten in place (via a temp file and rename); every commit bumps
//! its generation, which is what readers compare to detect staleness.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchableError};
use crate::storage::Storage;

pub const META_FILE_NAME: &str = "index.meta";
const META_TEMP_FILE_NAME: &str = "index.meta.tmp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub name: String,
    pub doc_count: u32,
    /// Local doc numbers deleted since the segment was written.
    #[serde(default)]
    pub deleted: BTreeSet<u32>,
}

impl SegmentMeta {
    pub fn file_name(&self) -> String {
        segment_file_name(&self.name)
    }

    pub fn live_docs(&self) -> u32 {
        self.doc_count - self.deleted.len() as u32
    }
}

pub fn segment_file_name(name: &str) -> String {
    format!("{name}.seg")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub generation: u64,
    /// Counter for naming new segments; never reused.
    pub next_segment: u64,
    pub segments: Vec<SegmentMeta>,
}

impl IndexMeta {
    /// Read the current commit point.
    ///
    /// Fails with [`SearchableError::IndexNotFound`] when the storage holds no index.
    pub fn read(storage: &dyn Storage) -> Result<Self> {
        if !storage.file_exists(META_FILE_NAME) {
            return Err(SearchableError::index_not_found(storage.location()));
        }
        let bytes = storage.read_all(META_FILE_NAME)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Publish this commit point atomically.
    pub fn write(&self, storage: &dyn Storage) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;
        storage.write_all(META_TEMP_FILE_NAME, &bytes)?;
        storage.rename_file(META_TEMP_FILE_NAME, META_FILE_NAME)
    }

    pub fn exists(storage: &dyn Storage) -> bool {
        storage.file_exists(META_FILE_NAME)
    }

    pub fn next_segment_name(&mut self) -> String {
        let name = format!("seg_{:06}", self.next_segment);
        self.next_segment += 1;
        name
    }

    pub fn max_doc(&self) -> u32 {
        self.segments.iter().map(|s| s.doc_count).sum()
    }

    pub fn num_docs(&self) -> u32 {
        self.segments.iter().map(|s| s.live_docs()).sum()
    }
}
