//! Point-in-time view of one committed generation.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahash::AHashMap;
use log::debug;

use crate::analysis::{Analyzer, StandardAnalyzer};
use crate::error::{Result, SearchableError};
use crate::index::DocId;
use crate::index::document::Document;
use crate::index::meta::IndexMeta;
use crate::index::segment::SegmentReader;
use crate::storage::Storage;

/// How many times to re-read `index.meta` when a commit races the open.
const OPEN_RETRIES: usize = 5;

/// One segment as seen by a reader.
#[derive(Debug, Clone)]
pub struct LeafReader {
    /// First global doc id of this segment.
    pub base: DocId,
    pub segment: Arc<SegmentReader>,
    pub deleted: BTreeSet<u32>,
}

impl LeafReader {
    pub fn is_deleted(&self, local: u32) -> bool {
        self.deleted.contains(&local)
    }
}

/// An immutable view of the index as of one generation.
///
/// Later commits are not visible; [`IndexReader::is_current`] tells whether
/// a newer generation exists and [`IndexReader::reopen`] opens it.
///
/// Generation 0 is the empty view of a storage that holds no index yet.
#[derive(Debug)]
pub struct IndexReader {
    storage: Arc<dyn Storage>,
    analyzer: Arc<dyn Analyzer>,
    generation: u64,
    leaves: Vec<LeafReader>,
    max_doc: u32,
    num_docs: u32,
}

impl IndexReader {
    /// Open the latest committed generation.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self> {
        Self::open_with_analyzer(storage, Arc::new(StandardAnalyzer::new()))
    }

    /// Open the latest committed generation, analyzing tokenized fields
    /// with the analyzer the index was written with.
    pub fn open_with_analyzer(
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Self> {
        Self::open_with_cache(storage, analyzer, &AHashMap::new())
    }

    /// A view with no documents over a storage that holds no index.
    ///
    /// It stays current until an index is created in `storage`.
    pub fn empty(storage: Arc<dyn Storage>, analyzer: Arc<dyn Analyzer>) -> Self {
        IndexReader {
            storage,
            analyzer,
            generation: 0,
            leaves: Vec::new(),
            max_doc: 0,
            num_docs: 0,
        }
    }

    /// Open the latest generation, sharing unchanged segments with `self`.
    pub fn reopen(&self) -> Result<Self> {
        let cache: AHashMap<String, Arc<SegmentReader>> = self
            .leaves
            .iter()
            .map(|leaf| (leaf.segment.name().to_string(), leaf.segment.clone()))
            .collect();
        Self::open_with_cache(self.storage.clone(), self.analyzer.clone(), &cache)
    }

    fn open_with_cache(
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
        cache: &AHashMap<String, Arc<SegmentReader>>,
    ) -> Result<Self> {
        let mut attempt = 0;
        loop {
            let meta = IndexMeta::read(storage.as_ref())?;
            match Self::load_leaves(storage.as_ref(), analyzer.as_ref(), &meta, cache) {
                Ok(leaves) => {
                    debug!(
                        "Opened reader on {} at generation {}",
                        storage.location(),
                        meta.generation
                    );
                    return Ok(IndexReader {
                        storage,
                        analyzer,
                        generation: meta.generation,
                        leaves,
                        max_doc: meta.max_doc(),
                        num_docs: meta.num_docs(),
                    });
                }
                // A concurrent commit removed a segment between reading the
                // meta and loading it; the next generation lists its replacement.
                Err(e) if e.is_not_found() && attempt < OPEN_RETRIES => {
                    attempt += 1;
                    debug!("Segment vanished while opening reader, retrying ({attempt})");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn load_leaves(
        storage: &dyn Storage,
        analyzer: &dyn Analyzer,
        meta: &IndexMeta,
        cache: &AHashMap<String, Arc<SegmentReader>>,
    ) -> Result<Vec<LeafReader>> {
        let mut leaves = Vec::with_capacity(meta.segments.len());
        let mut base = 0;
        for segment_meta in &meta.segments {
            let segment = match cache.get(&segment_meta.name) {
                Some(segment) => segment.clone(),
                None => Arc::new(SegmentReader::load(storage, &segment_meta.name, analyzer)?),
            };
            leaves.push(LeafReader {
                base,
                segment,
                deleted: segment_meta.deleted.clone(),
            });
            base += segment_meta.doc_count;
        }
        Ok(leaves)
    }

    /// Whether this reader still reflects the latest commit.
    pub fn is_current(&self) -> Result<bool> {
        match IndexMeta::read(self.storage.as_ref()) {
            Ok(meta) => Ok(meta.generation == self.generation),
            Err(e) if e.is_not_found() => Ok(self.generation == 0),
            Err(e) => Err(e),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// One more than the largest doc id, deleted documents included.
    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    pub fn leaves(&self) -> &[LeafReader] {
        &self.leaves
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn analyzer(&self) -> &Arc<dyn Analyzer> {
        &self.analyzer
    }

    fn locate(&self, doc: DocId) -> Option<(&LeafReader, u32)> {
        let index = self
            .leaves
            .partition_point(|leaf| leaf.base <= doc)
            .checked_sub(1)?;
        let leaf = &self.leaves[index];
        let local = doc - leaf.base;
        (local < leaf.segment.max_doc()).then_some((leaf, local))
    }

    pub fn is_deleted(&self, doc: DocId) -> bool {
        match self.locate(doc) {
            Some((leaf, local)) => leaf.is_deleted(local),
            None => true,
        }
    }

    /// The stored fields of a live document.
    pub fn document(&self, doc: DocId) -> Result<Document> {
        match self.locate(doc) {
            Some((leaf, local)) if !leaf.is_deleted(local) => leaf
                .segment
                .document(local)
                .map(Document::stored)
                .ok_or_else(|| SearchableError::invalid_argument(format!("no document {doc}"))),
            _ => Err(SearchableError::invalid_argument(format!(
                "document {doc} is deleted or out of range"
            ))),
        }
    }

    /// First value of `field` in a document, stored or not. Used for sorting.
    pub fn sort_value(&self, doc: DocId, field: &str) -> Option<&str> {
        let (leaf, local) = self.locate(doc)?;
        leaf.segment.document(local)?.get(field)
    }

    /// Number of documents containing the term, deleted ones included.
    pub fn doc_freq(&self, field: &str, term: &str) -> usize {
        self.leaves
            .iter()
            .map(|leaf| leaf.segment.doc_freq(field, term))
            .sum()
    }

    /// Every field name present in the index.
    pub fn field_names(&self) -> BTreeSet<String> {
        self.leaves
            .iter()
            .flat_map(|leaf| leaf.segment.field_names().iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::writer::{IndexWriter, IndexWriterConfig, OpenMode};
    use crate::index::document::Field;
    use crate::query::Term;
    use crate::storage::memory::{MemoryStorage, MemoryStorageConfig};

    fn make_storage() -> Arc<dyn Storage> {
        Arc::new(MemoryStorage::new(MemoryStorageConfig::default()))
    }

    #[test]
    fn test_open_without_index() {
        let err = IndexReader::open(make_storage()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_empty_view_until_index_exists() {
        let storage = make_storage();
        let empty = IndexReader::empty(storage.clone(), Arc::new(StandardAnalyzer::new()));
        assert_eq!(empty.generation(), 0);
        assert_eq!(empty.num_docs(), 0);
        assert!(empty.field_names().is_empty());
        assert!(empty.is_current().unwrap());

        let mut writer =
            IndexWriter::open(storage.clone(), IndexWriterConfig::default(), OpenMode::Create)
                .unwrap();
        writer
            .add_document(Document::new().add_text("title", "alpha"))
            .unwrap();
        writer.commit().unwrap();

        assert!(!empty.is_current().unwrap());
        assert_eq!(empty.reopen().unwrap().num_docs(), 1);
    }

    #[test]
    fn test_reader_is_point_in_time() {
        let storage = make_storage();
        let mut writer =
            IndexWriter::open(storage.clone(), IndexWriterConfig::default(), OpenMode::Create)
                .unwrap();
        writer
            .add_document(Document::new().add_text("title", "alpha"))
            .unwrap();
        writer.commit().unwrap();

        let reader = IndexReader::open(storage.clone()).unwrap();
        assert!(reader.is_current().unwrap());
        assert_eq!(reader.num_docs(), 1);

        writer
            .add_document(Document::new().add_text("title", "beta"))
            .unwrap();
        writer.commit().unwrap();

        assert!(!reader.is_current().unwrap());
        assert_eq!(reader.num_docs(), 1);

        let reopened = reader.reopen().unwrap();
        assert!(reopened.is_current().unwrap());
        assert_eq!(reopened.num_docs(), 2);
        assert!(Arc::ptr_eq(
            &reader.leaves()[0].segment,
            &reopened.leaves()[0].segment
        ));
        assert_eq!(reopened.document(1).unwrap().get("title"), Some("beta"));
    }

    #[test]
    fn test_deleted_and_stored_documents() {
        let storage = make_storage();
        let mut writer =
            IndexWriter::open(storage.clone(), IndexWriterConfig::default(), OpenMode::Create)
                .unwrap();
        writer
            .add_document(
                Document::new()
                    .add_keyword("_cid", "Doc:1")
                    .with(Field::unstored("body", "hidden text")),
            )
            .unwrap();
        writer
            .add_document(Document::new().add_keyword("_cid", "Doc:2"))
            .unwrap();
        writer.commit().unwrap();
        writer.delete_documents(&Term::new("_cid", "Doc:2")).unwrap();
        writer.commit().unwrap();

        let reader = IndexReader::open(storage).unwrap();
        assert_eq!(reader.max_doc(), 2);
        assert_eq!(reader.num_docs(), 1);
        assert!(reader.is_deleted(1));
        assert!(reader.document(1).is_err());

        let doc = reader.document(0).unwrap();
        assert_eq!(doc.get("body"), None);
        assert_eq!(reader.sort_value(0, "body"), Some("hidden text"));
        assert!(reader.field_names().contains("body"));
    }
}
