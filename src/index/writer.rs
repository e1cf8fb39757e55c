//! Index writer implementation.
//!
//! A writer owns the write lock of its storage for as long as it is open.
//! Added documents are buffered and written out as new segments; nothing
//! becomes visible to readers until [`IndexWriter::commit`] publishes a new
//! generation of `index.meta`.

use std::io::Write;
use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, warn};

use crate::analysis::{Analyzer, StandardAnalyzer};
use crate::error::{Result, SearchableError};
use crate::index::WRITE_LOCK_NAME;
use crate::index::document::Document;
use crate::index::meta::{IndexMeta, SegmentMeta};
use crate::index::segment::{SegmentReader, document_has_term};
use crate::query::Term;
use crate::storage::Storage;

/// Merge factor used for interactive indexing.
pub const DEFAULT_MERGE_FACTOR: usize = 10;

/// Documents buffered before they are written out as a segment.
pub const DEFAULT_MAX_BUFFERED_DOCS: usize = 1000;

/// How to open a writer against a storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open the existing index; fails with `IndexNotFound` if there is none.
    Append,
    /// Start a brand-new, empty index, discarding any prior content.
    Create,
}

/// Index writer configuration.
#[derive(Debug, Clone)]
pub struct IndexWriterConfig {
    /// Number of segments that triggers a merge on commit.
    ///
    /// Larger values defer merging, which favours bulk throughput.
    pub merge_factor: usize,

    /// Maximum number of documents to buffer before writing a segment.
    pub max_buffered_docs: usize,

    /// Analyzer for tokenized fields. Readers of the index must use the same one.
    pub analyzer: Arc<dyn Analyzer>,
}

impl Default for IndexWriterConfig {
    fn default() -> Self {
        IndexWriterConfig {
            merge_factor: DEFAULT_MERGE_FACTOR,
            max_buffered_docs: DEFAULT_MAX_BUFFERED_DOCS,
            analyzer: Arc::new(StandardAnalyzer::new()),
        }
    }
}

/// Statistics about the writing process.
#[derive(Debug, Clone, Default)]
pub struct WriterStats {
    /// Number of documents added.
    pub docs_added: u64,
    /// Number of documents deleted.
    pub docs_deleted: u64,
    /// Number of segments created, merges included.
    pub segments_created: u32,
    /// Number of merges performed.
    pub merges: u32,
    /// Number of generations published.
    pub commits: u32,
}

pub struct IndexWriter {
    storage: Arc<dyn Storage>,

    config: IndexWriterConfig,

    /// Working commit point: committed segments plus segments written since.
    meta: IndexMeta,

    /// Documents added but not yet written to a segment.
    buffered_docs: Vec<Document>,

    /// Segments loaded to resolve deletes.
    segment_cache: AHashMap<String, Arc<SegmentReader>>,

    /// Whether `meta` differs from what is on disk.
    dirty: bool,

    closed: bool,

    stats: WriterStats,
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("storage", &self.storage.location())
            .field("config", &self.config)
            .field("generation", &self.meta.generation)
            .field("segments", &self.meta.segments.len())
            .field("buffered_docs_count", &self.buffered_docs.len())
            .field("closed", &self.closed)
            .field("stats", &self.stats)
            .finish()
    }
}

impl IndexWriter {
    /// Open a writer, taking the write lock.
    pub fn open(
        storage: Arc<dyn Storage>,
        config: IndexWriterConfig,
        mode: OpenMode,
    ) -> Result<Self> {
        Self::obtain_lock(storage.as_ref())?;

        let meta = match (mode, IndexMeta::read(storage.as_ref())) {
            (_, Ok(meta)) => meta,
            (OpenMode::Create, Err(e)) if e.is_not_found() => IndexMeta::default(),
            (_, Err(e)) => {
                Self::release_lock(storage.as_ref());
                return Err(e);
            }
        };

        let mut writer = IndexWriter {
            storage,
            config,
            meta,
            buffered_docs: Vec::new(),
            segment_cache: AHashMap::new(),
            dirty: false,
            closed: false,
            stats: WriterStats::default(),
        };

        if mode == OpenMode::Create {
            debug!("Creating index in {}", writer.storage.location());
            writer.meta.segments.clear();
            writer.dirty = true;
            if let Err(e) = writer.publish() {
                writer.closed = true;
                Self::release_lock(writer.storage.as_ref());
                return Err(e);
            }
        }

        Ok(writer)
    }

    /// Whether some writer currently holds the lock on `storage`.
    pub fn is_locked(storage: &dyn Storage) -> bool {
        storage.file_exists(WRITE_LOCK_NAME)
    }

    /// Forcibly remove the write lock, e.g. one left behind by a crashed writer.
    pub fn unlock(storage: &dyn Storage) -> Result<()> {
        storage.delete_file(WRITE_LOCK_NAME)
    }

    fn obtain_lock(storage: &dyn Storage) -> Result<()> {
        match storage.create_output_new(WRITE_LOCK_NAME) {
            Ok(mut output) => {
                write!(output, "{}", std::process::id())?;
                output.flush_and_sync()
            }
            Err(SearchableError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(
                SearchableError::LockObtainFailed(format!("{}/{WRITE_LOCK_NAME}", storage.location())),
            ),
            Err(e) => Err(e),
        }
    }

    fn release_lock(storage: &dyn Storage) {
        if let Err(e) = storage.delete_file(WRITE_LOCK_NAME) {
            warn!("Could not release write lock in {}: {e}", storage.location());
        }
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(SearchableError::index_unavailable_msg("writer is closed"))
        } else {
            Ok(())
        }
    }

    /// Buffer a document. It becomes searchable after the next commit.
    pub fn add_document(&mut self, doc: Document) -> Result<()> {
        self.check_closed()?;

        self.buffered_docs.push(doc);
        self.stats.docs_added += 1;
        self.dirty = true;

        if self.buffered_docs.len() >= self.config.max_buffered_docs {
            self.flush_segment()?;
        }
        Ok(())
    }

    /// Delete every document, buffered or written, containing `term`.
    ///
    /// Returns the number of documents deleted.
    pub fn delete_documents(&mut self, term: &Term) -> Result<usize> {
        self.check_closed()?;

        let before = self.buffered_docs.len();
        let analyzer = self.config.analyzer.clone();
        self.buffered_docs
            .retain(|doc| !document_has_term(doc, &term.field, &term.text, analyzer.as_ref()));
        let mut deleted = before - self.buffered_docs.len();

        for index in 0..self.meta.segments.len() {
            let segment = self.load_segment(index)?;
            let meta = &mut self.meta.segments[index];
            for posting in segment.postings(&term.field, &term.text) {
                if meta.deleted.insert(posting.doc) {
                    deleted += 1;
                }
            }
        }

        if deleted > 0 {
            debug!("Deleted {deleted} document(s) matching {term}");
            self.stats.docs_deleted += deleted as u64;
            self.dirty = true;
        }
        Ok(deleted)
    }

    /// Make all buffered additions and deletions visible to new readers.
    pub fn commit(&mut self) -> Result<()> {
        self.check_closed()?;

        self.flush_segment()?;
        if !self.dirty {
            return Ok(());
        }
        if self.meta.segments.len() >= self.config.merge_factor {
            self.merge_all()?;
        }
        self.publish()
    }

    /// Merge all segments into one, dropping deleted documents, and commit.
    pub fn optimize(&mut self) -> Result<()> {
        self.check_closed()?;

        self.flush_segment()?;
        let needs_merge = self.meta.segments.len() > 1
            || self.meta.segments.iter().any(|s| !s.deleted.is_empty());
        if needs_merge {
            self.merge_all()?;
        }
        if self.dirty {
            self.publish()?;
        }
        Ok(())
    }

    /// Commit pending changes and release the write lock.
    ///
    /// The lock is released even if the commit fails. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.commit();
        self.closed = true;
        self.segment_cache.clear();
        Self::release_lock(self.storage.as_ref());
        debug!("Closed writer for {}", self.storage.location());
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set_merge_factor(&mut self, merge_factor: usize) -> Result<()> {
        if merge_factor < 2 {
            return Err(SearchableError::invalid_argument(format!(
                "merge factor must be at least 2, got {merge_factor}"
            )));
        }
        self.config.merge_factor = merge_factor;
        Ok(())
    }

    pub fn merge_factor(&self) -> usize {
        self.config.merge_factor
    }

    pub fn config(&self) -> &IndexWriterConfig {
        &self.config
    }

    /// Documents added but not yet written to a segment.
    pub fn pending_docs(&self) -> usize {
        self.buffered_docs.len()
    }

    /// Whether there are changes a commit would publish.
    pub fn has_uncommitted_changes(&self) -> bool {
        self.dirty
    }

    /// Live documents, including uncommitted ones.
    pub fn num_docs(&self) -> u32 {
        self.meta.num_docs() + self.buffered_docs.len() as u32
    }

    /// Generation of the last commit made or seen by this writer.
    pub fn generation(&self) -> u64 {
        self.meta.generation
    }

    /// Number of segments in the working commit point.
    pub fn segment_count(&self) -> usize {
        self.meta.segments.len()
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Write buffered documents out as a new (uncommitted) segment.
    fn flush_segment(&mut self) -> Result<()> {
        if self.buffered_docs.is_empty() {
            return Ok(());
        }
        let docs = std::mem::take(&mut self.buffered_docs);
        self.add_segment(docs)?;
        Ok(())
    }

    fn add_segment(&mut self, docs: Vec<Document>) -> Result<()> {
        let name = self.meta.next_segment_name();
        SegmentReader::write(self.storage.as_ref(), &name, &docs)?;
        let doc_count = docs.len() as u32;
        self.segment_cache.insert(
            name.clone(),
            Arc::new(SegmentReader::from_documents(
                name.clone(),
                docs,
                self.config.analyzer.as_ref(),
            )),
        );
        self.meta.segments.push(SegmentMeta {
            name,
            doc_count,
            deleted: Default::default(),
        });
        self.stats.segments_created += 1;
        self.dirty = true;
        Ok(())
    }

    fn load_segment(&mut self, index: usize) -> Result<Arc<SegmentReader>> {
        let name = self.meta.segments[index].name.clone();
        if let Some(segment) = self.segment_cache.get(&name) {
            return Ok(segment.clone());
        }
        let segment = Arc::new(SegmentReader::load(
            self.storage.as_ref(),
            &name,
            self.config.analyzer.as_ref(),
        )?);
        self.segment_cache.insert(name, segment.clone());
        Ok(segment)
    }

    /// Replace every segment by a single one holding only live documents.
    fn merge_all(&mut self) -> Result<()> {
        let mut live = Vec::with_capacity(self.meta.num_docs() as usize);
        for index in 0..self.meta.segments.len() {
            let segment = self.load_segment(index)?;
            let deleted = &self.meta.segments[index].deleted;
            for (doc_num, doc) in segment.docs().iter().enumerate() {
                if !deleted.contains(&(doc_num as u32)) {
                    live.push(doc.clone());
                }
            }
        }

        debug!(
            "Merging {} segment(s) into one holding {} document(s)",
            self.meta.segments.len(),
            live.len()
        );
        self.meta.segments.clear();
        self.segment_cache.clear();
        if !live.is_empty() {
            self.add_segment(live)?;
        }
        self.stats.merges += 1;
        self.dirty = true;
        Ok(())
    }

    /// Write a new generation of the commit point and drop unreferenced files.
    fn publish(&mut self) -> Result<()> {
        self.meta.generation += 1;
        self.meta.write(self.storage.as_ref())?;
        self.dirty = false;
        self.stats.commits += 1;
        debug!(
            "Committed generation {} ({} segment(s), {} live document(s))",
            self.meta.generation,
            self.meta.segments.len(),
            self.meta.num_docs()
        );
        self.delete_unreferenced_files();
        Ok(())
    }

    fn delete_unreferenced_files(&mut self) {
        let files = match self.storage.list_files() {
            Ok(files) => files,
            Err(e) => {
                warn!("Could not list files in {}: {e}", self.storage.location());
                return;
            }
        };
        for file in files {
            let Some(name) = file.strip_suffix(".seg") else {
                continue;
            };
            if self.meta.segments.iter().all(|s| s.name != name) {
                if let Err(e) = self.storage.delete_file(&file) {
                    warn!("Could not delete {file}: {e}");
                }
            }
        }
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.dirty {
            warn!(
                "Writer for {} dropped with uncommitted changes; they are discarded",
                self.storage.location()
            );
        }
        Self::release_lock(self.storage.as_ref());
    }
}
