//! Open, refresh and tear down the handle set of one index path.
//!
//! [`IndexLifecycle`] is the only code that opens or closes handles. It
//! stores them in a shared [`ResourceRegistry`], so every lifecycle built on
//! the same registry and path works against the same directory, writer,
//! reader and searcher.
//!
//! # Batch mode
//!
//! In batch mode writers are opened with a large merge factor and cached
//! readers are not refreshed after writes: searches keep seeing the last
//! reader until [`IndexLifecycle::flush`] (or `close`) publishes the batch.
//! Toggling batch mode does not retune a writer that is already open; the
//! new mode applies to the next writer opened for the path.
//!
//! # Analyzer
//!
//! Tokenized fields are analyzed with the lifecycle's analyzer, both when
//! documents are indexed and when free-text criteria are parsed. Like batch
//! mode, [`IndexLifecycle::set_analyzer`] applies to handles opened after the
//! call. An index must be read with the analyzer it was written with.
//!
//! # Writers
//!
//! The writer handle is shared. The lifecycle hands out
//! `Arc<Mutex<IndexWriter>>` and does not order mutations coming from
//! different callers; callers writing concurrently to one path coordinate
//! among themselves.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::analysis::{Analyzer, StandardAnalyzer};
use crate::config::IndexConfig;
use crate::error::{Result, SearchableError, unavailable};
use crate::index::meta::IndexMeta;
use crate::index::{IndexReader, IndexSearcher, IndexWriter, IndexWriterConfig, OpenMode};
use crate::registry::{ResourceRegistry, WriterHandle};
use crate::storage::{Storage, StorageFactory};

/// Per-path façade over the shared registry.
#[derive(Debug)]
pub struct IndexLifecycle {
    registry: Arc<ResourceRegistry>,
    config: RwLock<IndexConfig>,
    batch_mode: AtomicBool,
    analyzer: RwLock<Arc<dyn Analyzer>>,
}

impl IndexLifecycle {
    pub fn new(registry: Arc<ResourceRegistry>, config: IndexConfig) -> Self {
        let batch_mode = AtomicBool::new(config.batch_mode);
        IndexLifecycle {
            registry,
            config: RwLock::new(config),
            batch_mode,
            analyzer: RwLock::new(Arc::new(StandardAnalyzer::new())),
        }
    }

    /// Builder-style variant of [`IndexLifecycle::set_analyzer`].
    pub fn with_analyzer(self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.set_analyzer(analyzer);
        self
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> IndexConfig {
        self.config.read().clone()
    }

    pub fn index_path(&self) -> PathBuf {
        self.config.read().index_path.clone()
    }

    /// Point this lifecycle at another index.
    ///
    /// Handles already open for the previous path stay registered; close
    /// them first if they are no longer needed.
    pub fn set_index_path(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut config = self.config.write();
        debug!("Index path changed from {:?} to {:?}", config.index_path, path);
        config.index_path = path;
    }

    /// Registry key of the current path.
    pub fn path_key(&self) -> String {
        self.config.read().path_key()
    }

    pub fn is_batch_mode(&self) -> bool {
        self.batch_mode.load(Ordering::SeqCst)
    }

    /// Takes effect on the next writer opened for this path.
    pub fn set_batch_mode(&self, batch_mode: bool) {
        self.batch_mode.store(batch_mode, Ordering::SeqCst);
    }

    pub fn analyzer(&self) -> Arc<dyn Analyzer> {
        self.analyzer.read().clone()
    }

    /// Takes effect on the next writer and reader opened for this path.
    pub fn set_analyzer(&self, analyzer: Arc<dyn Analyzer>) {
        debug!("Analyzer for {} set to {}", self.path_key(), analyzer.name());
        *self.analyzer.write() = analyzer;
    }

    /// A guard that closes this lifecycle when dropped.
    pub fn scoped(self: &Arc<Self>) -> ScopedLifecycle {
        ScopedLifecycle {
            lifecycle: self.clone(),
            closed: false,
        }
    }

    /// The storage holding the index files, opened on first use.
    pub fn directory(&self) -> Result<Arc<dyn Storage>> {
        let config = self.config();
        let path = config.path_key();
        self.registry
            .directories()
            .get_or_try_insert_with(&path, || {
                debug!("Opening directory {path}");
                StorageFactory::create(config.storage_config())
            })
            .map_err(unavailable(format!("Could not open directory {path}")))
    }

    /// The writer for this path, opening it (and creating the index if the
    /// directory holds none) when none is registered.
    pub fn acquire_writer(&self) -> Result<WriterHandle> {
        let path = self.path_key();
        let storage = self.directory()?;
        self.registry.writers().get_or_try_insert_with(&path, || {
            let writer = self.open_writer(&storage)?;
            Ok(Arc::new(Mutex::new(writer)))
        })
    }

    fn open_writer(&self, storage: &Arc<dyn Storage>) -> Result<IndexWriter> {
        let writer_config = self.writer_config();

        let opened = IndexWriter::open(storage.clone(), writer_config.clone(), OpenMode::Append);
        let mut writer = match opened {
            Ok(writer) => writer,
            Err(e) if e.is_not_found() || Self::is_unusable_lock(&e, storage) => {
                info!("No usable index in {}, creating one", storage.location());
                self.unlock_if_locked(storage)?;
                IndexWriter::open(storage.clone(), writer_config, OpenMode::Create).map_err(
                    unavailable(format!("Could not create index in {}", storage.location())),
                )?
            }
            Err(e) => {
                return Err(unavailable(format!(
                    "Could not open writer on {}",
                    storage.location()
                ))(e));
            }
        };

        self.tune(&mut writer)?;
        Ok(writer)
    }

    /// Writers open with the interactive merge factor; see [`Self::tune`].
    fn writer_config(&self) -> IndexWriterConfig {
        IndexWriterConfig {
            analyzer: self.analyzer(),
            ..self.config().writer_config(false)
        }
    }

    /// A lock left in a directory that holds no index cannot belong to a live writer.
    fn is_unusable_lock(e: &SearchableError, storage: &Arc<dyn Storage>) -> bool {
        matches!(e, SearchableError::LockObtainFailed(_)) && !IndexMeta::exists(storage.as_ref())
    }

    fn unlock_if_locked(&self, storage: &Arc<dyn Storage>) -> Result<()> {
        if IndexWriter::is_locked(storage.as_ref()) {
            warn!("Removing stale write lock in {}", storage.location());
            IndexWriter::unlock(storage.as_ref())
                .map_err(unavailable(format!("Could not unlock {}", storage.location())))?;
        }
        Ok(())
    }

    /// Apply the batch merge factor right after a writer is opened.
    fn tune(&self, writer: &mut IndexWriter) -> Result<()> {
        if self.is_batch_mode() {
            let merge_factor = self.config.read().batch_merge_factor;
            debug!("Batch mode: merge factor set to {merge_factor}");
            writer.set_merge_factor(merge_factor)?;
        }
        Ok(())
    }

    /// Discard the content of this index and start an empty one.
    ///
    /// Any registered writer is closed first. Cached readers and searchers
    /// are evicted.
    pub fn create_index(&self) -> Result<WriterHandle> {
        let path = self.path_key();
        let storage = self.directory()?;

        if let Some(previous) = self.registry.writers().remove(&path) {
            previous
                .lock()
                .close()
                .map_err(unavailable(format!("Could not close writer for {path}")))?;
        }

        let mut writer = IndexWriter::open(storage.clone(), self.writer_config(), OpenMode::Create)
            .map_err(unavailable(format!("Could not create index at {path}")))?;
        self.tune(&mut writer)?;
        info!("Created index at {path}");

        self.registry.readers().remove(&path);
        self.registry.searchers().remove(&path);

        let handle = Arc::new(Mutex::new(writer));
        match self.registry.writers().put(&path, handle.clone()) {
            None => Ok(handle),
            Some(existing) => {
                if let Err(e) = handle.lock().close() {
                    warn!("Could not close redundant writer for {path}: {e}");
                }
                Ok(existing)
            }
        }
    }

    /// A reader reflecting every commit, except in batch mode where the
    /// cached reader is kept until the next flush.
    ///
    /// A path without an index gets an empty reader. Reading never creates
    /// an index or takes the write lock.
    pub fn acquire_reader(&self) -> Result<Arc<IndexReader>> {
        let path = self.path_key();
        let readers = self.registry.readers();

        if let Some(reader) = readers.get(&path) {
            if self.is_batch_mode() {
                return Ok(reader);
            }
            let current = reader
                .is_current()
                .map_err(unavailable(format!("Could not check reader for {path}")))?;
            if current {
                return Ok(reader);
            }

            debug!("Reader for {path} is stale, reopening");
            let fresh = Arc::new(
                reader
                    .reopen()
                    .map_err(unavailable(format!("Could not reopen reader for {path}")))?,
            );
            if readers.replace(&path, &reader, fresh.clone()) {
                return Ok(fresh);
            }
            // Another caller refreshed or evicted it meanwhile.
            return Ok(readers.get(&path).unwrap_or(fresh));
        }

        let storage = self.directory()?;
        readers.get_or_try_insert_with(&path, || {
            let analyzer = self.analyzer();
            let reader = match IndexReader::open_with_analyzer(storage.clone(), analyzer.clone()) {
                Ok(reader) => reader,
                Err(e) if e.is_not_found() && !IndexMeta::exists(storage.as_ref()) => {
                    debug!("No index at {path} yet, using an empty reader");
                    IndexReader::empty(storage.clone(), analyzer)
                }
                Err(e) => {
                    return Err(unavailable(format!("Could not open reader for {path}"))(e));
                }
            };
            Ok(Arc::new(reader))
        })
    }

    /// A searcher over the reader [`IndexLifecycle::acquire_reader`] returns.
    pub fn acquire_searcher(&self) -> Result<Arc<IndexSearcher>> {
        let path = self.path_key();
        let reader = self.acquire_reader()?;
        let searchers = self.registry.searchers();

        if let Some(searcher) = searchers.get(&path) {
            if Arc::ptr_eq(searcher.reader(), &reader) {
                return Ok(searcher);
            }
            let fresh = Arc::new(IndexSearcher::new(reader));
            searchers.replace(&path, &searcher, fresh.clone());
            return Ok(fresh);
        }

        let fresh = Arc::new(IndexSearcher::new(reader));
        match searchers.put(&path, fresh.clone()) {
            Some(existing) if Arc::ptr_eq(existing.reader(), fresh.reader()) => Ok(existing),
            _ => Ok(fresh),
        }
    }

    /// Commit buffered changes and drop the cached reader and searcher so
    /// the next acquire observes them.
    pub fn flush(&self) -> Result<()> {
        let path = self.path_key();
        if let Some(writer) = self.registry.writers().get(&path) {
            writer
                .lock()
                .commit()
                .map_err(unavailable(format!("Could not flush {path}")))?;
            debug!("Flushed {path}");
        }
        self.registry.readers().remove(&path);
        self.registry.searchers().remove(&path);
        Ok(())
    }

    /// Merge the index into a single segment.
    pub fn optimize(&self) -> Result<()> {
        let path = self.path_key();
        let writer = self.acquire_writer()?;
        writer
            .lock()
            .optimize()
            .map_err(unavailable(format!("Could not optimize {path}")))
    }

    /// Flush (in batch mode), optimize, then close and evict the writer,
    /// reader and searcher of this path.
    ///
    /// Closing a path with nothing open is a no-op. Every step is attempted
    /// even if an earlier one fails; the first failure is returned. The
    /// directory stays registered, so in-memory indexes survive a close.
    pub fn close(&self) -> Result<()> {
        let path = self.path_key();
        let mut first_error: Option<SearchableError> = None;
        let mut record = |result: Result<()>, action: &str| {
            if let Err(e) = result {
                error!("Could not {action} {path}: {e}");
                if first_error.is_none() {
                    first_error = Some(unavailable(format!("Could not {action} {path}"))(e));
                }
            }
        };

        if let Some(writer) = self.registry.writers().get(&path) {
            let mut writer = writer.lock();
            if self.is_batch_mode() {
                record(writer.commit(), "flush");
            }
            record(writer.optimize(), "optimize");
            record(writer.close(), "close writer for");
        }

        self.registry.searchers().remove(&path);
        self.registry.readers().remove(&path);
        if self.registry.writers().remove(&path).is_some() {
            info!("Closed index at {path}");
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of live documents visible to [`IndexLifecycle::acquire_reader`].
    pub fn num_docs(&self) -> Result<u32> {
        Ok(self.acquire_reader()?.num_docs())
    }
}

/// Closes its lifecycle when dropped.
///
/// Errors from the implicit close are logged; call
/// [`ScopedLifecycle::close`] to observe them.
#[derive(Debug)]
pub struct ScopedLifecycle {
    lifecycle: Arc<IndexLifecycle>,
    closed: bool,
}

impl ScopedLifecycle {
    pub fn lifecycle(&self) -> &Arc<IndexLifecycle> {
        &self.lifecycle
    }

    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.lifecycle.close()
    }
}

impl Deref for ScopedLifecycle {
    type Target = IndexLifecycle;

    fn deref(&self) -> &Self::Target {
        &self.lifecycle
    }
}

impl Drop for ScopedLifecycle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.lifecycle.close() {
            error!("Closing index {} failed: {e}", self.lifecycle.path_key());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::KeywordAnalyzer;
    use crate::config::{BATCH_MERGE_FACTOR, StorageKind};
    use crate::index::Document;
    use crate::registry::HandleKind;

    fn lifecycle(name: &str) -> IndexLifecycle {
        IndexLifecycle::new(ResourceRegistry::shared(), IndexConfig::memory(name))
    }

    fn add(lifecycle: &IndexLifecycle, title: &str) {
        let writer = lifecycle.acquire_writer().unwrap();
        let mut writer = writer.lock();
        writer
            .add_document(Document::new().add_text("title", title))
            .unwrap();
        writer.commit().unwrap();
    }

    #[test]
    fn test_writer_is_cached_and_creates_index() {
        let lifecycle = lifecycle("writer");
        let first = lifecycle.acquire_writer().unwrap();
        let second = lifecycle.acquire_writer().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(IndexMeta::exists(lifecycle.directory().unwrap().as_ref()));
        assert_eq!(first.lock().merge_factor(), 10);
    }

    #[test]
    fn test_batch_mode_tunes_next_writer_only() {
        let lifecycle = lifecycle("batch");
        let interactive = lifecycle.acquire_writer().unwrap();
        lifecycle.set_batch_mode(true);
        assert_eq!(interactive.lock().merge_factor(), 10);

        lifecycle.close().unwrap();
        let batch = lifecycle.acquire_writer().unwrap();
        assert_eq!(batch.lock().merge_factor(), BATCH_MERGE_FACTOR);
    }

    #[test]
    fn test_stale_lock_without_index_is_removed() {
        let lifecycle = lifecycle("stale-lock");
        let storage = lifecycle.directory().unwrap();
        storage.write_all("write.lock", b"4242").unwrap();

        let writer = lifecycle.acquire_writer().unwrap();
        assert_eq!(writer.lock().generation(), 1);
    }

    #[test]
    fn test_reader_refreshes_outside_batch_mode() {
        let lifecycle = lifecycle("refresh");
        add(&lifecycle, "alpha");
        let first = lifecycle.acquire_reader().unwrap();
        let again = lifecycle.acquire_reader().unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        add(&lifecycle, "beta");
        let refreshed = lifecycle.acquire_reader().unwrap();
        assert_eq!(refreshed.num_docs(), 2);
        assert!(refreshed.is_current().unwrap());
    }

    #[test]
    fn test_batch_reader_is_stale_until_flush() {
        let lifecycle = lifecycle("batch-reader");
        lifecycle.set_batch_mode(true);
        add(&lifecycle, "alpha");
        assert_eq!(lifecycle.acquire_reader().unwrap().num_docs(), 1);

        add(&lifecycle, "beta");
        assert_eq!(lifecycle.acquire_reader().unwrap().num_docs(), 1);

        lifecycle.flush().unwrap();
        assert_eq!(lifecycle.acquire_reader().unwrap().num_docs(), 2);
    }

    #[test]
    fn test_searcher_follows_reader() {
        let lifecycle = lifecycle("searcher");
        add(&lifecycle, "alpha");
        let first = lifecycle.acquire_searcher().unwrap();
        assert!(Arc::ptr_eq(&first, &lifecycle.acquire_searcher().unwrap()));

        add(&lifecycle, "beta");
        let second = lifecycle.acquire_searcher().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.reader().num_docs(), 2);
    }

    #[test]
    fn test_reader_on_empty_path_leaves_index_untouched() {
        let lifecycle = lifecycle("empty");
        assert_eq!(lifecycle.num_docs().unwrap(), 0);
        assert_eq!(lifecycle.acquire_searcher().unwrap().reader().generation(), 0);

        let path = lifecycle.path_key();
        let storage = lifecycle.directory().unwrap();
        assert!(!lifecycle.registry().contains(&path, HandleKind::Writer));
        assert!(!IndexMeta::exists(storage.as_ref()));
        assert!(!IndexWriter::is_locked(storage.as_ref()));

        add(&lifecycle, "alpha");
        assert_eq!(lifecycle.num_docs().unwrap(), 1);
    }

    #[test]
    fn test_analyzer_reaches_writer_and_reader() {
        let lifecycle = lifecycle("analyzer").with_analyzer(Arc::new(KeywordAnalyzer::new()));
        add(&lifecycle, "Alpha Case");
        assert_eq!(
            lifecycle.acquire_writer().unwrap().lock().config().analyzer.name(),
            "keyword"
        );

        let reader = lifecycle.acquire_reader().unwrap();
        assert_eq!(reader.analyzer().name(), "keyword");
        assert_eq!(reader.doc_freq("title", "Alpha Case"), 1);
        assert_eq!(reader.doc_freq("title", "alpha"), 0);
    }

    #[test]
    fn test_create_index_discards_content() {
        let lifecycle = lifecycle("create");
        add(&lifecycle, "alpha");
        assert_eq!(lifecycle.num_docs().unwrap(), 1);

        let writer = lifecycle.create_index().unwrap();
        assert!(Arc::ptr_eq(&writer, &lifecycle.acquire_writer().unwrap()));
        assert_eq!(lifecycle.num_docs().unwrap(), 0);
    }

    #[test]
    fn test_close_is_idempotent_and_evicts() {
        let lifecycle = lifecycle("close");
        add(&lifecycle, "alpha");
        lifecycle.acquire_searcher().unwrap();
        let path = lifecycle.path_key();

        lifecycle.close().unwrap();
        let registry = lifecycle.registry();
        assert_eq!(registry.kinds(&path), vec![HandleKind::Directory]);
        lifecycle.close().unwrap();

        // Memory storage keeps its content across a close.
        assert_eq!(lifecycle.num_docs().unwrap(), 1);
    }

    #[test]
    fn test_scoped_lifecycle_closes_on_drop() {
        let registry = ResourceRegistry::shared();
        let lifecycle = Arc::new(IndexLifecycle::new(
            registry.clone(),
            IndexConfig::memory("scoped"),
        ));
        {
            let scoped = lifecycle.scoped();
            scoped.acquire_writer().unwrap();
            assert!(registry.contains("scoped", HandleKind::Writer));
        }
        assert!(!registry.contains("scoped", HandleKind::Writer));
    }

    #[test]
    fn test_shared_registry_shares_handles() {
        let registry = ResourceRegistry::shared();
        let a = IndexLifecycle::new(registry.clone(), IndexConfig::memory("shared"));
        let b = IndexLifecycle::new(registry.clone(), IndexConfig::memory("shared"));
        let c = IndexLifecycle::new(registry, IndexConfig::memory("other"));

        assert!(Arc::ptr_eq(&a.acquire_writer().unwrap(), &b.acquire_writer().unwrap()));
        assert!(!Arc::ptr_eq(&a.acquire_writer().unwrap(), &c.acquire_writer().unwrap()));
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig::new(dir.path().join("index")).with_storage(StorageKind::File);
        let lifecycle = IndexLifecycle::new(ResourceRegistry::shared(), config.clone());
        add(&lifecycle, "alpha");
        lifecycle.close().unwrap();

        let reopened = IndexLifecycle::new(ResourceRegistry::shared(), config);
        assert_eq!(reopened.num_docs().unwrap(), 1);
    }
}
