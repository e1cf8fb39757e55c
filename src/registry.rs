//! Path-keyed address book of open index handles.
//!
//! The registry only stores handles; opening and closing them is the job of
//! [`crate::lifecycle::IndexLifecycle`]. One registry is meant to be created
//! per process and shared (`Arc<ResourceRegistry>`) by every lifecycle, so
//! that lifecycles addressing the same path share one handle set.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::index::{IndexReader, IndexSearcher, IndexWriter};
use crate::storage::Storage;

/// Shared writer handle. Callers serialize their own mutations through the mutex.
pub type WriterHandle = Arc<Mutex<IndexWriter>>;

/// The four kinds of handle kept per index path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Directory,
    Writer,
    Reader,
    Searcher,
}

impl HandleKind {
    pub const ALL: [HandleKind; 4] = [
        HandleKind::Directory,
        HandleKind::Writer,
        HandleKind::Reader,
        HandleKind::Searcher,
    ];
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleKind::Directory => "directory",
            HandleKind::Writer => "writer",
            HandleKind::Reader => "reader",
            HandleKind::Searcher => "searcher",
        };
        f.write_str(name)
    }
}

/// Handles of one kind, keyed by index path.
pub struct Slot<T: ?Sized> {
    handles: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> Default for Slot<T> {
    fn default() -> Self {
        Slot {
            handles: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handles = self.handles.read();
        let mut paths: Vec<&String> = handles.keys().collect();
        paths.sort();
        f.debug_struct("Slot").field("paths", &paths).finish()
    }
}

impl<T: ?Sized> Slot<T> {
    pub fn get(&self, path: &str) -> Option<Arc<T>> {
        self.handles.read().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.handles.read().contains_key(path)
    }

    /// Register a handle unless one is already registered.
    ///
    /// Returns `None` when `handle` was registered, or the handle already
    /// present, which stays in place. The caller owns a refused handle and
    /// must close it.
    pub fn put(&self, path: &str, handle: Arc<T>) -> Option<Arc<T>> {
        let mut handles = self.handles.write();
        match handles.get(path) {
            Some(existing) => Some(existing.clone()),
            None => {
                handles.insert(path.to_string(), handle);
                None
            }
        }
    }

    pub fn remove(&self, path: &str) -> Option<Arc<T>> {
        self.handles.write().remove(path)
    }

    /// Swap `current` for `new` if `current` is still the registered handle.
    pub fn replace(&self, path: &str, current: &Arc<T>, new: Arc<T>) -> bool {
        let mut handles = self.handles.write();
        match handles.get_mut(path) {
            Some(registered) if Arc::ptr_eq(registered, current) => {
                *registered = new;
                true
            }
            _ => false,
        }
    }

    /// Return the registered handle, or build and register one.
    ///
    /// `open` runs under the slot's write lock, so racing callers observe a
    /// single handle and never open a second one. A failed `open` registers
    /// nothing.
    pub fn get_or_try_insert_with<F>(&self, path: &str, open: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>>,
    {
        if let Some(handle) = self.get(path) {
            return Ok(handle);
        }
        let mut handles = self.handles.write();
        if let Some(handle) = handles.get(path) {
            return Ok(handle.clone());
        }
        let handle = open()?;
        handles.insert(path.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.handles.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}

/// Registry of directory, writer, reader and searcher handles per index path.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    directories: Slot<dyn Storage>,
    writers: Slot<Mutex<IndexWriter>>,
    readers: Slot<IndexReader>,
    searchers: Slot<IndexSearcher>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry ready to be shared between lifecycles.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn directories(&self) -> &Slot<dyn Storage> {
        &self.directories
    }

    pub fn writers(&self) -> &Slot<Mutex<IndexWriter>> {
        &self.writers
    }

    pub fn readers(&self) -> &Slot<IndexReader> {
        &self.readers
    }

    pub fn searchers(&self) -> &Slot<IndexSearcher> {
        &self.searchers
    }

    pub fn contains(&self, path: &str, kind: HandleKind) -> bool {
        match kind {
            HandleKind::Directory => self.directories.contains(path),
            HandleKind::Writer => self.writers.contains(path),
            HandleKind::Reader => self.readers.contains(path),
            HandleKind::Searcher => self.searchers.contains(path),
        }
    }

    /// Kinds currently registered for `path`.
    pub fn kinds(&self, path: &str) -> Vec<HandleKind> {
        HandleKind::ALL
            .into_iter()
            .filter(|kind| self.contains(path, *kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::SearchableError;
    use crate::storage::memory::{MemoryStorage, MemoryStorageConfig};

    #[test]
    fn test_put_never_overwrites() {
        let slot: Slot<String> = Slot::default();
        let first = Arc::new("first".to_string());
        assert!(slot.put("/idx", first.clone()).is_none());

        let refused = slot.put("/idx", Arc::new("second".to_string()));
        assert!(Arc::ptr_eq(&refused.unwrap(), &first));
        assert_eq!(slot.get("/idx").unwrap().as_str(), "first");

        assert!(slot.remove("/idx").is_some());
        assert!(slot.put("/idx", Arc::new("second".to_string())).is_none());
    }

    #[test]
    fn test_replace_is_compare_and_set() {
        let slot: Slot<u32> = Slot::default();
        let old = Arc::new(1);
        slot.put("/idx", old.clone());

        let stranger = Arc::new(1);
        assert!(!slot.replace("/idx", &stranger, Arc::new(2)));
        assert_eq!(*slot.get("/idx").unwrap(), 1);

        assert!(slot.replace("/idx", &old, Arc::new(3)));
        assert_eq!(*slot.get("/idx").unwrap(), 3);
        assert!(!slot.replace("/other", &old, Arc::new(4)));
    }

    #[test]
    fn test_racing_inserts_open_one_handle() {
        let slot: Slot<u32> = Slot::default();
        let opened = AtomicUsize::new(0);

        let handles: Vec<Arc<u32>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|i| {
                    let slot = &slot;
                    let opened = &opened;
                    scope.spawn(move || {
                        slot.get_or_try_insert_with("/idx", || {
                            opened.fetch_add(1, Ordering::SeqCst);
                            Ok(Arc::new(i))
                        })
                        .unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_open_registers_nothing() {
        let slot: Slot<u32> = Slot::default();
        let result = slot.get_or_try_insert_with("/idx", || {
            Err(SearchableError::index_unavailable_msg("boom"))
        });
        assert!(result.is_err());
        assert!(!slot.contains("/idx"));
    }

    #[test]
    fn test_registry_kinds() {
        let registry = ResourceRegistry::new();
        let storage: Arc<dyn Storage> =
            Arc::new(MemoryStorage::new(MemoryStorageConfig::default()));
        registry.directories().put("/idx", storage);

        assert!(registry.contains("/idx", HandleKind::Directory));
        assert!(!registry.contains("/idx", HandleKind::Writer));
        assert_eq!(registry.kinds("/idx"), vec![HandleKind::Directory]);
        assert_eq!(HandleKind::Searcher.to_string(), "searcher");
    }
}
