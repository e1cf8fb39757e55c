//! Pluggable storage backends holding the files of one index.
//!
//! A [`Storage`] is the durable root of an index: every other handle
//! (writer, reader, searcher) is derived from the files it holds. Two
//! backends are provided:
//!
//! - [`file::FileStorage`]: a directory on the local filesystem
//! - [`memory::MemoryStorage`]: process-local, useful for tests and
//!   short-lived indexes

pub mod file;
pub mod memory;

use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::Result;

use self::file::{FileStorage, FileStorageConfig};
use self::memory::{MemoryStorage, MemoryStorageConfig};

/// A readable file.
pub trait StorageInput: Read + Send + std::fmt::Debug {
    /// Total size of the file in bytes.
    fn size(&self) -> Result<u64>;
}

/// A writable file.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush buffered bytes and make them durable.
    fn flush_and_sync(&mut self) -> Result<()>;
}

/// A flat namespace of named files.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create (or truncate) a file for writing.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Create a file that must not exist yet.
    ///
    /// Fails with `std::io::ErrorKind::AlreadyExists` otherwise. Used for lock files.
    fn create_output_new(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    fn file_exists(&self, name: &str) -> bool;

    fn delete_file(&self, name: &str) -> Result<()>;

    /// Atomically replace `to` with `from`.
    fn rename_file(&self, from: &str, to: &str) -> Result<()>;

    fn list_files(&self) -> Result<Vec<String>>;

    /// Human readable location, used in log and error messages.
    fn location(&self) -> String;

    /// Read a whole file into memory.
    fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        let mut input = self.open_input(name)?;
        let mut buffer = Vec::with_capacity(input.size()? as usize);
        input.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Write a whole file and sync it.
    fn write_all(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut output = self.create_output(name)?;
        output.write_all(bytes)?;
        output.flush_and_sync()
    }
}

/// Storage backend selection.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    File(FileStorageConfig),
    Memory(MemoryStorageConfig),
}

/// Builds storage backends from a [`StorageConfig`].
pub struct StorageFactory;

impl StorageFactory {
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::File(config) => Ok(Arc::new(FileStorage::open(config)?)),
            StorageConfig::Memory(config) => Ok(Arc::new(MemoryStorage::new(config))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_memory() {
        let storage =
            StorageFactory::create(StorageConfig::Memory(MemoryStorageConfig::default())).unwrap();
        storage.write_all("a.json", b"{}").unwrap();
        assert!(storage.file_exists("a.json"));
        assert_eq!(storage.read_all("a.json").unwrap(), b"{}".to_vec());
    }

    #[test]
    fn test_factory_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileStorageConfig::new(dir.path().join("nested"));
        let storage = StorageFactory::create(StorageConfig::File(config)).unwrap();
        storage.write_all("a.json", b"[1]").unwrap();
        assert_eq!(storage.list_files().unwrap(), vec!["a.json".to_string()]);
    }
}
