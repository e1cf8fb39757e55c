//! In-memory storage.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::storage::{Storage, StorageInput, StorageOutput};

type FileMap = Arc<RwLock<HashMap<String, Arc<Vec<u8>>>>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStorageConfig {
    /// Label used in log and error messages.
    pub name: Option<String>,
}

/// Files kept in a shared map. Contents live as long as the storage does.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    config: MemoryStorageConfig,
    files: FileMap,
}

impl MemoryStorage {
    pub fn new(config: MemoryStorageConfig) -> Self {
        Self {
            config,
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[derive(Debug)]
struct MemoryInput {
    data: Arc<Vec<u8>>,
    position: usize,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = &self.data[self.position.min(self.data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }
}

/// Bytes become visible to readers on flush and on drop.
#[derive(Debug)]
struct MemoryOutput {
    name: String,
    buffer: Vec<u8>,
    files: FileMap,
}

impl MemoryOutput {
    fn publish(&self) {
        self.files
            .write()
            .insert(self.name.clone(), Arc::new(self.buffer.clone()));
    }
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.publish();
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        self.publish();
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let data = self.files.read().get(name).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{name} not found in {}", self.location()),
            )
        })?;
        Ok(Box::new(MemoryInput { data, position: 0 }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.files
            .write()
            .insert(name.to_string(), Arc::new(Vec::new()));
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer: Vec::new(),
            files: self.files.clone(),
        }))
    }

    fn create_output_new(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let mut files = self.files.write();
        if files.contains_key(name) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{name} already exists in {}", self.location()),
            )
            .into());
        }
        files.insert(name.to_string(), Arc::new(Vec::new()));
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer: Vec::new(),
            files: self.files.clone(),
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.write().remove(name);
        Ok(())
    }

    fn rename_file(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.files.write();
        let data = files.remove(from).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("{from} not found"))
        })?;
        files.insert(to.to_string(), data);
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn location(&self) -> String {
        format!("memory:{}", self.config.name.as_deref().unwrap_or("anonymous"))
    }
}
