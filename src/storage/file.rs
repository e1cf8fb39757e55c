//! Filesystem storage.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::{Storage, StorageInput, StorageOutput};

#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    pub path: PathBuf,
}

impl FileStorageConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// A directory on the local filesystem. Created on open if missing.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn open(config: FileStorageConfig) -> Result<Self> {
        if !config.path.exists() {
            fs::create_dir_all(&config.path)?;
        }
        Ok(Self { root: config.path })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[derive(Debug)]
struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

#[derive(Debug)]
struct FileOutput {
    writer: BufWriter<File>,
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let file = File::open(self.resolve(name))?;
        let size = file.metadata()?.len();
        Ok(Box::new(FileInput {
            reader: BufReader::new(file),
            size,
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let file = File::create(self.resolve(name))?;
        Ok(Box::new(FileOutput {
            writer: BufWriter::new(file),
        }))
    }

    fn create_output_new(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.resolve(name))?;
        Ok(Box::new(FileOutput {
            writer: BufWriter::new(file),
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.resolve(name).exists()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.resolve(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn rename_file(&self, from: &str, to: &str) -> Result<()> {
        fs::rename(self.resolve(from), self.resolve(to))?;
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_new_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(FileStorageConfig::new(dir.path())).unwrap();

        storage.create_output_new("write.lock").unwrap();
        let err = storage.create_output_new("write.lock").unwrap_err();
        match err {
            crate::error::SearchableError::Io(e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rename_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(FileStorageConfig::new(dir.path())).unwrap();

        storage.write_all("meta", b"old").unwrap();
        storage.write_all("meta.tmp", b"new").unwrap();
        storage.rename_file("meta.tmp", "meta").unwrap();

        assert_eq!(storage.read_all("meta").unwrap(), b"new".to_vec());
        assert!(!storage.file_exists("meta.tmp"));
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(FileStorageConfig::new(dir.path())).unwrap();
        storage.delete_file("nothing-here").unwrap();
    }
}
