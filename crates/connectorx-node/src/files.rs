//! Device file store.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::FileError;

/// Where uploaded configuration lives.
pub const CONFIG_PATH: &str = "/config.json";

/// Blocking access to the device filesystem.
pub trait FileService: Send + Sync {
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FileError>;

    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), FileError>;

    fn read_config(&self) -> Result<Vec<u8>, FileError> {
        self.read_file(CONFIG_PATH)
    }
}

/// Files held in memory; clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileService {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryFileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(path)
    }
}

impl FileService for MemoryFileService {
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FileError> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| FileError::NotFound(path.to_string()))
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), FileError> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Files below a root directory. Device paths are absolute (`/a/b`) and
/// may not climb out of the root.
#[derive(Debug, Clone)]
pub struct DirFileService {
    root: PathBuf,
}

impl DirFileService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FileError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !clean || relative.as_os_str().is_empty() {
            return Err(FileError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl FileService for DirFileService {
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FileError> {
        let full = self.resolve(path)?;
        std::fs::read(&full).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => FileError::NotFound(path.to_string()),
            _ => FileError::Io(err),
        })
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), FileError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, bytes)?;
        Ok(())
    }
}
