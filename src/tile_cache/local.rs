//! # Local Filesystem Backend

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use super::backend::CacheBackend;
use super::errors::{CacheError, CacheResult};

/// Cache files under a local directory
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
    /// Distinguishes temp files written concurrently by this process
    sequence: AtomicU64,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> CacheResult<PathBuf> {
        let relative = Path::new(path);
        let valid = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(CacheError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &str, e: io::Error) -> CacheError {
    if e.kind() == io::ErrorKind::NotFound {
        CacheError::EntryNotFound(path.to_string())
    } else {
        CacheError::IoError(format!("{}: {}", path, e))
    }
}

fn dir_size(dir: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

impl CacheBackend for LocalBackend {
    fn write(&self, path: &str, data: &[u8]) -> CacheResult<()> {
        let full_path = self.full_path(path)?;
        let parent = full_path
            .parent()
            .ok_or_else(|| CacheError::InvalidPath(path.to_string()))?;

        fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let file_name = full_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CacheError::InvalidPath(path.to_string()))?;
        let temp = parent.join(format!(".{}.{}.{}.tmp", file_name, std::process::id(), seq));

        let result = fs::File::create(&temp)
            .and_then(|mut file| {
                file.write_all(data)?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&temp, &full_path));

        if let Err(e) = result {
            let _ = fs::remove_file(&temp);
            return Err(io_error(path, e));
        }
        Ok(())
    }

    fn read(&self, path: &str) -> CacheResult<Vec<u8>> {
        let full_path = self.full_path(path)?;
        fs::read(&full_path).map_err(|e| io_error(path, e))
    }

    fn delete(&self, path: &str) -> CacheResult<()> {
        let full_path = self.full_path(path)?;
        fs::remove_file(&full_path).map_err(|e| io_error(path, e))
    }

    fn exists(&self, path: &str) -> CacheResult<bool> {
        Ok(self.full_path(path)?.is_file())
    }

    fn list(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let full_path = self.full_path(prefix)?;
        let mut results = Vec::new();

        if full_path.is_dir() {
            for entry in fs::read_dir(&full_path).map_err(|e| io_error(prefix, e))? {
                let entry = entry.map_err(|e| io_error(prefix, e))?;
                if let Some(name) = entry.file_name().to_str() {
                    results.push(name.to_string());
                }
            }
        }

        results.sort();
        Ok(results)
    }

    fn delete_prefix(&self, prefix: &str) -> CacheResult<()> {
        let full_path = self.full_path(prefix)?;
        match fs::remove_dir_all(&full_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(prefix, e)),
        }
    }

    fn size(&self, prefix: &str) -> CacheResult<u64> {
        let full_path = self.full_path(prefix)?;
        if !full_path.is_dir() {
            return Ok(0);
        }
        dir_size(&full_path).map_err(|e| io_error(prefix, e))
    }

    fn modified(&self, path: &str) -> CacheResult<SystemTime> {
        let full_path = self.full_path(path)?;
        fs::metadata(&full_path)
            .and_then(|m| m.modified())
            .map_err(|e| io_error(path, e))
    }
}
