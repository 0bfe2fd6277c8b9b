//! Read-through image cache keyed by file path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use crate::{FirmwareError, Result};

/// File identity used to detect changes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FirmwareError::NotFound {
                path: path.to_path_buf(),
            },
            _ => FirmwareError::Io(e),
        })?;
        Ok(FileStamp {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

#[derive(Debug)]
struct CacheEntry<T> {
    stamp: FileStamp,
    value: Arc<T>,
}

/// Caches one decoded value per path, reloading when the file's modification
/// time or length changes.
///
/// Shared across threads. Two threads missing on the same path at once may
/// both load it; the later insert wins.
#[derive(Debug)]
pub struct FileCache<T> {
    entries: RwLock<HashMap<PathBuf, CacheEntry<T>>>,
}

impl<T> Default for FileCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FileCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        FileCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached value for `path`, or load and cache it.
    ///
    /// The second element is `true` when the value came from the cache.
    pub fn get_or_load<F>(&self, path: &Path, load: F) -> Result<(Arc<T>, bool)>
    where
        F: FnOnce(&Path) -> Result<T>,
    {
        let stamp = FileStamp::of(path)?;

        {
            let entries = self
                .entries
                .read()
                .map_err(|_| FirmwareError::CacheLockPoisoned)?;
            if let Some(entry) = entries.get(path) {
                if entry.stamp == stamp {
                    return Ok((Arc::clone(&entry.value), true));
                }
            }
        }

        // Load outside the lock.
        let value = Arc::new(load(path)?);

        let mut entries = self
            .entries
            .write()
            .map_err(|_| FirmwareError::CacheLockPoisoned)?;
        entries.insert(
            path.to_path_buf(),
            CacheEntry {
                stamp,
                value: Arc::clone(&value),
            },
        );
        Ok((value, false))
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}
