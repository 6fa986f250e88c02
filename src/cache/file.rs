//! File-backed cache store.
//!
//! Each entry is a JSON document at `<root>/<path segments>/<key>.json`
//! holding its expiry (seconds since the Unix epoch) and the stored vars.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::store::{CacheError, CacheStore};
use crate::context::Params;

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    expires_at: u64,
    vars: Params,
}

/// Cache store that persists entries as JSON files under a root directory.
///
/// Survives process restarts. Concurrent writers to the same entry race;
/// the last rename wins.
pub struct FileCacheStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, SystemClock)
    }

    pub fn with_clock(root: impl Into<PathBuf>, clock: impl Clock + 'static) -> Self {
        Self {
            root: root.into(),
            clock: Arc::new(clock),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Maps a storage path like `/yokel:widget/lists` onto a directory below the root.
    fn dir_for(&self, path: &str) -> Result<PathBuf, CacheError> {
        let mut dir = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(CacheError::InvalidPath {
                    path: path.to_owned(),
                });
            }
            dir.push(sanitize(segment));
        }
        Ok(dir)
    }

    fn file_for(&self, path: &str, key: &str) -> Result<PathBuf, CacheError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(CacheError::InvalidPath {
                path: format!("{path}/{key}"),
            });
        }
        Ok(self.dir_for(path)?.join(format!("{}.json", sanitize(key))))
    }

    fn now_secs(&self) -> u64 {
        epoch_secs(self.clock.now())
    }

    /// Deletes every expired entry file under the root and returns how many
    /// were removed.
    ///
    /// Lookups only remove the entry they read, so a long-running host should
    /// call this periodically. Files that are not readable cache entries are
    /// left alone.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let removed = purge_dir(&self.root, self.now_secs())?;
        debug!(root = %self.root.display(), removed, "purged expired cache files");
        Ok(removed)
    }
}

fn purge_dir(dir: &Path, now: u64) -> Result<usize, CacheError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            removed += purge_dir(&path, now)?;
        } else if path.extension().is_some_and(|ext| ext == "json") && is_expired(&path, now) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(removed)
}

fn is_expired(file: &Path, now: u64) -> bool {
    fs::read(file)
        .ok()
        .and_then(|raw| serde_json::from_slice::<FileEntry>(&raw).ok())
        .is_some_and(|entry| now >= entry.expires_at)
}

fn epoch_secs(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl CacheStore for FileCacheStore {
    fn get(&self, path: &str, key: &str) -> Result<Option<Params>, CacheError> {
        let file = self.file_for(path, key)?;
        let raw = match fs::read(&file) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: FileEntry = serde_json::from_slice(&raw)?;
        if self.now_secs() >= entry.expires_at {
            debug!(file = %file.display(), "expired cache file removed");
            // Another request may have removed it first.
            let _ = fs::remove_file(&file);
            return Ok(None);
        }

        Ok(Some(entry.vars))
    }

    fn put(&self, path: &str, key: &str, vars: &Params, ttl: Duration) -> Result<(), CacheError> {
        let file = self.file_for(path, key)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }

        let entry = FileEntry {
            expires_at: self.now_secs().saturating_add(ttl.as_secs()),
            vars: vars.clone(),
        };
        let encoded = serde_json::to_vec(&entry)?;

        // Each writer gets its own temp file in the same directory, so
        // concurrent writes of one key never share a path; the last rename wins.
        let dir = file.parent().unwrap_or(self.root.as_path());
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&file).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, path: &str, key: &str) -> Result<bool, CacheError> {
        match fs::remove_file(self.file_for(path, key)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self, path: &str) -> Result<(), CacheError> {
        let dir = self.dir_for(path)?;
        if dir == self.root {
            return Err(CacheError::InvalidPath {
                path: path.to_owned(),
            });
        }
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
