//! Cache storage trait and the in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use thiserror::Error;

use super::clock::{Clock, SystemClock};
use crate::context::Params;

/// Errors produced by cache storage backends.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid cache path: {path}")]
    InvalidPath { path: String },

    #[error("cache store lock poisoned")]
    Poisoned,
}

/// A key/value store for action results, namespaced by `(path, key)`.
///
/// Entries written with a ttl must stop being returned once that ttl has
/// elapsed. Implementations decide how they persist; the gateway treats every
/// error as a miss.
pub trait CacheStore: Send + Sync {
    /// Returns the live entry stored under `(path, key)`, if any.
    fn get(&self, path: &str, key: &str) -> Result<Option<Params>, CacheError>;

    /// Stores `vars` under `(path, key)`, replacing any previous entry.
    fn put(&self, path: &str, key: &str, vars: &Params, ttl: Duration) -> Result<(), CacheError>;

    /// Removes the entry under `(path, key)`. Returns `true` if one existed.
    fn remove(&self, path: &str, key: &str) -> Result<bool, CacheError>;

    /// Drops every entry under `path`.
    fn clear(&self, path: &str) -> Result<(), CacheError>;
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn get(&self, path: &str, key: &str) -> Result<Option<Params>, CacheError> {
        (**self).get(path, key)
    }

    fn put(&self, path: &str, key: &str, vars: &Params, ttl: Duration) -> Result<(), CacheError> {
        (**self).put(path, key, vars, ttl)
    }

    fn remove(&self, path: &str, key: &str) -> Result<bool, CacheError> {
        (**self).remove(path, key)
    }

    fn clear(&self, path: &str) -> Result<(), CacheError> {
        (**self).clear(path)
    }
}

struct CacheEntry {
    vars: Params,
    /// `None` when `now + ttl` is past what `SystemTime` can represent.
    expires_at: Option<SystemTime>,
}

impl CacheEntry {
    fn is_live(&self, now: SystemTime) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Process-local cache store with per-entry TTL expiration.
///
/// An expired entry is dropped when it is looked up, and every write first
/// sweeps all expired entries, so keys that are never requested again do not
/// pile up.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rcomp::cache::{CacheStore, MemoryCacheStore};
/// use rcomp::context::Params;
///
/// let store = MemoryCacheStore::new();
/// let mut vars = Params::new();
/// vars.insert("count".into(), 1.into());
/// store.put("/yokel:widget", "k", &vars, Duration::from_secs(60)).unwrap();
/// assert_eq!(store.get("/yokel:widget", "k").unwrap(), Some(vars));
/// ```
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<(String, String), CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock: Arc::new(clock),
        }
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(sweep(&mut entries, self.clock.now()))
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sweep(entries: &mut HashMap<(String, String), CacheEntry>, now: SystemTime) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.is_live(now));
    before - entries.len()
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, path: &str, key: &str) -> Result<Option<Params>, CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let id = (path.to_owned(), key.to_owned());

        match entries.get(&id) {
            Some(entry) if entry.is_live(self.clock.now()) => Ok(Some(entry.vars.clone())),
            Some(_) => {
                entries.remove(&id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, path: &str, key: &str, vars: &Params, ttl: Duration) -> Result<(), CacheError> {
        let now = self.clock.now();
        let entry = CacheEntry {
            vars: vars.clone(),
            expires_at: now.checked_add(ttl),
        };
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        sweep(&mut entries, now);
        entries.insert((path.to_owned(), key.to_owned()), entry);
        Ok(())
    }

    fn remove(&self, path: &str, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(entries
            .remove(&(path.to_owned(), key.to_owned()))
            .is_some())
    }

    fn clear(&self, path: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.retain(|(p, _), _| p != path);
        Ok(())
    }
}
