//! Shared key-value store backing the zone registry.
//!
//! Keys are hierarchical paths (`/zonectl/nodes/10.0.0.5`). The registry
//! only needs three primitives: read one key, list the direct children of a
//! directory, and overwrite one key. There are no transactions; every key is
//! expected to be linearizable on its own.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Default bound for a single store round-trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

const LOCK_SUFFIX: &str = ".lock";
const TMP_SUFFIX: &str = ".tmp";
const LOCK_POLL: Duration = Duration::from_millis(10);

/// Errors surfaced by store backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transient failure; callers may retry with backoff.
    #[error("Store unavailable for key {key}: {reason}")]
    Unavailable { key: String, reason: String },

    #[error("Invalid store key '{0}'")]
    InvalidKey(String),
}

impl StoreError {
    fn unavailable(key: &str, reason: impl ToString) -> Self {
        StoreError::Unavailable {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

/// Minimal etcd-v2 style key-value API.
pub trait KvStore {
    /// Read a single key. Missing keys are `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// List the direct children of `dir` as `(full key, value)` pairs, in the
    /// store's enumeration order.
    fn list(&self, dir: &str) -> Result<Vec<(String, String)>, StoreError>;

    /// Create or overwrite a key.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<T: KvStore + ?Sized> KvStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn list(&self, dir: &str) -> Result<Vec<(String, String)>, StoreError> {
        (**self).list(dir)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

/// Join a directory key and a child segment.
pub fn join_key(dir: &str, child: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), child)
}

/// Split a key into validated path segments.
fn key_segments(key: &str) -> Result<Vec<&str>, StoreError> {
    if !key.starts_with('/') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    let segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty()
        || segments
            .iter()
            .any(|s| *s == "." || *s == ".." || s.ends_with(LOCK_SUFFIX) || s.ends_with(TMP_SUFFIX))
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(segments)
}

/// In-process store, enumerated in ascending key order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self, key: &str) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::unavailable(key, "store lock poisoned"))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        key_segments(key)?;
        Ok(self.entries(key)?.get(key).cloned())
    }

    fn list(&self, dir: &str) -> Result<Vec<(String, String)>, StoreError> {
        key_segments(dir)?;
        let prefix = join_key(dir, "");
        let entries = self.entries(dir)?;
        Ok(entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('/'))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        key_segments(key)?;
        self.entries(key)?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed store: one file per key.
///
/// Writes go through a temporary file and a rename so readers never see a
/// partial value. Concurrent writers of the same key serialize on a lock
/// file; acquiring it is bounded by the store timeout. A lock older than the
/// timeout was left by a writer that died and is removed. Children are
/// enumerated in ascending file-name order.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    timeout: Duration,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        FileStore {
            root: root.into(),
            timeout,
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.root.clone();
        for segment in key_segments(key)? {
            path.push(segment);
        }
        Ok(path)
    }

    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(suffix);
        path.with_file_name(name)
    }

    fn acquire_lock(&self, key: &str, lock: &Path) -> Result<(), StoreError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(lock) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if self.reap_stale_lock(key, lock)? {
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(StoreError::unavailable(
                            key,
                            format!("timed out after {:?} waiting for {}", self.timeout, lock.display()),
                        ));
                    }
                    thread::sleep(LOCK_POLL);
                }
                Err(e) => return Err(StoreError::unavailable(key, e)),
            }
        }
    }

    /// Remove `lock` if it is older than the timeout. A lock stamped in the
    /// future is never considered stale.
    fn reap_stale_lock(&self, key: &str, lock: &Path) -> Result<bool, StoreError> {
        let modified = match fs::metadata(lock).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            // Released between our create attempt and now.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(StoreError::unavailable(key, e)),
        };
        let age = match modified.elapsed() {
            Ok(age) => age,
            Err(_) => return Ok(false),
        };
        if age < self.timeout {
            return Ok(false);
        }

        warn!("Removing stale lock {} (held for {:?})", lock.display(), age);
        match fs::remove_file(lock) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(StoreError::unavailable(key, e)),
        }
    }

    fn write_locked(&self, key: &str, path: &Path, value: &str) -> Result<(), StoreError> {
        let tmp = Self::sibling(path, TMP_SUFFIX);
        let mut file = fs::File::create(&tmp).map_err(|e| StoreError::unavailable(key, e))?;
        file.write_all(value.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::unavailable(key, e))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::unavailable(key, e))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::unavailable(key, e)),
        }
    }

    fn list(&self, dir: &str) -> Result<Vec<(String, String)>, StoreError> {
        let path = self.path_for(dir)?;
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::unavailable(dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::unavailable(dir, e))?;
            let file_type = entry.file_type().map_err(|e| StoreError::unavailable(dir, e))?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(LOCK_SUFFIX) || name.ends_with(TMP_SUFFIX) {
                continue;
            }
            names.push(name);
        }
        names.sort();

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let key = join_key(dir, &name);
            // A key can only disappear through out-of-band deletion.
            if let Some(value) = self.get(&key)? {
                out.push((key, value));
            }
        }
        Ok(out)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::unavailable(key, e))?;
        }

        let lock = Self::sibling(&path, LOCK_SUFFIX);
        self.acquire_lock(key, &lock)?;
        let result = self.write_locked(key, &path, value);
        if let Err(e) = fs::remove_file(&lock) {
            debug!("Failed to remove lock {}: {}", lock.display(), e);
        }
        result?;

        debug!("Stored {} ({} bytes)", key, value.len());
        Ok(())
    }
}
