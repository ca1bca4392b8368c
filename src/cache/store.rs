use crate::cache::error::CacheError;
use crate::types::blob::{BlobKey, CacheEntry};
use crate::utils::sanitize_file_stem;
use bincode::config::{Configuration, Fixint, LittleEndian};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task;

const ENTRY_EXTENSION: &str = "bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Writer locks per cache file, shared by every store in the process.
static ENTRY_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// On-disk store of archive blobs, one file per [`BlobKey`].
///
/// Layout: `{root}/{granularity}/{bucket}/{station}.bin`. Files are replaced
/// atomically, so readers in this or another process never see a partial
/// entry. [`CacheStore::lock`] serializes writers of one file across all
/// stores of the process.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(root: &Path, ttl: Duration) -> Self {
        // Canonical roots make lock keys agree between spellings of one directory.
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        Self { root, ttl }
    }

    /// Waits for exclusive use of `key`'s cache file.
    ///
    /// Held across lookup, download and write, so a second loader of the same
    /// key finds the fresh entry instead of downloading again.
    pub async fn lock(&self, key: &BlobKey) -> OwnedMutexGuard<()> {
        let path = self.path_for(key);
        let lock = {
            let mut locks = ENTRY_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
            // Locks nobody else holds a handle to are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(path).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn path_for(&self, key: &BlobKey) -> PathBuf {
        self.root
            .join(key.granularity.path_segment())
            .join(key.bucket.path_segment())
            .join(format!(
                "{}.{}",
                sanitize_file_stem(&key.station),
                ENTRY_EXTENSION
            ))
    }

    /// Looks up the entry for `key`. A missing file is `Ok(None)`.
    pub async fn get(&self, key: &BlobKey) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Read(path, e)),
        };

        let entry = decode_entry(&path, &bytes)?;
        if entry.key() != key {
            // Two ids that sanitize to the same file name.
            debug!("Cache file {:?} belongs to {}, not {}", path, entry.key(), key);
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Writes `entry`, replacing any previous entry for the same key.
    pub async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let path = self.path_for(entry.key());
        let data = bincode::serde::encode_to_vec(entry, BINCODE_CONFIG)
            .map_err(|e| CacheError::Encode(Box::new(e)))?;
        let size = data.len();

        let target = path.clone();
        task::spawn_blocking(move || write_atomic(&target, &data)).await??;
        debug!("Cached {} ({} bytes) at {:?}", entry.key(), size, path);
        Ok(())
    }

    /// Removes the entry for `key`. Returns whether there was one.
    pub async fn remove(&self, key: &BlobKey) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Delete(path, e)),
        }
    }

    /// Whether `entry` must be refetched at `now`.
    ///
    /// Data retrieved after its bucket closed is final and never expires.
    /// Data retrieved while the bucket was still open, and every "no data"
    /// entry, expires once it is older than the TTL.
    pub fn is_stale(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let retrieved_at = entry.retrieved_at();
        let is_final = matches!(entry, CacheEntry::Present(_))
            && entry.key().bucket.is_closed_at(retrieved_at.naive_utc());
        if is_final {
            return false;
        }
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now.signed_duration_since(retrieved_at) >= ttl,
            Err(_) => false,
        }
    }

    /// Deletes stale and unreadable entries. Returns how many files were removed.
    pub async fn clear_stale(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let store = self.clone();
        task::spawn_blocking(move || store.clear_stale_blocking(now)).await?
    }

    fn clear_stale_blocking(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        if !self.root.exists() {
            return Ok(0);
        }
        let files = entry_files(&self.root).map_err(|e| CacheError::Read(self.root.clone(), e))?;

        let mut removed = 0;
        for path in files {
            let bytes = std::fs::read(&path).map_err(|e| CacheError::Read(path.clone(), e))?;
            let remove = match decode_entry(&path, &bytes) {
                Ok(entry) => self.is_stale(&entry, now),
                Err(e) => {
                    warn!("Removing unreadable cache file {:?}: {}", path, e);
                    true
                }
            };
            if remove {
                std::fs::remove_file(&path).map_err(|e| CacheError::Delete(path.clone(), e))?;
                removed += 1;
            }
        }
        info!("Removed {} stale cache entries from {:?}", removed, self.root);
        Ok(removed)
    }
}

fn decode_entry(path: &Path, bytes: &[u8]) -> Result<CacheEntry, CacheError> {
    let (entry, _) = bincode::serde::decode_from_slice::<CacheEntry, _>(bytes, BINCODE_CONFIG)
        .map_err(|e| CacheError::Decode(path.to_path_buf(), Box::new(e)))?;
    if let CacheEntry::Present(blob) = &entry {
        if !blob.is_intact() {
            return Err(CacheError::Corrupt(path.to_path_buf()));
        }
    }
    Ok(entry)
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let dir = path
        .parent()
        .ok_or_else(|| CacheError::Write(path.to_path_buf(), io::ErrorKind::InvalidInput.into()))?;
    std::fs::create_dir_all(dir).map_err(|e| CacheError::DirCreation(dir.to_path_buf(), e))?;

    let mut temp_file =
        NamedTempFile::new_in(dir).map_err(|e| CacheError::Write(path.to_path_buf(), e))?;
    temp_file
        .write_all(data)
        .map_err(|e| CacheError::Write(path.to_path_buf(), e))?;
    temp_file
        .flush()
        .map_err(|e| CacheError::Write(path.to_path_buf(), e))?;
    temp_file
        .persist(path)
        .map_err(|e| CacheError::Write(path.to_path_buf(), e.error))?;
    Ok(())
}

fn entry_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(entry_files(&path)?);
        } else if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
            files.push(path);
        }
    }
    Ok(files)
}
