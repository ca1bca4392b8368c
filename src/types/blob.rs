//! Raw archive payloads and the keys that address them.

use crate::types::bucket::TimeBucket;
use crate::types::granularity::Granularity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one archive file: a station's data of one granularity in one bucket.
///
/// This is the only thing cache entries are keyed on, so overlapping requests
/// share entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobKey {
    pub station: String,
    pub granularity: Granularity,
    pub bucket: TimeBucket,
}

impl BlobKey {
    pub fn new(station: impl Into<String>, granularity: Granularity, bucket: TimeBucket) -> Self {
        Self {
            station: station.into(),
            granularity,
            bucket,
        }
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.granularity, self.bucket, self.station)
    }
}

/// Decompressed archive bytes plus where and when they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlob {
    pub key: BlobKey,
    pub retrieved_at: DateTime<Utc>,
    /// Hex-encoded blake3 hash of `bytes`.
    pub content_hash: String,
    pub bytes: Vec<u8>,
}

impl RawBlob {
    pub fn new(key: BlobKey, bytes: Vec<u8>, retrieved_at: DateTime<Utc>) -> Self {
        let content_hash = blake3::hash(&bytes).to_hex().to_string();
        Self {
            key,
            retrieved_at,
            content_hash,
            bytes,
        }
    }

    /// Whether `bytes` still match the recorded hash.
    pub fn is_intact(&self) -> bool {
        blake3::hash(&self.bytes).to_hex().as_str() == self.content_hash
    }
}

/// What the cache remembers about a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheEntry {
    /// The archive returned data.
    Present(RawBlob),
    /// The archive reported that it has no file for this key.
    Absent {
        key: BlobKey,
        retrieved_at: DateTime<Utc>,
    },
}

impl CacheEntry {
    pub fn key(&self) -> &BlobKey {
        match self {
            CacheEntry::Present(blob) => &blob.key,
            CacheEntry::Absent { key, .. } => key,
        }
    }

    pub fn retrieved_at(&self) -> DateTime<Utc> {
        match self {
            CacheEntry::Present(blob) => blob.retrieved_at,
            CacheEntry::Absent { retrieved_at, .. } => *retrieved_at,
        }
    }
}
