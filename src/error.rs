use crate::cache::error::CacheError;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClimateError {
    /// Every (station, bucket) unit failed with a network or format error.
    #[error("All {attempted} station/bucket downloads failed; last error: {last_error}")]
    SystemicFailure { attempted: usize, last_error: String },

    #[error("Requested range ends ({end}) before it starts ({start})")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Failed to determine cache directory")]
    CacheDirResolution,

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to build HTTP client")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
