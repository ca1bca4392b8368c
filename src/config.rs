//! Configuration passed explicitly into [`crate::ClimateArchive`].

use crate::error::ClimateError;
use crate::types::bucket::BucketSpan;
use crate::types::granularity::Granularity;
use crate::utils::get_cache_dir;
use bon::Builder;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the bulk archive: one file per station and granularity.
///
/// `{granularity}` and `{station}` are substituted per file. Templates for
/// partitioned mirrors may also use `{bucket}` (e.g. `2023` or `2023-04`)
/// together with a matching [`BucketSpan`].
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://bulk.meteostat.net/v2/{granularity}/{station}.csv.gz";

/// How numeric values are encoded in the archive's CSV rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawEncoding {
    /// Values are stored in their canonical units.
    #[default]
    Native,
    /// Temperatures, precipitation, wind speeds and pressure are stored as
    /// integers in tenths of their canonical unit.
    Tenths,
}

/// Bounded exponential backoff for transient network failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    #[builder(default = 3)]
    pub max_attempts: u32,
    #[builder(default = Duration::from_millis(500))]
    pub initial_delay: Duration,
    #[builder(default = Duration::from_secs(5))]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::builder().build()
    }
}

/// Settings for the cache, the fetcher and request scheduling.
///
/// # Examples
///
/// ```
/// use meteostat_series::{ArchiveConfig, BucketSpan, Granularity};
/// use std::time::Duration;
///
/// let config = ArchiveConfig::builder()
///     .cache_dir("/tmp/meteostat-cache")
///     .ttl(Duration::from_secs(6 * 60 * 60))
///     .hourly_span(BucketSpan::Year)
///     .build();
///
/// assert_eq!(config.max_concurrency(), 4);
/// assert_eq!(config.bucket_span(Granularity::Hourly), BucketSpan::Year);
/// assert_eq!(config.bucket_span(Granularity::Daily), BucketSpan::Whole);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ArchiveConfig {
    /// Directory holding cached archive files. Created on demand.
    #[builder(into)]
    cache_dir: PathBuf,
    /// How long data of a still-open bucket is trusted.
    #[builder(default = Duration::from_secs(24 * 60 * 60))]
    ttl: Duration,
    /// Maximum number of (station, bucket) units loaded at the same time.
    #[builder(default = 4)]
    max_concurrency: usize,
    #[builder(default)]
    retry: RetryPolicy,
    /// Per-attempt HTTP timeout.
    #[builder(default = Duration::from_secs(60))]
    http_timeout: Duration,
    #[builder(into, default = DEFAULT_URL_TEMPLATE.to_string())]
    url_template: String,
    #[builder(default)]
    encoding: RawEncoding,
    /// Overrides the archive partitioning of hourly files. Must match the
    /// `{bucket}` segment of `url_template`.
    hourly_span: Option<BucketSpan>,
    /// Overrides the archive partitioning of daily files.
    daily_span: Option<BucketSpan>,
}

impl ArchiveConfig {
    /// Default settings caching into the platform cache directory
    /// (e.g. `~/.cache/meteostat_series_cache` on Linux).
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::CacheDirResolution`] if the platform has no
    /// cache directory.
    pub fn with_default_cache_dir() -> Result<Self, ClimateError> {
        Ok(Self::builder().cache_dir(get_cache_dir()?).build())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn encoding(&self) -> RawEncoding {
        self.encoding
    }

    pub fn bucket_span(&self, granularity: Granularity) -> BucketSpan {
        let configured = match granularity {
            Granularity::Hourly => self.hourly_span,
            Granularity::Daily => self.daily_span,
        };
        configured.unwrap_or_else(|| granularity.default_bucket_span())
    }
}
