//! The main entry point: turns a ranked station list and a time range into a
//! single merged series, going through the cache, the archive and the parser
//! for every (station, bucket) pair.

use crate::cache::store::CacheStore;
use crate::config::ArchiveConfig;
use crate::error::ClimateError;
use crate::fetch::error::FetchError;
use crate::fetch::fetcher::RemoteFetcher;
use crate::fetch::source::{BlobSource, HttpSource};
use crate::parse::parser::parse_blob;
use crate::reconcile::merger::merge;
use crate::types::blob::{BlobKey, CacheEntry, RawBlob};
use crate::types::bucket::TimeBucket;
use crate::types::granularity::Granularity;
use crate::types::merged::{BucketReport, BucketStatus, Coverage, FailureKind, MergedSeries, TimeGrid};
use crate::types::observation::ObservationSeries;
use crate::types::station::RankedStations;
use crate::utils::ensure_cache_dir_exists;
use bon::bon;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::{stream, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task;

/// Result of loading one (station, bucket) unit.
enum UnitOutcome {
    Loaded(ObservationSeries),
    NoData,
    Failed { kind: FailureKind, message: String },
}

/// Client for the bulk weather archive.
///
/// Holds the cache, the fetcher and the configuration. Use
/// [`ClimateArchive::new()`] for the default cache directory,
/// [`ClimateArchive::with_config()`] for full control, or
/// [`ClimateArchive::with_source()`] to read from something other than HTTP.
///
/// # Examples
///
/// ```no_run
/// # use meteostat_series::{ClimateArchive, ClimateError, Granularity, RankedStations, Station};
/// # use chrono::NaiveDate;
/// # async fn run() -> Result<(), ClimateError> {
/// let archive = ClimateArchive::new().await?;
/// let stations = RankedStations::new([
///     Station::new("10382", 52.56, 13.31),
///     Station::new("10384", 52.47, 13.40),
/// ]);
///
/// let series = archive
///     .fetch_range()
///     .stations(&stations)
///     .start(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
///     .end(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
///     .granularity(Granularity::Daily)
///     .call()
///     .await?;
///
/// println!("{}", series.to_dataframe().expect("valid frame"));
/// # Ok(())
/// # }
/// ```
pub struct ClimateArchive<S = HttpSource> {
    config: ArchiveConfig,
    cache: CacheStore,
    fetcher: RemoteFetcher<S>,
}

impl ClimateArchive<HttpSource> {
    /// Creates a client using the default cache directory
    /// (e.g. `~/.cache/meteostat_series_cache` on Linux).
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::CacheDirResolution`] if the system cache directory
    /// cannot be determined, [`ClimateError::CacheDirCreation`] if it cannot be
    /// created.
    pub async fn new() -> Result<Self, ClimateError> {
        Self::with_config(ArchiveConfig::with_default_cache_dir()?).await
    }

    /// Creates a client with default settings caching into `cache_folder`.
    pub async fn with_cache_folder(cache_folder: PathBuf) -> Result<Self, ClimateError> {
        Self::with_config(ArchiveConfig::builder().cache_dir(cache_folder).build()).await
    }

    /// Creates a client downloading from the configured URL template.
    pub async fn with_config(config: ArchiveConfig) -> Result<Self, ClimateError> {
        let source = HttpSource::new(config.url_template(), config.http_timeout())?;
        Self::with_source(config, source).await
    }
}

impl<S: BlobSource> ClimateArchive<S> {
    /// Creates a client reading archive files from `source`.
    ///
    /// Clients sharing a cache directory in one process never download the
    /// same file twice at the same time.
    pub async fn with_source(config: ArchiveConfig, source: S) -> Result<Self, ClimateError> {
        ensure_cache_dir_exists(config.cache_dir()).await?;
        Ok(Self {
            cache: CacheStore::new(config.cache_dir(), config.ttl()),
            fetcher: RemoteFetcher::new(source, config.retry()),
            config,
        })
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        self.fetcher.source()
    }

    /// Deletes cache entries that would be refetched on the next request.
    /// Returns the number of removed entries.
    pub async fn clear_stale_cache(&self) -> Result<usize, ClimateError> {
        Ok(self.cache.clear_stale(Utc::now()).await?)
    }
}

#[bon]
impl<S: BlobSource> ClimateArchive<S> {
    /// Fetches `[start, end)` at `granularity` from the ranked `stations` and
    /// merges them into one series.
    ///
    /// `start` is rounded up to the granularity's step. Every (station, bucket)
    /// pair is loaded cache-first, at most `max_concurrency` at a time. For
    /// each row and field the highest-ranked station with a value supplies it.
    ///
    /// Partial upstream trouble never fails the request: affected buckets
    /// show up in [`MergedSeries::coverage`] and their rows stay missing. When
    /// `timeout` elapses, outstanding downloads are abandoned and whatever
    /// finished is merged.
    ///
    /// # Errors
    ///
    /// * [`ClimateError::InvalidRange`] if `end` is before `start`.
    /// * [`ClimateError::SystemicFailure`] if every pair failed with a network
    ///   or format error. Stations without data are not failures.
    #[builder]
    pub async fn fetch_range(
        &self,
        stations: &RankedStations,
        start: NaiveDateTime,
        end: NaiveDateTime,
        granularity: Granularity,
        timeout: Option<Duration>,
        #[builder(default)] bypass_cache: bool,
    ) -> Result<MergedSeries, ClimateError> {
        if end < start {
            return Err(ClimateError::InvalidRange { start, end });
        }
        let grid = TimeGrid::new(start, end, granularity);
        let buckets = TimeBucket::covering(
            self.config.bucket_span(granularity),
            grid.start(),
            grid.end(),
        );
        let units: Vec<BlobKey> = stations
            .ids()
            .flat_map(|id| {
                buckets
                    .iter()
                    .map(move |bucket| BlobKey::new(id, granularity, *bucket))
            })
            .collect();
        info!(
            "Fetching {} data for {} stations over {} buckets ({} to {})",
            granularity,
            stations.len(),
            buckets.len(),
            grid.start(),
            grid.end()
        );

        let (mut outcomes, timed_out) = self
            .load_units(&units, Utc::now(), bypass_cache, timeout)
            .await;

        // Assemble in rank order, independent of completion order.
        let mut reports = Vec::with_capacity(units.len());
        let mut ranked_series = Vec::with_capacity(stations.len());
        let mut last_error = None;
        for station in stations.ids() {
            let mut series = ObservationSeries::empty(station, granularity);
            for bucket in &buckets {
                let key = BlobKey::new(station, granularity, *bucket);
                let status = match outcomes.remove(&key) {
                    Some(UnitOutcome::Loaded(bucket_series)) => {
                        series.extend(bucket_series);
                        BucketStatus::Loaded
                    }
                    Some(UnitOutcome::NoData) => BucketStatus::NoData,
                    Some(UnitOutcome::Failed { kind, message }) => {
                        last_error = Some(message.clone());
                        BucketStatus::Failed { kind, message }
                    }
                    None => BucketStatus::TimedOut,
                };
                reports.push(BucketReport {
                    station: station.to_string(),
                    bucket: *bucket,
                    status,
                });
            }

            series.truncate_to(grid.start(), grid.end());
            if series.is_empty() {
                debug!("Station {} has no {} data in range", station, granularity);
            } else {
                ranked_series.push(series);
            }
        }

        let coverage = Coverage { reports, timed_out };
        if coverage.is_systemic_failure() {
            return Err(ClimateError::SystemicFailure {
                attempted: units.len(),
                last_error: last_error.unwrap_or_default(),
            });
        }
        if !coverage.is_complete() {
            warn!(
                "Returning partial {} series: {} failed buckets, timed out: {}",
                granularity,
                coverage.failures().count(),
                coverage.timed_out
            );
        }

        Ok(merge(&ranked_series, &grid).with_coverage(coverage))
    }
}

impl<S: BlobSource> ClimateArchive<S> {
    /// Runs all units on a bounded pool. Returns the finished outcomes and
    /// whether the timeout cut the run short.
    async fn load_units(
        &self,
        units: &[BlobKey],
        now: DateTime<Utc>,
        bypass_cache: bool,
        timeout: Option<Duration>,
    ) -> (HashMap<BlobKey, UnitOutcome>, bool) {
        let mut pending = stream::iter(units)
            .map(|key| async move { (key.clone(), self.load_unit(key, now, bypass_cache).await) })
            .buffer_unordered(self.config.max_concurrency());
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);

        let mut outcomes = HashMap::with_capacity(units.len());
        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            "Request timed out with {} of {} buckets loaded",
                            outcomes.len(),
                            units.len()
                        );
                        return (outcomes, true);
                    }
                },
                None => pending.next().await,
            };
            match next {
                Some((key, outcome)) => {
                    outcomes.insert(key, outcome);
                }
                None => break,
            }
        }
        (outcomes, false)
    }

    /// Loads one key cache-first. Only blobs that parse are written back, so
    /// a bad download affects this request alone.
    async fn load_unit(&self, key: &BlobKey, now: DateTime<Utc>, bypass_cache: bool) -> UnitOutcome {
        let _guard = self.cache.lock(key).await;

        if !bypass_cache {
            match self.cache.get(key).await {
                Ok(Some(entry)) if !self.cache.is_stale(&entry, now) => {
                    debug!("Cache hit for {}", key);
                    match entry {
                        CacheEntry::Absent { .. } => return UnitOutcome::NoData,
                        CacheEntry::Present(blob) => match self.parse(blob).await {
                            Ok((_, series)) => return UnitOutcome::Loaded(series),
                            Err(message) => {
                                warn!("Evicting cached {} that does not parse: {}", key, message);
                                if let Err(e) = self.cache.remove(key).await {
                                    warn!("Failed to evict {}: {}", key, e);
                                }
                            }
                        },
                    }
                }
                Ok(Some(_)) => info!("Cache entry for {} is stale, refetching", key),
                Ok(None) => debug!("Cache miss for {}", key),
                Err(e) => warn!("Ignoring unreadable cache entry for {}: {}", key, e),
            }
        }

        let blob = match self.fetcher.fetch(key).await {
            Ok(blob) => blob,
            Err(FetchError::NotFound { url }) => {
                debug!("No archive file for {} at {}", key, url);
                self.store(CacheEntry::Absent {
                    key: key.clone(),
                    retrieved_at: Utc::now(),
                })
                .await;
                return UnitOutcome::NoData;
            }
            Err(e) => {
                let message = e.describe();
                warn!("Giving up on {}: {}", key, message);
                let kind = if e.is_transient() {
                    FailureKind::Network
                } else {
                    FailureKind::Format
                };
                return UnitOutcome::Failed { kind, message };
            }
        };

        match self.parse(blob).await {
            Ok((blob, series)) => {
                self.store(CacheEntry::Present(blob)).await;
                UnitOutcome::Loaded(series)
            }
            Err(message) => {
                warn!("Discarding malformed archive file {}: {}", key, message);
                UnitOutcome::Failed {
                    kind: FailureKind::Format,
                    message,
                }
            }
        }
    }

    /// Parses on the blocking pool and hands the blob back for caching.
    async fn parse(&self, blob: RawBlob) -> Result<(RawBlob, ObservationSeries), String> {
        let encoding = self.config.encoding();
        let key = blob.key.clone();
        task::spawn_blocking(move || {
            parse_blob(&blob, encoding)
                .map(|series| (blob, series))
                .map_err(|e| e.to_string())
        })
        .await
        .unwrap_or_else(|e| Err(format!("Parser task failed for {key}: {e}")))
    }

    async fn store(&self, entry: CacheEntry) {
        if let Err(e) = self.cache.put(&entry).await {
            warn!("Failed to cache {}, continuing without: {}", entry.key(), e);
        }
    }
}
