//! Shared fixtures for unit tests: an in-memory archive and CSV builders.

use crate::fetch::error::FetchError;
use crate::fetch::source::BlobSource;
use crate::types::blob::BlobKey;
use crate::types::bucket::{BucketSpan, TimeBucket};
use crate::types::granularity::Granularity;
use chrono::{Duration as ChronoDuration, NaiveDate};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Data(Vec<u8>),
    /// Answers with data after sleeping.
    Slow(Duration, Vec<u8>),
    NetworkError,
    NotFound,
    Garbage,
}

impl Reply {
    pub(crate) fn data(csv: impl Into<String>) -> Self {
        Reply::Data(csv.into().into_bytes())
    }
}

/// Scripted [`BlobSource`]. Each key answers with its queued replies in
/// order; the last reply repeats. Keys without a script are not found.
#[derive(Debug, Default)]
pub(crate) struct FakeArchive {
    scripts: Mutex<HashMap<BlobKey, VecDeque<Reply>>>,
    calls: Mutex<HashMap<BlobKey, usize>>,
}

impl FakeArchive {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(&self, key: &BlobKey, replies: impl IntoIterator<Item = Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(key.clone(), replies.into_iter().collect());
    }

    pub(crate) fn calls(&self, key: &BlobKey) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn next_reply(&self, key: &BlobKey) -> Option<Reply> {
        *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl BlobSource for FakeArchive {
    async fn fetch(&self, key: &BlobKey) -> Result<Vec<u8>, FetchError> {
        let reply = self.next_reply(key);
        match reply {
            None | Some(Reply::NotFound) => Err(FetchError::NotFound {
                url: key.to_string(),
            }),
            Some(Reply::Data(bytes)) => Ok(bytes),
            Some(Reply::Slow(delay, bytes)) => {
                tokio::time::sleep(delay).await;
                Ok(bytes)
            }
            Some(Reply::NetworkError) => Err(FetchError::network(
                key.to_string(),
                io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"),
            )),
            Some(Reply::Garbage) => Err(FetchError::UpstreamFormat {
                url: key.to_string(),
                reason: "not gzip".to_string(),
            }),
        }
    }
}

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub(crate) fn daily_key(station: &str, year: i32) -> BlobKey {
    BlobKey::new(
        station,
        Granularity::Daily,
        TimeBucket::containing(BucketSpan::Year, date(year, 1, 1).and_hms_opt(0, 0, 0).unwrap()),
    )
}

/// Key of a station's unpartitioned archive file.
pub(crate) fn whole_key(station: &str, granularity: Granularity) -> BlobKey {
    BlobKey::new(
        station,
        granularity,
        TimeBucket::containing(BucketSpan::Whole, date(2000, 1, 1).and_hms_opt(0, 0, 0).unwrap()),
    )
}

fn field(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One daily CSV row with only `tavg` and `prcp` set.
pub(crate) fn daily_row(day: NaiveDate, tavg: Option<f64>, prcp: Option<f64>) -> String {
    format!(
        "{},{},,,{},,,,,,",
        day.format("%Y-%m-%d"),
        field(tavg),
        field(prcp)
    )
}

/// Daily rows for the first `days` days of `year`, `tavg` given per day index.
pub(crate) fn daily_csv(year: i32, days: usize, tavg: impl Fn(usize) -> f64) -> String {
    let first = date(year, 1, 1);
    (0..days)
        .map(|i| {
            let day = first + ChronoDuration::days(i as i64);
            daily_row(day, Some(tavg(i)), None) + "\n"
        })
        .collect()
}
