//! Time buckets: the calendar partitions the bulk archive stores files by.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of one archive partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BucketSpan {
    /// One calendar month.
    Month,
    /// One calendar year.
    Year,
    /// A station's whole record in one file.
    Whole,
}

/// A half-open `[start, end)` calendar interval aligned to a [`BucketSpan`].
///
/// Buckets order chronologically. For year buckets `month` is always 1. A
/// [`BucketSpan::Whole`] bucket spans all representable time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeBucket {
    year: i32,
    month: u32,
    span: BucketSpan,
}

impl TimeBucket {
    /// The bucket of the given span that contains `time`.
    pub fn containing(span: BucketSpan, time: NaiveDateTime) -> Self {
        let (year, month) = match span {
            BucketSpan::Month => (time.year(), time.month()),
            BucketSpan::Year => (time.year(), 1),
            BucketSpan::Whole => (0, 1),
        };
        Self { year, month, span }
    }

    /// The minimal chronological sequence of buckets covering `[start, end)`.
    ///
    /// Returns an empty vector when the range is empty.
    pub fn covering(span: BucketSpan, start: NaiveDateTime, end: NaiveDateTime) -> Vec<Self> {
        let mut buckets = Vec::new();
        if start >= end {
            return buckets;
        }
        let mut bucket = Self::containing(span, start);
        while bucket.start() < end {
            buckets.push(bucket);
            if span == BucketSpan::Whole {
                break;
            }
            bucket = bucket.next();
        }
        buckets
    }

    pub fn span(&self) -> BucketSpan {
        self.span
    }

    /// Calendar year of the bucket; 0 for a whole-record bucket.
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn start(&self) -> NaiveDateTime {
        match self.span {
            BucketSpan::Whole => NaiveDateTime::MIN,
            _ => NaiveDate::from_ymd_opt(self.year, self.month, 1)
                .unwrap_or(NaiveDate::MAX)
                .and_time(NaiveTime::MIN),
        }
    }

    pub fn end(&self) -> NaiveDateTime {
        match self.span {
            BucketSpan::Whole => NaiveDateTime::MAX,
            _ => self.next().start(),
        }
    }

    /// The following bucket. A whole-record bucket has no successor and
    /// returns itself.
    pub fn next(&self) -> Self {
        match self.span {
            BucketSpan::Whole => *self,
            BucketSpan::Year => Self {
                year: self.year + 1,
                ..*self
            },
            BucketSpan::Month if self.month == 12 => Self {
                year: self.year + 1,
                month: 1,
                span: self.span,
            },
            BucketSpan::Month => Self {
                month: self.month + 1,
                ..*self
            },
        }
    }

    pub fn contains(&self, time: NaiveDateTime) -> bool {
        self.start() <= time && time < self.end()
    }

    /// A bucket is closed once its end lies in the past; its data can no longer change.
    pub fn is_closed_at(&self, now: NaiveDateTime) -> bool {
        self.end() <= now
    }

    /// Identity used in archive URLs and cache paths, e.g. `2023`, `2023-04` or `all`.
    pub(crate) fn path_segment(&self) -> String {
        match self.span {
            BucketSpan::Year => format!("{}", self.year),
            BucketSpan::Month => format!("{}-{:02}", self.year, self.month),
            BucketSpan::Whole => "all".to_string(),
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_segment())
    }
}
