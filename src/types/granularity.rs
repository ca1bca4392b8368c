//! Defines the time granularity of archive data and the parameters each
//! granularity carries.

use crate::types::bucket::BucketSpan;
use crate::types::parameter::Parameter;
use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

const HOURLY_PARAMETERS: [Parameter; 11] = [
    Parameter::Temperature,
    Parameter::DewPoint,
    Parameter::RelativeHumidity,
    Parameter::Precipitation,
    Parameter::SnowDepth,
    Parameter::WindDirection,
    Parameter::WindSpeed,
    Parameter::PeakGust,
    Parameter::Pressure,
    Parameter::Sunshine,
    Parameter::Condition,
];

const DAILY_PARAMETERS: [Parameter; 10] = [
    Parameter::TemperatureAvg,
    Parameter::TemperatureMin,
    Parameter::TemperatureMax,
    Parameter::Precipitation,
    Parameter::SnowDepth,
    Parameter::WindDirection,
    Parameter::WindSpeed,
    Parameter::PeakGust,
    Parameter::Pressure,
    Parameter::Sunshine,
];

/// The output time step of a series.
///
/// The granularity decides which parameters a row carries, how timestamps are
/// aligned and which directory of the bulk archive is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    /// One row per hour, timestamps at the top of the hour.
    Hourly,
    /// One row per day, timestamps at midnight UTC.
    Daily,
}

impl Granularity {
    pub(crate) fn path_segment(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
        }
    }

    /// The fixed, ordered list of parameters in every row of this granularity.
    pub fn parameters(&self) -> &'static [Parameter] {
        match self {
            Granularity::Hourly => &HOURLY_PARAMETERS,
            Granularity::Daily => &DAILY_PARAMETERS,
        }
    }

    /// Position of `parameter` within [`Granularity::parameters`], if it is part of it.
    pub fn parameter_index(&self, parameter: Parameter) -> Option<usize> {
        self.parameters().iter().position(|p| *p == parameter)
    }

    /// Distance between two consecutive rows.
    pub fn step(&self) -> Duration {
        match self {
            Granularity::Hourly => Duration::hours(1),
            Granularity::Daily => Duration::days(1),
        }
    }

    /// How the upstream archive partitions files of this granularity unless
    /// configured otherwise. The bulk archive serves one file per station
    /// holding its whole record.
    pub fn default_bucket_span(&self) -> BucketSpan {
        match self {
            Granularity::Hourly | Granularity::Daily => BucketSpan::Whole,
        }
    }

    /// Whether `time` sits exactly on a step boundary.
    pub fn is_aligned(&self, time: NaiveDateTime) -> bool {
        self.truncate(time) == time
    }

    /// Rounds `time` up to the next step boundary (or keeps it if already aligned).
    pub fn align_up(&self, time: NaiveDateTime) -> NaiveDateTime {
        let floor = self.truncate(time);
        if floor == time {
            time
        } else {
            floor + self.step()
        }
    }

    fn truncate(&self, time: NaiveDateTime) -> NaiveDateTime {
        match self {
            Granularity::Hourly => time
                .date()
                .and_time(NaiveTime::from_hms_opt(time.hour(), 0, 0).unwrap_or(NaiveTime::MIN)),
            Granularity::Daily => time.date().and_time(NaiveTime::MIN),
        }
    }
}

/// Formats a `Granularity` using its archive path segment.
///
/// # Examples
///
/// ```
/// use meteostat_series::Granularity;
///
/// assert_eq!(Granularity::Hourly.to_string(), "hourly");
/// assert_eq!(format!("{}", Granularity::Daily), "daily");
/// ```
impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_segment())
    }
}
