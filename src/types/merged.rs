//! The reconciled output series, its provenance and coverage metadata.

use crate::types::bucket::TimeBucket;
use crate::types::granularity::Granularity;
use crate::types::observation::ObservationRecord;
use crate::types::parameter::Parameter;
use chrono::NaiveDateTime;
use polars::prelude::{Column, DataFrame, PolarsResult};

/// The timestamps a request covers: every step boundary in `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGrid {
    start: NaiveDateTime,
    end: NaiveDateTime,
    granularity: Granularity,
}

impl TimeGrid {
    /// `start` is rounded up to the granularity's step; `end` is exclusive.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, granularity: Granularity) -> Self {
        Self {
            start: granularity.align_up(start),
            end,
            granularity,
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDateTime> {
        let step = self.granularity.step();
        let end = self.end;
        std::iter::successors(Some(self.start), move |t| Some(*t + step))
            .take_while(move |t| *t < end)
    }
}

/// Why a (station, bucket) unit failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection problems that persisted through all retries.
    Network,
    /// The archive answered with something that could not be decoded.
    Format,
}

/// Outcome of loading one (station, bucket) unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketStatus {
    /// Data was available, from the cache or the archive.
    Loaded,
    /// The archive has no data for this station in this bucket.
    NoData,
    Failed { kind: FailureKind, message: String },
    /// The request timeout fired before this unit finished.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketReport {
    pub station: String,
    pub bucket: TimeBucket,
    pub status: BucketStatus,
}

/// Per-unit outcomes of a request, ordered by station rank and then by bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    pub reports: Vec<BucketReport>,
    /// Set when the request timeout cut the request short.
    pub timed_out: bool,
}

impl Coverage {
    /// True when every unit either loaded or legitimately had no data.
    pub fn is_complete(&self) -> bool {
        !self.timed_out
            && self
                .reports
                .iter()
                .all(|r| matches!(r.status, BucketStatus::Loaded | BucketStatus::NoData))
    }

    pub fn failures(&self) -> impl Iterator<Item = &BucketReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.status, BucketStatus::Failed { .. }))
    }

    /// Every unit that ran failed for a reason other than missing data.
    pub(crate) fn is_systemic_failure(&self) -> bool {
        !self.reports.is_empty()
            && self
                .reports
                .iter()
                .all(|r| matches!(r.status, BucketStatus::Failed { .. }))
    }
}

/// One row per timestamp of the requested range, merged from ranked stations.
///
/// Each field of each row can be traced back to the station that supplied
/// it via [`MergedSeries::source_of`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSeries {
    granularity: Granularity,
    records: Vec<ObservationRecord>,
    /// Station ids in the rank order they were offered to the reconciler.
    sources: Vec<String>,
    /// Row-major `records.len() x parameters.len()` table of source ranks.
    provenance: Vec<Option<usize>>,
    coverage: Coverage,
}

impl MergedSeries {
    pub(crate) fn new(
        granularity: Granularity,
        records: Vec<ObservationRecord>,
        sources: Vec<String>,
        provenance: Vec<Option<usize>>,
    ) -> Self {
        debug_assert_eq!(
            provenance.len(),
            records.len() * granularity.parameters().len()
        );
        Self {
            granularity,
            records,
            sources,
            provenance,
            coverage: Coverage::default(),
        }
    }

    pub(crate) fn with_coverage(mut self, coverage: Coverage) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    /// Station ids whose series were offered to the reconciler, in priority order.
    /// Stations without data in the range are not listed.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn value(&self, row: usize, parameter: Parameter) -> Option<f64> {
        self.records
            .get(row)
            .and_then(|record| record.value(self.granularity, parameter))
    }

    /// The station that supplied `parameter` in `row`, or `None` when the
    /// field is missing.
    pub fn source_of(&self, row: usize, parameter: Parameter) -> Option<&str> {
        let width = self.granularity.parameters().len();
        let column = self.granularity.parameter_index(parameter)?;
        let rank = (*self.provenance.get(row * width + column)?)?;
        self.sources.get(rank).map(String::as_str)
    }

    /// Share of rows where `parameter` has a value, between 0 and 1.
    pub fn coverage_ratio(&self, parameter: Parameter) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let present = (0..self.records.len())
            .filter(|row| self.value(*row, parameter).is_some())
            .count();
        present as f64 / self.records.len() as f64
    }

    /// Converts the series into a polars `DataFrame`.
    ///
    /// The first column is `time` (UTC datetime), followed by one nullable
    /// `f64` column per parameter in [`Granularity::parameters`] order.
    /// Missing values are nulls.
    ///
    /// # Errors
    ///
    /// Returns a [`polars::prelude::PolarsError`] if the frame cannot be assembled.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let parameters = self.granularity.parameters();
        let mut columns = Vec::with_capacity(parameters.len() + 1);

        let times: Vec<NaiveDateTime> = self.records.iter().map(|r| r.time).collect();
        columns.push(Column::new("time".into(), times));

        for (index, parameter) in parameters.iter().enumerate() {
            let values: Vec<Option<f64>> = self
                .records
                .iter()
                .map(|r| r.values.get(index).copied().flatten())
                .collect();
            columns.push(Column::new(parameter.column_name().into(), values));
        }

        DataFrame::new(columns)
    }
}
