//! Typed observation rows and per-station series.

use crate::types::granularity::Granularity;
use crate::types::parameter::Parameter;
use chrono::NaiveDateTime;

/// One timestep of observations.
///
/// `values` holds one entry per parameter of the row's granularity, in the
/// order of [`Granularity::parameters`]. `None` is the missing-value sentinel,
/// so every row has the same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub time: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

impl ObservationRecord {
    /// A row at `time` with every field missing.
    pub fn missing(time: NaiveDateTime, granularity: Granularity) -> Self {
        Self {
            time,
            values: vec![None; granularity.parameters().len()],
        }
    }

    pub fn value(&self, granularity: Granularity, parameter: Parameter) -> Option<f64> {
        granularity
            .parameter_index(parameter)
            .and_then(|index| self.values.get(index).copied().flatten())
    }
}

/// Observations of a single station, strictly increasing in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSeries {
    station: String,
    granularity: Granularity,
    records: Vec<ObservationRecord>,
}

impl ObservationSeries {
    /// Creates a series from records that are already sorted, unique and aligned.
    pub(crate) fn from_sorted(
        station: impl Into<String>,
        granularity: Granularity,
        records: Vec<ObservationRecord>,
    ) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].time < w[1].time));
        Self {
            station: station.into(),
            granularity,
            records,
        }
    }

    pub fn empty(station: impl Into<String>, granularity: Granularity) -> Self {
        Self::from_sorted(station, granularity, Vec::new())
    }

    pub fn station(&self) -> &str {
        &self.station
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

    /// Appends a later series of the same station, e.g. the next bucket.
    ///
    /// Records not strictly after the current last timestamp are dropped so
    /// the ordering invariant holds even for overlapping input.
    pub(crate) fn extend(&mut self, later: ObservationSeries) {
        let last = self.records.last().map(|r| r.time);
        self.records.extend(
            later
                .records
                .into_iter()
                .filter(|record| last.map_or(true, |last| record.time > last)),
        );
    }

    /// Keeps only records within `[start, end)`.
    pub(crate) fn truncate_to(&mut self, start: NaiveDateTime, end: NaiveDateTime) {
        self.records
            .retain(|record| start <= record.time && record.time < end);
    }
}
