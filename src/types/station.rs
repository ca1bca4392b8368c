//! Weather stations as handed in by the caller, and the ranked candidate list
//! the archive consumes.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A weather station, as obtained from an external station catalog.
///
/// Only `id` is used to address archive files; the remaining metadata travels
/// along for the caller's benefit.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// The archive station identifier (e.g. "10637").
    pub id: String,
    /// Geographical position.
    pub location: Location,
    /// The country code where the station is located (e.g. "NL", "DE"), if known.
    pub country: Option<String>,
    /// The region code (state, province, etc.), if known.
    pub region: Option<String>,
}

/// Represents the geographical location of a weather station.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees (positive for North, negative for South).
    pub latitude: f64,
    /// Longitude in decimal degrees (positive for East, negative for West).
    pub longitude: f64,
    /// Elevation above sea level in meters, if available.
    pub elevation: Option<i32>,
}

impl Station {
    /// Creates a station with only an identifier and a position.
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            location: Location {
                latitude,
                longitude,
                elevation: None,
            },
            country: None,
            region: None,
        }
    }
}

/// Candidate stations in priority order, highest priority first.
///
/// The archive never re-ranks this list. Each station id appears at most once;
/// when the input contains the same id twice, the first occurrence is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedStations {
    stations: Vec<Station>,
}

impl RankedStations {
    /// Takes stations in the order given.
    ///
    /// # Examples
    ///
    /// ```
    /// use meteostat_series::{RankedStations, Station};
    ///
    /// let ranked = RankedStations::new([
    ///     Station::new("06240", 52.3, 4.77),
    ///     Station::new("06260", 52.1, 5.18),
    /// ]);
    /// assert_eq!(ranked.ids().collect::<Vec<_>>(), ["06240", "06260"]);
    /// ```
    pub fn new(stations: impl IntoIterator<Item = Station>) -> Self {
        let mut seen = HashSet::new();
        let stations = stations
            .into_iter()
            .filter(|station| seen.insert(station.id.clone()))
            .collect();
        Self { stations }
    }

    /// Orders stations by ascending score (e.g. distance in km).
    ///
    /// Equal scores keep their input order, so ties are broken by whoever
    /// produced the list rather than by incidental collection ordering.
    pub fn by_score(mut scored: Vec<(Station, f64)>) -> Self {
        // `sort_by_key` is stable.
        scored.sort_by_key(|(_, score)| OrderedFloat(*score));
        Self::new(scored.into_iter().map(|(station, _)| station))
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.stations.iter().map(|station| station.id.as_str())
    }
}

impl FromIterator<Station> for RankedStations {
    fn from_iter<T: IntoIterator<Item = Station>>(iter: T) -> Self {
        Self::new(iter)
    }
}
