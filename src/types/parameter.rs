//! Measured parameters, their stable column names, canonical units and the
//! physical bounds used to reject corrupt upstream rows.

use crate::types::granularity::Granularity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// A single measured field of an observation row.
///
/// Column names and units are part of the output contract and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parameter {
    /// Air temperature in °C (hourly).
    Temperature,
    /// Dew point in °C (hourly).
    DewPoint,
    /// Relative humidity in percent (hourly).
    RelativeHumidity,
    /// Mean daily temperature in °C.
    TemperatureAvg,
    /// Minimum daily temperature in °C.
    TemperatureMin,
    /// Maximum daily temperature in °C.
    TemperatureMax,
    /// Precipitation total in mm.
    Precipitation,
    /// Snow depth in mm.
    SnowDepth,
    /// Wind direction in degrees, 0 meaning north.
    WindDirection,
    /// Mean wind speed in km/h.
    WindSpeed,
    /// Peak wind gust in km/h.
    PeakGust,
    /// Sea-level air pressure in hPa.
    Pressure,
    /// Sunshine duration in minutes.
    Sunshine,
    /// Weather condition code (1-27), hourly only. Categorical.
    Condition,
}

impl Parameter {
    pub fn column_name(&self) -> &'static str {
        match self {
            Parameter::Temperature => "temp",
            Parameter::DewPoint => "dwpt",
            Parameter::RelativeHumidity => "rhum",
            Parameter::TemperatureAvg => "tavg",
            Parameter::TemperatureMin => "tmin",
            Parameter::TemperatureMax => "tmax",
            Parameter::Precipitation => "prcp",
            Parameter::SnowDepth => "snow",
            Parameter::WindDirection => "wdir",
            Parameter::WindSpeed => "wspd",
            Parameter::PeakGust => "wpgt",
            Parameter::Pressure => "pres",
            Parameter::Sunshine => "tsun",
            Parameter::Condition => "coco",
        }
    }

    /// Whether archives using tenths encoding store this parameter multiplied by ten.
    pub(crate) fn stored_in_tenths(&self) -> bool {
        matches!(
            self,
            Parameter::Temperature
                | Parameter::DewPoint
                | Parameter::TemperatureAvg
                | Parameter::TemperatureMin
                | Parameter::TemperatureMax
                | Parameter::Precipitation
                | Parameter::WindSpeed
                | Parameter::PeakGust
                | Parameter::Pressure
        )
    }

    pub(crate) fn is_categorical(&self) -> bool {
        matches!(self, Parameter::Condition)
    }

    /// Plausible values after normalization. Anything outside is treated as corrupt input.
    pub(crate) fn valid_range(&self, granularity: Granularity) -> RangeInclusive<f64> {
        match self {
            Parameter::Temperature
            | Parameter::DewPoint
            | Parameter::TemperatureAvg
            | Parameter::TemperatureMin
            | Parameter::TemperatureMax => -100.0..=70.0,
            Parameter::RelativeHumidity => 0.0..=100.0,
            Parameter::Precipitation => 0.0..=2_000.0,
            Parameter::SnowDepth => 0.0..=20_000.0,
            Parameter::WindDirection => 0.0..=360.0,
            Parameter::WindSpeed | Parameter::PeakGust => 0.0..=500.0,
            Parameter::Pressure => 800.0..=1_100.0,
            Parameter::Sunshine => match granularity {
                Granularity::Hourly => 0.0..=60.0,
                Granularity::Daily => 0.0..=1_440.0,
            },
            Parameter::Condition => 1.0..=27.0,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}
