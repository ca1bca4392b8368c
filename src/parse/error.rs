use crate::types::bucket::TimeBucket;
use crate::types::parameter::Parameter;
use chrono::NaiveDateTime;
use polars::error::PolarsError;
use thiserror::Error;

/// The archive file does not have the expected shape. The whole file is rejected.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Archive file {key} is not valid UTF-8")]
    Encoding {
        key: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Line {line} of {key} has {found} fields, expected {expected}")]
    Arity {
        key: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Failed to decode CSV rows of {key}")]
    Csv {
        key: String,
        #[source]
        source: PolarsError,
    },

    #[error("Required column '{column}' not found for {key}")]
    MissingColumn {
        key: String,
        column: String,
        #[source]
        source: PolarsError,
    },

    #[error("Row {row} of {key} has an invalid timestamp '{value}'")]
    Timestamp {
        key: String,
        row: usize,
        value: String,
    },

    #[error("Row {row} of {key}: {parameter} value {value} is out of range")]
    OutOfRange {
        key: String,
        row: usize,
        parameter: Parameter,
        value: f64,
    },

    #[error("Row {row} of {key}: timestamp {time} lies outside bucket {bucket}")]
    OutsideBucket {
        key: String,
        row: usize,
        time: NaiveDateTime,
        bucket: TimeBucket,
    },

    #[error("{key} contains timestamp {time} more than once")]
    Duplicate { key: String, time: NaiveDateTime },
}
