use crate::config::RawEncoding;
use crate::parse::error::ParseError;
use crate::types::blob::{BlobKey, RawBlob};
use crate::types::granularity::Granularity;
use crate::types::observation::{ObservationRecord, ObservationSeries};
use crate::types::parameter::Parameter;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::io::Cursor;
use std::sync::Arc;

const DATE_COLUMN: &str = "date";
const HOUR_COLUMN: &str = "hour";

/// Column names and types of one header-less archive row.
fn row_schema(granularity: Granularity) -> Schema {
    let mut fields = vec![Field::new(DATE_COLUMN.into(), DataType::String)];
    if granularity == Granularity::Hourly {
        fields.push(Field::new(HOUR_COLUMN.into(), DataType::Int64));
    }
    fields.extend(
        granularity
            .parameters()
            .iter()
            .map(|p| Field::new(p.column_name().into(), DataType::Float64)),
    );
    Schema::from_iter(fields)
}

/// Decodes an archive blob into a typed, normalized series.
///
/// Daily rows are `date,tavg,tmin,tmax,prcp,snow,wdir,wspd,wpgt,pres,tsun`;
/// hourly rows are `date,hour,temp,dwpt,rhum,prcp,snow,wdir,wspd,wpgt,pres,tsun,coco`.
/// Empty fields are missing values. Any row that does not fit (wrong field
/// count, unparseable number, implausible value, timestamp outside the
/// blob's bucket) rejects the whole blob.
///
/// Parsing is a pure function of the blob and the encoding.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, Utc};
/// use meteostat_series::{
///     parse_blob, BlobKey, BucketSpan, Granularity, Parameter, RawBlob, RawEncoding, TimeBucket,
/// };
///
/// let jan = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let key = BlobKey::new("10637", Granularity::Daily, TimeBucket::containing(BucketSpan::Year, jan));
/// let blob = RawBlob::new(key, b"2023-01-01,4.2,1.0,7.5,0.3,,250,11.2,,1013.2,\n".to_vec(), Utc::now());
///
/// let series = parse_blob(&blob, RawEncoding::Native).unwrap();
/// assert_eq!(series.len(), 1);
/// assert_eq!(series.records()[0].value(Granularity::Daily, Parameter::TemperatureAvg), Some(4.2));
/// ```
pub fn parse_blob(blob: &RawBlob, encoding: RawEncoding) -> Result<ObservationSeries, ParseError> {
    let key = &blob.key;
    let granularity = key.granularity;

    let text = std::str::from_utf8(&blob.bytes).map_err(|e| ParseError::Encoding {
        key: key.to_string(),
        source: e,
    })?;
    let schema = row_schema(granularity);
    let rows = clean_rows(text, schema.len(), key)?;
    if rows.is_empty() {
        return Ok(ObservationSeries::empty(key.station.clone(), granularity));
    }

    let frame = CsvReadOptions::default()
        .with_has_header(false)
        .with_schema(Some(Arc::new(schema)))
        .into_reader_with_file_handle(Cursor::new(rows.into_bytes()))
        .finish()
        .map_err(|e| ParseError::Csv {
            key: key.to_string(),
            source: e,
        })?;

    // Helper macro to get a typed column or return MissingColumn
    macro_rules! typed_column {
        ($frame:expr, $name:expr, $accessor:ident) => {
            $frame
                .column($name)
                .and_then(|c| c.$accessor())
                .map_err(|e| ParseError::MissingColumn {
                    key: key.to_string(),
                    column: $name.to_string(),
                    source: e,
                })?
        };
    }

    let dates = typed_column!(frame, DATE_COLUMN, str);
    let hours = match granularity {
        Granularity::Hourly => Some(typed_column!(frame, HOUR_COLUMN, i64)),
        Granularity::Daily => None,
    };
    let mut values = Vec::with_capacity(granularity.parameters().len());
    for parameter in granularity.parameters() {
        values.push((*parameter, typed_column!(frame, parameter.column_name(), f64)));
    }

    let mut records = Vec::with_capacity(frame.height());
    for row in 0..frame.height() {
        let time = timestamp(dates.get(row), hours.map(|h| h.get(row)), row, key)?;
        if !key.bucket.contains(time) {
            return Err(ParseError::OutsideBucket {
                key: key.to_string(),
                row: row + 1,
                time,
                bucket: key.bucket,
            });
        }
        let fields = values
            .iter()
            .map(|(parameter, column)| {
                normalize(column.get(row), *parameter, granularity, encoding)
                    .map_err(|value| ParseError::OutOfRange {
                        key: key.to_string(),
                        row: row + 1,
                        parameter: *parameter,
                        value,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        records.push(ObservationRecord {
            time,
            values: fields,
        });
    }

    records.sort_by_key(|record| record.time);
    if let Some(pair) = records.windows(2).find(|w| w[0].time == w[1].time) {
        return Err(ParseError::Duplicate {
            key: key.to_string(),
            time: pair[0].time,
        });
    }

    Ok(ObservationSeries::from_sorted(
        key.station.clone(),
        granularity,
        records,
    ))
}

/// Drops blank lines and checks every remaining line has `width` fields.
fn clean_rows(text: &str, width: usize, key: &BlobKey) -> Result<String, ParseError> {
    let mut rows = String::with_capacity(text.len());
    for (index, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let found = line.split(',').count();
        if found != width {
            return Err(ParseError::Arity {
                key: key.to_string(),
                line: index + 1,
                expected: width,
                found,
            });
        }
        rows.push_str(line);
        rows.push('\n');
    }
    Ok(rows)
}

fn timestamp(
    date: Option<&str>,
    hour: Option<Option<i64>>,
    row: usize,
    key: &BlobKey,
) -> Result<NaiveDateTime, ParseError> {
    let invalid = |value: String| ParseError::Timestamp {
        key: key.to_string(),
        row: row + 1,
        value,
    };

    let date_text = date.ok_or_else(|| invalid(String::new()))?;
    let day = NaiveDate::parse_from_str(date_text, "%Y-%m-%d")
        .map_err(|_| invalid(date_text.to_string()))?;
    let hour = match hour {
        None => 0,
        Some(Some(hour @ 0..=23)) => hour as u32,
        Some(other) => {
            return Err(invalid(format!(
                "{} {}",
                date_text,
                other.map(|h| h.to_string()).unwrap_or_default()
            )))
        }
    };
    day.and_hms_opt(hour, 0, 0)
        .ok_or_else(|| invalid(date_text.to_string()))
}

/// Converts a raw value to its canonical unit and checks it is plausible.
/// On failure the offending (normalized) value is returned.
fn normalize(
    raw: Option<f64>,
    parameter: Parameter,
    granularity: Granularity,
    encoding: RawEncoding,
) -> Result<Option<f64>, f64> {
    let Some(mut value) = raw else {
        return Ok(None);
    };
    if encoding == RawEncoding::Tenths && parameter.stored_in_tenths() {
        value /= 10.0;
    }
    if !parameter.valid_range(granularity).contains(&value) {
        return Err(value);
    }
    if parameter.is_categorical() && value.fract() != 0.0 {
        return Err(value);
    }
    if parameter == Parameter::WindDirection && value == 360.0 {
        value = 0.0;
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{daily_key, daily_row, date, whole_key};
    use crate::types::bucket::{BucketSpan, TimeBucket};
    use chrono::{TimeZone, Utc};

    fn daily_blob(csv: &str) -> RawBlob {
        RawBlob::new(
            daily_key("10637", 2023),
            csv.as_bytes().to_vec(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
    }

    fn hourly_blob(csv: &str) -> RawBlob {
        let key = BlobKey::new(
            "10637",
            Granularity::Hourly,
            TimeBucket::containing(BucketSpan::Month, date(2023, 3, 1).and_hms_opt(0, 0, 0).unwrap()),
        );
        RawBlob::new(
            key,
            csv.as_bytes().to_vec(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn parses_daily_rows_with_missing_fields() {
        let csv = "2023-01-01,4.2,1.0,7.5,0.3,,250,11.2,,1013.2,\n2023-01-02,,,,,,,,,,\n";
        let series = parse_blob(&daily_blob(csv), RawEncoding::Native).unwrap();

        assert_eq!(series.len(), 2);
        let first = &series.records()[0];
        assert_eq!(first.time, date(2023, 1, 1).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(first.value(Granularity::Daily, Parameter::TemperatureMax), Some(7.5));
        assert_eq!(first.value(Granularity::Daily, Parameter::SnowDepth), None);
        assert!(series.records()[1].values.iter().all(Option::is_none));
    }

    #[test]
    fn reconstructs_hourly_timestamps() {
        let csv = "2023-03-05,0,1.5,-0.5,88,0,,180,9.4,,1008.1,,3\n\
                   2023-03-05,13,6.0,,,,,360,,,,,\n";
        let series = parse_blob(&hourly_blob(csv), RawEncoding::Native).unwrap();

        let times: Vec<_> = series.records().iter().map(|r| r.time).collect();
        assert_eq!(
            times,
            [
                date(2023, 3, 5).and_hms_opt(0, 0, 0).unwrap(),
                date(2023, 3, 5).and_hms_opt(13, 0, 0).unwrap()
            ]
        );
        let second = &series.records()[1];
        assert_eq!(second.value(Granularity::Hourly, Parameter::WindDirection), Some(0.0));
        assert_eq!(
            series.records()[0].value(Granularity::Hourly, Parameter::Condition),
            Some(3.0)
        );
    }

    #[test]
    fn unsorted_rows_are_ordered() {
        let csv = [
            daily_row(date(2023, 5, 2), Some(2.0), None),
            daily_row(date(2023, 5, 1), Some(1.0), None),
        ]
        .join("\n");
        let series = parse_blob(&daily_blob(&csv), RawEncoding::Native).unwrap();
        assert_eq!(series.records()[0].time.date(), date(2023, 5, 1));
    }

    #[test]
    fn empty_blob_is_an_empty_series() {
        let series = parse_blob(&daily_blob("\n\n"), RawEncoding::Native).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.station(), "10637");
    }

    #[test]
    fn tenths_encoding_is_scaled() {
        let csv = "2023-01-01,42,-15,75,3,10,250,112,,10132,60\n";
        let series = parse_blob(&daily_blob(csv), RawEncoding::Tenths).unwrap();
        let record = &series.records()[0];
        assert_eq!(record.value(Granularity::Daily, Parameter::TemperatureAvg), Some(4.2));
        assert_eq!(record.value(Granularity::Daily, Parameter::TemperatureMin), Some(-1.5));
        assert_eq!(record.value(Granularity::Daily, Parameter::Pressure), Some(1013.2));
        // Not encoded in tenths.
        assert_eq!(record.value(Granularity::Daily, Parameter::SnowDepth), Some(10.0));
        assert_eq!(record.value(Granularity::Daily, Parameter::Sunshine), Some(60.0));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let csv = "2023-01-01,4.2,1.0\n";
        let err = parse_blob(&daily_blob(csv), RawEncoding::Native).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Arity {
                line: 1,
                expected: 11,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn implausible_values_are_rejected() {
        let csv = daily_row(date(2023, 1, 1), Some(420.0), None);
        let err = parse_blob(&daily_blob(&csv), RawEncoding::Native).unwrap_err();
        assert!(matches!(
            err,
            ParseError::OutOfRange {
                parameter: Parameter::TemperatureAvg,
                ..
            }
        ));
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        let csv = "2023-01-01,warm,,,,,,,,,\n";
        let err = parse_blob(&daily_blob(csv), RawEncoding::Native).unwrap_err();
        assert!(matches!(err, ParseError::Csv { .. }));
    }

    #[test]
    fn rows_outside_the_bucket_are_rejected() {
        let csv = daily_row(date(2022, 12, 31), Some(1.0), None);
        let err = parse_blob(&daily_blob(&csv), RawEncoding::Native).unwrap_err();
        assert!(matches!(err, ParseError::OutsideBucket { .. }));
    }

    #[test]
    fn whole_record_file_spans_years() {
        let csv = [
            daily_row(date(2022, 12, 31), Some(-1.5), None),
            daily_row(date(2023, 1, 1), Some(0.5), Some(2.0)),
            daily_row(date(1998, 7, 4), Some(21.0), None),
        ]
        .join("\n");
        let blob = RawBlob::new(
            whole_key("10637", Granularity::Daily),
            csv.into_bytes(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        );

        let series = parse_blob(&blob, RawEncoding::Native).unwrap();
        let days: Vec<_> = series.records().iter().map(|r| r.time.date()).collect();
        assert_eq!(days, [date(1998, 7, 4), date(2022, 12, 31), date(2023, 1, 1)]);
        assert_eq!(
            series.records()[2].value(Granularity::Daily, Parameter::Precipitation),
            Some(2.0)
        );
    }

    #[test]
    fn invalid_hours_are_rejected() {
        let csv = "2023-03-05,24,1.5,,,,,,,,,,\n";
        let err = parse_blob(&hourly_blob(csv), RawEncoding::Native).unwrap_err();
        assert!(matches!(err, ParseError::Timestamp { row: 1, .. }));
    }

    #[test]
    fn duplicate_timestamps_are_rejected() {
        let row = daily_row(date(2023, 1, 1), Some(1.0), None);
        let csv = format!("{row}\n{row}\n");
        let err = parse_blob(&daily_blob(&csv), RawEncoding::Native).unwrap_err();
        assert!(matches!(err, ParseError::Duplicate { .. }));
    }

    #[test]
    fn parsing_is_deterministic() {
        let csv = crate::test_utils::daily_csv(2023, 365, |i| (i % 30) as f64 - 10.0);
        let blob = daily_blob(&csv);
        let first = parse_blob(&blob, RawEncoding::Native).unwrap();
        let second = parse_blob(&blob, RawEncoding::Native).unwrap();
        assert_eq!(first.len(), 365);
        assert_eq!(first, second);
    }
}
