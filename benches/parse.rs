use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use meteostat_series::{
    merge, parse_blob, BlobKey, BucketSpan, Granularity, RawBlob, RawEncoding, TimeBucket, TimeGrid,
};

fn hourly_month_csv() -> String {
    let first = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
    let mut csv = String::new();
    for day in 0..31 {
        let date = first + Duration::days(day);
        for hour in 0..24 {
            csv.push_str(&format!(
                "{},{},{:.1},1.2,78,0.4,,220,14.8,,1012.5,,3\n",
                date.format("%Y-%m-%d"),
                hour,
                (hour as f64) / 2.0 - 3.0
            ));
        }
    }
    csv
}

fn bench_parse_and_merge(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2023, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let key = BlobKey::new(
        "10637",
        Granularity::Hourly,
        TimeBucket::containing(BucketSpan::Month, start),
    );
    let blob = RawBlob::new(
        key,
        hourly_month_csv().into_bytes(),
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    );

    c.bench_function("parse_hourly_month", |b| {
        b.iter(|| parse_blob(black_box(&blob), RawEncoding::Native))
    });

    let series = parse_blob(&blob, RawEncoding::Native).unwrap();
    let grid = TimeGrid::new(start, start + Duration::days(31), Granularity::Hourly);
    let ranked = vec![series.clone(), series];
    c.bench_function("merge_two_hourly_months", |b| {
        b.iter(|| merge(black_box(&ranked), black_box(&grid)))
    });
}

criterion_group!(benches, bench_parse_and_merge);
criterion_main!(benches);
