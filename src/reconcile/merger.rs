use crate::reconcile::field_state::FieldState;
use crate::types::merged::{MergedSeries, TimeGrid};
use crate::types::observation::{ObservationRecord, ObservationSeries};
use log::debug;

/// Merges per-station series into one row per grid timestamp.
///
/// `ranked` is in priority order. For every timestamp and every field the
/// first series with a value supplies it, so temperature may come from one
/// station while precipitation comes from the next. Fields no series has stay
/// missing; nothing is interpolated. Series whose granularity differs from
/// the grid's are ignored.
pub fn merge(ranked: &[ObservationSeries], grid: &TimeGrid) -> MergedSeries {
    let granularity = grid.granularity();
    let width = granularity.parameters().len();
    let candidates: Vec<&ObservationSeries> = ranked
        .iter()
        .filter(|series| series.granularity() == granularity)
        .collect();

    // One cursor per series; both the grid and every series are sorted by time.
    let mut cursors = vec![0usize; candidates.len()];
    let mut records = Vec::new();
    let mut provenance = Vec::new();
    let mut states = vec![FieldState::Open; width];

    for time in grid.iter() {
        states.fill(FieldState::Open);

        for (rank, series) in candidates.iter().enumerate() {
            let rows = series.records();
            let cursor = &mut cursors[rank];
            while *cursor < rows.len() && rows[*cursor].time < time {
                *cursor += 1;
            }
            let Some(row) = rows.get(*cursor).filter(|row| row.time == time) else {
                continue;
            };
            for (state, value) in states.iter_mut().zip(&row.values) {
                *state = state.offer(rank, *value);
            }
            if states.iter().all(FieldState::is_filled) {
                break;
            }
        }

        let mut values = Vec::with_capacity(width);
        for state in &states {
            let (value, rank) = state.settle();
            values.push(value);
            provenance.push(rank);
        }
        records.push(ObservationRecord { time, values });
    }

    debug!(
        "Merged {} series into {} {} rows",
        candidates.len(),
        records.len(),
        granularity
    );

    let sources = candidates
        .iter()
        .map(|series| series.station().to_string())
        .collect();
    MergedSeries::new(granularity, records, sources, provenance)
}
