/// Resolution state of one field at one timestamp while candidates are offered
/// in priority order.
///
/// ```text
/// Open --offer(rank, Some(v))--> Filled { rank, v }
/// Open --offer(rank, None)-----> Open
/// Filled --offer(..)-----------> Filled            (first value wins)
/// ```
///
/// Whatever is still `Open` after the last candidate stays missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FieldState {
    Open,
    Filled { rank: usize, value: f64 },
}

impl FieldState {
    pub(crate) fn offer(self, rank: usize, value: Option<f64>) -> Self {
        match (self, value) {
            (FieldState::Open, Some(value)) => FieldState::Filled { rank, value },
            (state, _) => state,
        }
    }

    pub(crate) fn is_filled(&self) -> bool {
        matches!(self, FieldState::Filled { .. })
    }

    /// The final value and the rank that supplied it.
    pub(crate) fn settle(self) -> (Option<f64>, Option<usize>) {
        match self {
            FieldState::Open => (None, None),
            FieldState::Filled { rank, value } => (Some(value), Some(rank)),
        }
    }
}
