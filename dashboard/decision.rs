//! Client resolution and the approval threshold.
//!
//! Decisions are recomputed from the current `Threshold` on every call. Nothing in
//! here remembers a previous threshold.

use crate::data::ClientTable;
use crate::error::DashboardError;
use serde::Serialize;

/// Decision cutoff on the predicted repayment probability, held as a percentage.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
pub struct Threshold(f64);

impl Threshold {
    pub const MIN_PERCENT: f64 = 0.0;
    pub const MAX_PERCENT: f64 = 100.0;
    pub const DEFAULT_PERCENT: f64 = 50.0;

    pub fn from_percent(percent: f64) -> Result<Self, DashboardError> {
        if !(Self::MIN_PERCENT..=Self::MAX_PERCENT).contains(&percent) {
            return Err(DashboardError::InvalidThreshold(percent));
        }
        Ok(Self(percent))
    }

    /// Moves the threshold by `delta` percentage points, pinned to [0, 100].
    pub fn nudged(self, delta: f64) -> Self {
        Self((self.0 + delta).clamp(Self::MIN_PERCENT, Self::MAX_PERCENT))
    }

    pub fn percent(self) -> f64 {
        self.0
    }

    /// The threshold on the probability scale of the `target` column.
    pub fn fraction(self) -> f64 {
        self.0 / 100.0
    }

    pub fn approves(self, probability: f64) -> bool {
        probability >= self.fraction()
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(Self::DEFAULT_PERCENT)
    }
}

/// Outcome for a single client at a given threshold.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Decision {
    pub approved: bool,
    pub probability: f64,
}

/// How many clients the threshold lets through.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ApprovalSummary {
    pub approved_count: usize,
    pub approved_percent: f64,
}

/// Maps a user-typed identifier onto a row position.
pub fn client_row(table: &ClientTable, client_id: i64) -> Result<usize, DashboardError> {
    let last_id = table.row_count().saturating_sub(1);
    usize::try_from(client_id)
        .ok()
        .filter(|&row| row < table.row_count())
        .ok_or(DashboardError::ClientNotFound { client_id, last_id })
}

/// Advisory identifier range shown next to the client input.
pub fn client_id_range(table: &ClientTable) -> (usize, usize) {
    (0, table.row_count().saturating_sub(1))
}

pub fn resolve_decision(
    table: &ClientTable,
    client_id: i64,
    threshold: Threshold,
) -> Result<Decision, DashboardError> {
    let row = client_row(table, client_id)?;
    let probability = table.target()[row];
    Ok(Decision {
        approved: threshold.approves(probability),
        probability,
    })
}

/// Counts the clients approved at `threshold`.
///
/// The loader rejects empty tables, so the percentage is always defined.
pub fn approval_summary(table: &ClientTable, threshold: Threshold) -> ApprovalSummary {
    let approved_count = table
        .target()
        .iter()
        .filter(|&&p| threshold.approves(p))
        .count();
    let approved_percent = 100.0 * approved_count as f64 / table.row_count() as f64;
    log::debug!(
        "{approved_count} of {} clients approved at {:.2}%",
        table.row_count(),
        threshold.percent()
    );
    ApprovalSummary {
        approved_count,
        approved_percent,
    }
}
