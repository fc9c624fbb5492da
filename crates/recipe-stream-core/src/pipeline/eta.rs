//! Remaining-time estimate from elapsed time and phase position.
//!
//! Linear extrapolation: every phase is assumed to take as long as the
//! average of the phases reached so far. Advisory only.

use serde::{Deserialize, Serialize};

/// Seconds remaining, or `None` until a phase has been reached.
pub fn estimate_remaining(
    elapsed_ms: i64,
    current_index: Option<usize>,
    total_phases: usize,
) -> Option<u64> {
    let index = current_index?;
    let elapsed_secs = elapsed_ms.max(0) as f64 / 1000.0;
    let avg_per_phase = elapsed_secs / (index + 1) as f64;
    let phases_left = total_phases.saturating_sub(index + 1) as f64;
    Some((phases_left * avg_per_phase).round().max(0.0) as u64)
}

/// ETA bookkeeping for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtaState {
    pub started_at_epoch_ms: Option<i64>,
    pub current_phase_index: Option<usize>,
    pub estimated_seconds_remaining: Option<u64>,
}

impl EtaState {
    /// Fresh state for a session started at `now_ms`.
    pub fn started(now_ms: i64) -> Self {
        Self {
            started_at_epoch_ms: Some(now_ms),
            ..Default::default()
        }
    }

    /// Recompute after a phase-tracker update. Returns the new estimate.
    pub fn update(
        &mut self,
        now_ms: i64,
        current_index: Option<usize>,
        total_phases: usize,
    ) -> Option<u64> {
        self.current_phase_index = current_index;
        self.estimated_seconds_remaining = self.started_at_epoch_ms.and_then(|started| {
            estimate_remaining(now_ms - started, current_index, total_phases)
        });
        self.estimated_seconds_remaining
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
