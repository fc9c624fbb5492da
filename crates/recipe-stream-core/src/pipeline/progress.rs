//! Progress state for one extraction session: phases, message log and ETA.

use serde::{Deserialize, Serialize};

use super::eta::EtaState;
use super::phase::PhaseTracker;
use super::types::Phase;

/// Point-in-time copy of a session's progress, suitable for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub phases: Vec<Phase>,
    pub log: Vec<String>,
    pub eta: EtaState,
}

impl ProgressSnapshot {
    /// Currently active phase, if any.
    pub fn active_phase(&self) -> Option<&Phase> {
        self.phases.iter().find(|p| p.active)
    }

    pub fn completed_count(&self) -> usize {
        self.phases.iter().filter(|p| p.completed).count()
    }
}

/// What a single progress message changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressChange {
    pub phases_changed: bool,
    pub eta_seconds: Option<u64>,
}

/// Owns the phase tracker, progress log and ETA state of one session.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    tracker: PhaseTracker,
    log: Vec<String>,
    eta: EtaState,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything and start the ETA clock.
    pub fn begin(&mut self, now_ms: i64) {
        self.tracker.reset();
        self.log.clear();
        self.eta = EtaState::started(now_ms);
    }

    /// Record a progress message and update phases and ETA.
    pub fn on_progress(&mut self, message: &str, now_ms: i64) -> ProgressChange {
        self.log.push(message.to_string());
        let phases_changed = self.tracker.apply(message);
        let eta_seconds = self.refresh_eta(now_ms);
        ProgressChange {
            phases_changed,
            eta_seconds,
        }
    }

    /// Terminal success: all phases complete.
    pub fn complete(&mut self, now_ms: i64) -> Option<u64> {
        self.tracker.complete_all();
        self.refresh_eta(now_ms)
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        self.log.clear();
        self.eta.reset();
    }

    pub fn phases(&self) -> &[Phase] {
        self.tracker.phases()
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn eta(&self) -> &EtaState {
        &self.eta
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phases: self.tracker.phases().to_vec(),
            log: self.log.clone(),
            eta: self.eta.clone(),
        }
    }

    fn refresh_eta(&mut self, now_ms: i64) -> Option<u64> {
        self.eta
            .update(now_ms, self.tracker.current_index(), self.tracker.len())
    }
}
