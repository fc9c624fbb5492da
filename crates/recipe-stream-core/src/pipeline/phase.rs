//! Maps free-text progress messages onto extraction phases.

use tracing::debug;

use super::types::{Phase, PhaseId};

/// Keyword table checked top to bottom; the first entry with a matching
/// keyword wins, regardless of which phase is currently active.
const KEYWORD_TABLE: &[(&[&str], PhaseId)] = &[
    (&["Starting"], PhaseId::Start),
    (
        &["metadata", "Found video", "No video description"],
        PhaseId::Metadata,
    ),
    (
        &["Warming", "AI connection", "Connection warming"],
        PhaseId::Warmup,
    ),
    (
        &["Processing with AI", "Analyzing", "cached recipe"],
        PhaseId::AiProcessing,
    ),
    (&["Calculating nutrition", "costs"], PhaseId::Nutrition),
    (&["extraction complete", "Complete!"], PhaseId::Complete),
];

/// Phase named by a progress message, if any. Case-sensitive substring match.
pub fn match_phase(message: &str) -> Option<PhaseId> {
    KEYWORD_TABLE
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| message.contains(k)))
        .map(|(_, phase)| *phase)
}

/// Active/completed state over the fixed phase sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTracker {
    phases: Vec<Phase>,
    current: Option<usize>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phases: PhaseId::ALL.iter().copied().map(Phase::new).collect(),
            current: None,
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_phase(&self) -> Option<PhaseId> {
        self.current.map(|i| self.phases[i].id)
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Apply one progress message. Returns true if phase state changed.
    ///
    /// Unrecognised messages and messages naming a phase behind the current
    /// one leave the state untouched.
    pub fn apply(&mut self, message: &str) -> bool {
        let Some(phase) = match_phase(message) else {
            return false;
        };
        let target = phase.index();

        if let Some(current) = self.current {
            if target <= current {
                if target < current {
                    debug!(%phase, current = %self.phases[current].id, "Ignoring progress for an earlier phase");
                }
                return false;
            }
        }

        self.activate(target);
        true
    }

    /// Terminal completion: every phase completed, the last one active.
    pub fn complete_all(&mut self) {
        let last = self.phases.len() - 1;
        for (i, phase) in self.phases.iter_mut().enumerate() {
            phase.completed = true;
            phase.active = i == last;
        }
        self.current = Some(last);
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn activate(&mut self, target: usize) {
        for (i, phase) in self.phases.iter_mut().enumerate() {
            if i < target {
                phase.completed = true;
                phase.active = false;
            } else if i == target {
                phase.completed = false;
                phase.active = true;
            } else {
                phase.active = false;
            }
        }
        self.current = Some(target);
    }
}
