//! Extraction progress pipeline.
//!
//! ```text
//! progress message ──► match_phase() ──► PhaseTracker ──► EtaState
//!        │                                    │              │
//!        └────────► progress log              └──────┬───────┘
//!                                                    ▼
//!                                            ProgressSnapshot
//! ```
//!
//! The keyword mapping is isolated in [`match_phase`] so the state machine
//! does not depend on the backend's wording.

mod eta;
mod phase;
mod progress;
mod types;

pub use eta::{estimate_remaining, EtaState};
pub use phase::{match_phase, PhaseTracker};
pub use progress::{ProgressChange, ProgressSnapshot, ProgressState};
pub use types::{Phase, PhaseId};
