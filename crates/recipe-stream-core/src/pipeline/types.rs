//! Extraction phase identifiers and per-phase state.

use serde::{Deserialize, Serialize};

/// Step of the backend's extraction pipeline, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseId {
    Start,
    Metadata,
    Warmup,
    AiProcessing,
    Nutrition,
    Complete,
}

impl PhaseId {
    /// Every phase, in pipeline order.
    pub const ALL: [PhaseId; 6] = [
        PhaseId::Start,
        PhaseId::Metadata,
        PhaseId::Warmup,
        PhaseId::AiProcessing,
        PhaseId::Nutrition,
        PhaseId::Complete,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            PhaseId::Start => "Starting",
            PhaseId::Metadata => "Extracting metadata",
            PhaseId::Warmup => "Warming up AI",
            PhaseId::AiProcessing => "Processing with AI",
            PhaseId::Nutrition => "Calculating nutrition",
            PhaseId::Complete => "Complete",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PhaseId::Start => "Submitting the video for extraction",
            PhaseId::Metadata => "Reading the video title and description",
            PhaseId::Warmup => "Opening a connection to the language model",
            PhaseId::AiProcessing => "Turning the description into a recipe",
            PhaseId::Nutrition => "Estimating costs and macros",
            PhaseId::Complete => "Recipe ready",
        }
    }
}

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseId::Start => write!(f, "start"),
            PhaseId::Metadata => write!(f, "metadata"),
            PhaseId::Warmup => write!(f, "warmup"),
            PhaseId::AiProcessing => write!(f, "ai_processing"),
            PhaseId::Nutrition => write!(f, "nutrition"),
            PhaseId::Complete => write!(f, "complete"),
        }
    }
}

/// Display state of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub label: String,
    pub description: String,
    pub completed: bool,
    pub active: bool,
}

impl Phase {
    pub fn new(id: PhaseId) -> Self {
        Self {
            id,
            label: id.label().to_string(),
            description: id.description().to_string(),
            completed: false,
            active: false,
        }
    }
}
