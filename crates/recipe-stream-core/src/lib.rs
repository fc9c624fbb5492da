//! Recipe Stream Core - client side of the recipe extraction pipeline
//!
//! This crate contains everything between "user submitted a video URL" and
//! "recipe ready to render":
//! - Event-stream record decoding (`data: <json>` lines)
//! - Phase tracking and ETA estimation from free-text progress messages
//! - Extraction session lifecycle (start, cancel, one session at a time)
//! - HTTP backend for the streaming and regular extraction endpoints

pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod recipe;
pub mod session;
pub mod stream;

pub use backend::{ExtractRequest, ExtractResponse, ExtractionBackend, HttpBackend};
pub use config::Config;
pub use error::{RecordError, SessionError, TransportError};
pub use pipeline::{Phase, PhaseId, ProgressSnapshot};
pub use recipe::RecipeData;
pub use session::{
    ExtractionController, SessionEvent, SessionHandle, SessionMode, SessionOutcome, SessionStatus,
};
pub use stream::ExtractionEvent;
