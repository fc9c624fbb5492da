//! Error types for the extraction session.
//!
//! Record-level failures never leave the classifier; transport- and
//! application-level failures become the session's `failed` reason.

use thiserror::Error;

/// Failures of the underlying transport (connection, status, stream read).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("stream read failed: {0}")]
    Read(String),
    #[error("invalid response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::Connect(err.to_string())
        } else if err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Read(err.to_string())
        }
    }
}

/// A single event record that could not be classified.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record is missing the event prefix")]
    MissingPrefix,
    #[error("record payload is not a valid event: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Errors returned by the session controller's caller-facing API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("an extraction session is already active")]
    AlreadyActive,
    #[error("no extraction session is active")]
    NotActive,
    #[error("regular-mode sessions cannot be cancelled")]
    NotCancellable,
}
