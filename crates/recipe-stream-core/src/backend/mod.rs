//! Extraction backend abstraction
//!
//! The session controller talks to the backend through [`ExtractionBackend`]:
//! - `open_stream` for incremental extraction (raw event-stream bytes)
//! - `extract` for a single request/response
//!
//! [`HttpBackend`] is the production implementation.

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::recipe::RecipeData;

pub use http::HttpBackend;

/// Reason used when a failed response carries no message of its own
pub const DEFAULT_FAILURE_REASON: &str = "Failed to extract recipe";

/// Raw bytes of an open event stream, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// What the caller wants extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRequest {
    /// Media URL (short cooking video)
    pub url: String,
    /// User location, used by the backend for cost estimates
    pub location: String,
}

impl ExtractRequest {
    pub fn new(url: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            location: location.into(),
        }
    }
}

/// Single structured response from the regular endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ExtractResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reconcile status and body into a recipe or a failure reason.
    ///
    /// A successful status whose body carries a non-empty `error` field is a
    /// failure: the backend reports processing errors that way.
    pub fn into_outcome(self) -> Result<RecipeData, String> {
        let is_success = self.is_success();
        match self.body {
            serde_json::Value::Object(fields) => {
                let recipe = RecipeData::new(fields);
                if let Some(error) = recipe.embedded_error() {
                    return Err(error.to_string());
                }
                if is_success {
                    Ok(recipe)
                } else {
                    Err(DEFAULT_FAILURE_REASON.to_string())
                }
            }
            _ if is_success => Err("Invalid response from extraction backend".to_string()),
            _ => Err(DEFAULT_FAILURE_REASON.to_string()),
        }
    }
}

/// Transport to the extraction backend
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Open the incremental event stream for `request`.
    ///
    /// A non-success status is reported as an error; the returned stream
    /// yields the response body chunk by chunk. Dropping it releases the
    /// connection.
    async fn open_stream(&self, request: &ExtractRequest) -> Result<ByteStream, TransportError>;

    /// Perform a single blocking extraction.
    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractResponse, TransportError>;

    /// Backend name for logging (e.g. "http")
    fn backend_name(&self) -> &'static str;
}
