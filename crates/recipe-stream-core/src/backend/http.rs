//! HTTP extraction backend
//!
//! Uses reqwest for both the event-stream endpoint and the single
//! request/response endpoint.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use super::{ByteStream, ExtractRequest, ExtractResponse, ExtractionBackend};
use crate::config::Config;
use crate::error::TransportError;

/// Extraction backend reached over HTTP
pub struct HttpBackend {
    client: reqwest::Client,
    extract_url: String,
    stream_url: String,
}

impl HttpBackend {
    /// Create a backend for the endpoints named in `config`
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            extract_url: config.extract_url(),
            stream_url: config.stream_url(),
        })
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn extract_url(&self) -> &str {
        &self.extract_url
    }
}

#[async_trait]
impl ExtractionBackend for HttpBackend {
    async fn open_stream(&self, request: &ExtractRequest) -> Result<ByteStream, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let response = self
            .client
            .post(&self.stream_url)
            .headers(headers)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            });
        }

        debug!(url = %self.stream_url, "Event stream opened");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Read(e.to_string())));
        Ok(stream.boxed())
    }

    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractResponse, TransportError> {
        let response = self
            .client
            .post(&self.extract_url)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        let body = match serde_json::from_slice(&bytes) {
            Ok(body) => body,
            Err(e) if (200..300).contains(&status) => {
                return Err(TransportError::Body(e.to_string()));
            }
            Err(_) => serde_json::Value::Null,
        };

        Ok(ExtractResponse { status, body })
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// `{"error": "..."}` message of a failed response, if it has one
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|m| !m.is_empty())
}
