//! Classifies decoded records into typed extraction events.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::decoder::EVENT_PREFIX;
use crate::error::RecordError;
use crate::recipe::RecipeData;

/// Typed event carried by one record of the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionEvent {
    /// Human-readable progress update
    Progress {
        message: String,
        /// Seconds since the epoch, as stamped by the backend
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    /// Final recipe payload
    Result { recipe: RecipeData },
    /// Extraction failed on the backend
    Error { message: String },
}

impl ExtractionEvent {
    /// True for events that end the session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExtractionEvent::Progress { .. })
    }
}

/// Parse one complete record.
pub fn parse_record(record: &str) -> Result<ExtractionEvent, RecordError> {
    let payload = record
        .strip_prefix(EVENT_PREFIX)
        .ok_or(RecordError::MissingPrefix)?;
    Ok(serde_json::from_str(payload)?)
}

/// Parse one record, logging and discarding it when malformed.
pub fn classify(record: &str) -> Option<ExtractionEvent> {
    match parse_record(record) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, record = %truncate(record, 120), "Discarding malformed event record");
            None
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_with_backend_metadata() {
        let event = classify(
            r#"data: {"type":"progress","message":"📊 Found video: \"Pasta\"","timestamp":1717000000.5,"data":{"title":"Pasta"}}"#,
        )
        .unwrap();

        match event {
            ExtractionEvent::Progress {
                message,
                timestamp,
                data,
            } => {
                assert_eq!(message, "📊 Found video: \"Pasta\"");
                assert_eq!(timestamp, Some(1717000000.5));
                assert_eq!(data, Some(json!({"title": "Pasta"})));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_result_and_error() {
        let result = classify(r#"data: {"type":"result","recipe":{"title":"Pasta"},"timestamp":1.0}"#).unwrap();
        assert!(result.is_terminal());
        match result {
            ExtractionEvent::Result { recipe } => assert_eq!(recipe.title(), Some("Pasta")),
            other => panic!("unexpected event {:?}", other),
        }

        let error = classify(r#"data: {"type":"error","message":"Processing failed: boom"}"#).unwrap();
        assert_eq!(
            error,
            ExtractionEvent::Error {
                message: "Processing failed: boom".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_records_discarded() {
        assert!(classify("data: {not json").is_none());
        assert!(classify(r#"data: {"type":"heartbeat"}"#).is_none());
        assert!(classify(r#"data: {"type":"progress"}"#).is_none());
        assert!(classify(r#"data: {"type":"result","recipe":"Pasta"}"#).is_none());
        assert!(classify("data: [DONE]").is_none());
        assert!(matches!(
            parse_record("event: progress"),
            Err(RecordError::MissingPrefix)
        ));
    }
}
