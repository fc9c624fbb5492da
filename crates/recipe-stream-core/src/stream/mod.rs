//! Event-stream wire format: `data: <json>` records separated by newlines.

mod decoder;
mod event;

pub use decoder::{RecordDecoder, EVENT_PREFIX, MAX_RECORD_BYTES};
pub use event::{classify, parse_record, ExtractionEvent};
