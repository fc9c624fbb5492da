//! Splits a chunked byte stream into event records.

use tracing::{debug, warn};

/// Prefix carried by every significant line of the event stream.
pub const EVENT_PREFIX: &str = "data: ";

/// Longest unterminated line buffered before it is discarded.
pub const MAX_RECORD_BYTES: usize = 4 * 1024 * 1024;

/// Incremental line decoder for the event stream.
///
/// Bytes are buffered until a `\n` arrives, so a record (or a multi-byte
/// character inside it) split across chunks is completed by a later chunk.
/// A line growing past the size limit is dropped up to its terminator.
#[derive(Debug)]
pub struct RecordDecoder {
    remainder: Vec<u8>,
    max_record_bytes: usize,
    /// Skipping the rest of an overlong line
    discarding: bool,
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::with_max_record_bytes(MAX_RECORD_BYTES)
    }
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_record_bytes(max_record_bytes: usize) -> Self {
        Self {
            remainder: Vec::new(),
            max_record_bytes,
            discarding: false,
        }
    }

    /// Feed one chunk and return every record it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.remainder.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.remainder[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if self.discarding {
                self.discarding = false;
            } else if let Some(record) = decode_line(&self.remainder[start..end]) {
                records.push(record);
            }
            start = end + 1;
        }
        self.remainder.drain(..start);

        if self.remainder.len() > self.max_record_bytes {
            if !self.discarding {
                warn!(
                    bytes = self.remainder.len(),
                    limit = self.max_record_bytes,
                    "Discarding overlong event record"
                );
            }
            self.remainder.clear();
            self.discarding = true;
        }

        records
    }

    /// Flush the trailing unterminated fragment once the transport closes.
    pub fn finish(&mut self) -> Option<String> {
        let fragment = std::mem::take(&mut self.remainder);
        if std::mem::take(&mut self.discarding) || fragment.is_empty() {
            return None;
        }
        let record = decode_line(&fragment);
        if record.is_none() {
            debug!(bytes = fragment.len(), "Dropping unterminated non-event fragment");
        }
        record
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.remainder.len()
    }
}

fn decode_line(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);
    if text.starts_with(EVENT_PREFIX) {
        Some(text.into_owned())
    } else {
        None
    }
}
