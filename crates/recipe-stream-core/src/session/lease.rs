//! Scoped ownership of an open event stream.

use bytes::Bytes;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::backend::ByteStream;
use crate::error::TransportError;

/// Result of one read from the leased stream.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    Chunk(Bytes),
    Closed,
    Failed(TransportError),
    Cancelled,
}

/// Holds the transport read handle for one session.
///
/// The stream is released as soon as it closes, fails or the session is
/// cancelled, and at the latest when the lease is dropped.
pub(crate) struct StreamLease {
    stream: Option<ByteStream>,
    cancel_token: CancellationToken,
    session_id: Uuid,
    chunks: usize,
    bytes: usize,
}

impl StreamLease {
    pub(crate) fn new(stream: ByteStream, cancel_token: CancellationToken, session_id: Uuid) -> Self {
        Self {
            stream: Some(stream),
            cancel_token,
            session_id,
            chunks: 0,
            bytes: 0,
        }
    }

    /// Wait for the next chunk. A pending read is abandoned on cancellation.
    pub(crate) async fn next_chunk(&mut self) -> ReadOutcome {
        let Some(stream) = self.stream.as_mut() else {
            return ReadOutcome::Closed;
        };

        let next = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => None,
            next = stream.next() => Some(next),
        };

        match next {
            None => {
                self.release("cancelled");
                ReadOutcome::Cancelled
            }
            Some(None) => {
                self.release("closed");
                ReadOutcome::Closed
            }
            Some(Some(Err(e))) => {
                self.release("read error");
                ReadOutcome::Failed(e)
            }
            Some(Some(Ok(chunk))) => {
                self.chunks += 1;
                self.bytes += chunk.len();
                ReadOutcome::Chunk(chunk)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    fn release(&mut self, reason: &str) {
        if self.stream.take().is_some() {
            debug!(
                session_id = %self.session_id,
                reason,
                chunks = self.chunks,
                bytes = self.bytes,
                "Released event stream"
            );
        }
    }
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        self.release("dropped");
    }
}
