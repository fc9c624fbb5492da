//! Extraction session lifecycle.
//!
//! ```text
//! idle ──start()──► active ──► succeeded
//!                     │   └──► failed
//!                     └─cancel()──► cancelled
//! ```
//!
//! One [`ExtractionController`] owns at most one active session. Each session
//! runs in its own task: streaming sessions read the backend's event stream
//! through a `StreamLease`, regular sessions wait for a single response.
//! Events reach the caller through the [`SessionHandle`] returned by `start`.
//!
//! Terminal delivery and `cancel()` are serialised by the session mutex, so
//! once `cancel()` returns no `succeeded`/`failed` event can follow.

mod lease;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{ExtractRequest, ExtractionBackend};
use crate::error::SessionError;
use crate::pipeline::{Phase, ProgressSnapshot, ProgressState};
use crate::recipe::RecipeData;
use crate::stream::{classify, ExtractionEvent, RecordDecoder};

use lease::{ReadOutcome, StreamLease};

/// Reason reported when the stream closes before a result or error event
pub const STREAM_ENDED_REASON: &str = "stream ended unexpectedly";

/// How a session talks to the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Incremental event stream with live progress
    #[default]
    Streaming,
    /// Single request/response, no progress
    Regular,
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Active,
    Succeeded,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Succeeded | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    Succeeded { recipe: RecipeData },
    Failed { reason: String },
    Cancelled,
}

impl SessionOutcome {
    fn status(&self) -> SessionStatus {
        match self {
            SessionOutcome::Succeeded { .. } => SessionStatus::Succeeded,
            SessionOutcome::Failed { .. } => SessionStatus::Failed,
            SessionOutcome::Cancelled => SessionStatus::Cancelled,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        SessionOutcome::Failed {
            reason: reason.into(),
        }
    }
}

/// Events delivered to the caller during a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Session accepted and state reset
    Started { session_id: Uuid, mode: SessionMode },
    /// A progress message was appended to the log
    Progress { message: String },
    /// Phase state changed
    Phases { phases: Vec<Phase> },
    /// ETA recomputed
    Eta { seconds_remaining: Option<u64> },
    /// Recipe extracted
    Succeeded { recipe: RecipeData },
    /// Extraction failed
    Failed { reason: String },
    /// Cancelled by the caller
    Cancelled,
}

impl SessionEvent {
    /// The outcome carried by a terminal event
    pub fn outcome(&self) -> Option<SessionOutcome> {
        match self {
            SessionEvent::Succeeded { recipe } => Some(SessionOutcome::Succeeded {
                recipe: recipe.clone(),
            }),
            SessionEvent::Failed { reason } => Some(SessionOutcome::failed(reason.clone())),
            SessionEvent::Cancelled => Some(SessionOutcome::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }
}

impl From<SessionOutcome> for SessionEvent {
    fn from(outcome: SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Succeeded { recipe } => SessionEvent::Succeeded { recipe },
            SessionOutcome::Failed { reason } => SessionEvent::Failed { reason },
            SessionOutcome::Cancelled => SessionEvent::Cancelled,
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Mutable state of one session, guarded by `SessionShared::inner`
struct SessionInner {
    status: SessionStatus,
    progress: ProgressState,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionInner {
    fn send(&self, event: SessionEvent) {
        // Receiver gone means nobody is listening; the session still runs to completion.
        let _ = self.events.send(event);
    }
}

/// State shared between the controller and the session task
struct SessionShared {
    id: Uuid,
    mode: SessionMode,
    cancel_token: CancellationToken,
    inner: Mutex<SessionInner>,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> SessionStatus {
        self.lock().status
    }

    fn snapshot(&self) -> ProgressSnapshot {
        self.lock().progress.snapshot()
    }

    /// Apply a progress message, unless the session already ended.
    fn record_progress(&self, message: String) {
        let mut inner = self.lock();
        if inner.status != SessionStatus::Active {
            return;
        }

        let change = inner.progress.on_progress(&message, now_ms());
        debug!(session_id = %self.id, %message, phases_changed = change.phases_changed, "Progress");

        inner.send(SessionEvent::Progress { message });
        if change.phases_changed {
            let phases = inner.progress.phases().to_vec();
            inner.send(SessionEvent::Phases { phases });
        }
        inner.send(SessionEvent::Eta {
            seconds_remaining: change.eta_seconds,
        });
    }

    /// Deliver the terminal outcome. Returns false if the session had
    /// already ended (e.g. cancelled while the outcome was in flight).
    fn finish(&self, outcome: SessionOutcome) -> bool {
        let mut inner = self.lock();
        if inner.status != SessionStatus::Active {
            debug!(session_id = %self.id, status = ?inner.status, "Dropping outcome of ended session");
            return false;
        }
        self.finish_locked(&mut inner, outcome);
        true
    }

    /// Transition an active session to `outcome`. Caller holds the lock.
    fn finish_locked(&self, inner: &mut SessionInner, outcome: SessionOutcome) {
        inner.status = outcome.status();
        match &outcome {
            SessionOutcome::Succeeded { recipe } => {
                info!(session_id = %self.id, title = ?recipe.title(), "Extraction succeeded");
                if self.mode == SessionMode::Streaming {
                    let eta = inner.progress.complete(now_ms());
                    let phases = inner.progress.phases().to_vec();
                    inner.send(SessionEvent::Phases { phases });
                    inner.send(SessionEvent::Eta {
                        seconds_remaining: eta,
                    });
                }
            }
            SessionOutcome::Failed { reason } => {
                warn!(session_id = %self.id, %reason, "Extraction failed");
            }
            SessionOutcome::Cancelled => {
                info!(session_id = %self.id, "Extraction cancelled");
                inner.progress.reset();
            }
        }
        inner.send(outcome.into());
    }

    /// Cancel an active streaming session.
    ///
    /// The status check and the transition happen under one lock, so a
    /// session that succeeds or fails first reports `NotActive`.
    fn cancel(&self) -> Result<(), SessionError> {
        {
            let mut inner = self.lock();
            if inner.status != SessionStatus::Active {
                return Err(SessionError::NotActive);
            }
            if self.mode == SessionMode::Regular {
                return Err(SessionError::NotCancellable);
            }
            self.finish_locked(&mut inner, SessionOutcome::Cancelled);
        }
        self.cancel_token.cancel();
        Ok(())
    }

    /// End the session as cancelled regardless of mode and stop its task.
    fn abort(&self) {
        self.finish(SessionOutcome::Cancelled);
        self.cancel_token.cancel();
    }
}

/// Caller's side of one session: its id and event channel
pub struct SessionHandle {
    id: Uuid,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, in delivery order. `None` once the session is gone.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Drain events until the terminal one and return its outcome.
    pub async fn outcome(mut self) -> SessionOutcome {
        while let Some(event) = self.events.recv().await {
            if let Some(outcome) = event.outcome() {
                return outcome;
            }
        }
        SessionOutcome::Cancelled
    }
}

struct ActiveSession {
    shared: Arc<SessionShared>,
    task: Option<JoinHandle<()>>,
}

/// Owns the "one session at a time" state and starts/cancels sessions.
///
/// Dropping the controller aborts a running session.
pub struct ExtractionController {
    backend: Arc<dyn ExtractionBackend>,
    current: Option<ActiveSession>,
}

impl ExtractionController {
    pub fn new(backend: Arc<dyn ExtractionBackend>) -> Self {
        Self {
            backend,
            current: None,
        }
    }

    /// Start a session. Rejected while another session is active.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        &mut self,
        request: ExtractRequest,
        mode: SessionMode,
    ) -> Result<SessionHandle, SessionError> {
        if self.status() == SessionStatus::Active {
            return Err(SessionError::AlreadyActive);
        }

        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut progress = ProgressState::new();
        progress.begin(now_ms());
        let inner = SessionInner {
            status: SessionStatus::Active,
            progress,
            events: tx,
        };
        inner.send(SessionEvent::Started {
            session_id: id,
            mode,
        });
        if mode == SessionMode::Streaming {
            inner.send(SessionEvent::Phases {
                phases: inner.progress.phases().to_vec(),
            });
            inner.send(SessionEvent::Eta {
                seconds_remaining: None,
            });
        }

        let shared = Arc::new(SessionShared {
            id,
            mode,
            cancel_token: CancellationToken::new(),
            inner: Mutex::new(inner),
        });

        info!(
            session_id = %id,
            ?mode,
            backend = self.backend.backend_name(),
            url = %request.url,
            "Starting extraction"
        );

        let task = tokio::spawn(run_session(
            self.backend.clone(),
            shared.clone(),
            request,
        ));
        self.current = Some(ActiveSession {
            shared,
            task: Some(task),
        });

        Ok(SessionHandle {
            id,
            events: rx,
        })
    }

    /// Cancel the active streaming session.
    ///
    /// The pending read is abandoned and the stream released; progress state
    /// is reset. No success or failure is delivered afterwards.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        let session = self.current.as_ref().ok_or(SessionError::NotActive)?;
        session.shared.cancel()
    }

    pub fn status(&self) -> SessionStatus {
        self.current
            .as_ref()
            .map(|s| s.shared.status())
            .unwrap_or(SessionStatus::Idle)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.current.as_ref().map(|s| s.shared.id)
    }

    /// Progress of the current (or last) session
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.current
            .as_ref()
            .map(|s| s.shared.snapshot())
            .unwrap_or_default()
    }

    /// Wait until the current session's task has exited and released its
    /// transport.
    pub async fn join(&mut self) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        if let Some(task) = session.task.take() {
            if let Err(e) = task.await {
                warn!(session_id = %session.shared.id, "Session task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ExtractionController {
    fn drop(&mut self) {
        if let Some(session) = self.current.take() {
            if session.shared.status() == SessionStatus::Active {
                session.shared.abort();
            }
        }
    }
}

async fn run_session(
    backend: Arc<dyn ExtractionBackend>,
    shared: Arc<SessionShared>,
    request: ExtractRequest,
) {
    let outcome = match shared.mode {
        SessionMode::Streaming => run_streaming(backend.as_ref(), &shared, &request).await,
        SessionMode::Regular => run_regular(backend.as_ref(), &shared, &request).await,
    };

    match outcome {
        Some(outcome) => {
            shared.finish(outcome);
        }
        None => debug!(session_id = %shared.id, "Session task stopped after cancellation"),
    }
}

/// Read and classify the event stream until a terminal event.
/// Returns `None` when cancelled.
async fn run_streaming(
    backend: &dyn ExtractionBackend,
    shared: &SessionShared,
    request: &ExtractRequest,
) -> Option<SessionOutcome> {
    let cancel_token = shared.cancel_token.clone();

    let opened = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => return None,
        opened = backend.open_stream(request) => opened,
    };
    let stream = match opened {
        Ok(stream) => stream,
        Err(e) => return Some(SessionOutcome::failed(e.to_string())),
    };

    let mut lease = StreamLease::new(stream, cancel_token, shared.id);
    let mut decoder = RecordDecoder::new();

    loop {
        match lease.next_chunk().await {
            ReadOutcome::Chunk(chunk) => {
                for record in decoder.push(&chunk) {
                    if let Some(outcome) = handle_record(shared, &record) {
                        return Some(outcome);
                    }
                }
            }
            ReadOutcome::Closed => {
                if let Some(record) = decoder.finish() {
                    if let Some(outcome) = handle_record(shared, &record) {
                        return Some(outcome);
                    }
                }
                return Some(SessionOutcome::failed(STREAM_ENDED_REASON));
            }
            ReadOutcome::Failed(e) => return Some(SessionOutcome::failed(e.to_string())),
            ReadOutcome::Cancelled => return None,
        }
    }
}

/// Classify one record; progress is applied in place, terminal events are returned.
fn handle_record(shared: &SessionShared, record: &str) -> Option<SessionOutcome> {
    match classify(record)? {
        ExtractionEvent::Progress { message, .. } => {
            shared.record_progress(message);
            None
        }
        ExtractionEvent::Result { recipe } => Some(SessionOutcome::Succeeded { recipe }),
        ExtractionEvent::Error { message } => Some(SessionOutcome::failed(message)),
    }
}

/// Single request/response. Returns `None` when aborted.
async fn run_regular(
    backend: &dyn ExtractionBackend,
    shared: &SessionShared,
    request: &ExtractRequest,
) -> Option<SessionOutcome> {
    let response = tokio::select! {
        biased;
        _ = shared.cancel_token.cancelled() => return None,
        response = backend.extract(request) => response,
    };

    Some(match response {
        Ok(response) => match response.into_outcome() {
            Ok(recipe) => SessionOutcome::Succeeded { recipe },
            Err(reason) => SessionOutcome::failed(reason),
        },
        Err(e) => SessionOutcome::failed(e.to_string()),
    })
}
