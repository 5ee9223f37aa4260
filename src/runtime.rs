//! Runtime for the conversation
//!
//! A single task owns the `ChatState`. Handlers talk to it through a
//! [`RuntimeHandle`]: events go in over an mpsc channel, UI updates come out
//! over a broadcast channel, and the latest state is always readable from a
//! watch channel.

mod executor;


pub use executor::ChatRuntime;

use crate::render::ChatView;
use crate::session::ChatSession;
use crate::state_machine::{
    transition, ChatMessage, ChatPhase, ChatState, Event, TransitionError,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    /// Full snapshot, sent first on every new subscription
    Init { view: ChatView },
    /// The message at `index` was appended or rewritten
    Message { index: usize, message: ChatMessage },
    StateChange {
        phase: ChatPhase,
        error: Option<String>,
        typing: bool,
    },
    /// A send cycle finished, whatever the outcome
    TurnDone,
    Error { message: String },
}

/// Why a submitted message was not queued
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Conversation runtime has stopped")]
    Closed,
}

/// Cloneable handle to the running conversation
#[derive(Clone)]
pub struct RuntimeHandle {
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    state_rx: watch::Receiver<ChatState>,
    model_id: Option<String>,
    shutdown: CancellationToken,
}

impl RuntimeHandle {
    /// Start the runtime task.
    ///
    /// `session` is `None` when initialization failed; `initial` then carries
    /// the banner and the runtime refuses every send.
    pub fn spawn(
        session: Option<Arc<ChatSession>>,
        initial: ChatState,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (broadcast_tx, _) = broadcast::channel(256);
        let (state_tx, state_rx) = watch::channel(initial.clone());
        let model_id = session.as_ref().map(|s| s.model_id().to_string());

        let runtime = ChatRuntime::new(
            initial,
            session,
            event_rx,
            event_tx.clone(),
            broadcast_tx.clone(),
            state_tx,
            shutdown.clone(),
        );
        let task = tokio::spawn(runtime.run());

        let handle = Self {
            event_tx,
            broadcast_tx,
            state_rx,
            model_id,
            shutdown,
        };
        (handle, task)
    }

    /// Queue a user message.
    ///
    /// The send is checked against the latest state first so callers get a
    /// precise rejection. The runtime re-checks when it processes the event;
    /// a send that loses a race there is reported as an SSE error.
    pub async fn submit(&self, text: &str) -> Result<String, SubmitError> {
        let turn_id = uuid::Uuid::new_v4().to_string();
        let event = Event::user_message(text, turn_id.clone());

        let snapshot = self.snapshot();
        transition(&snapshot, event.clone())?;

        self.event_tx
            .send(event)
            .await
            .map_err(|_| SubmitError::Closed)?;
        Ok(turn_id)
    }

    /// Request cancellation of the in-flight reply; a no-op when idle
    pub async fn cancel(&self) -> Result<(), SubmitError> {
        self.event_tx
            .send(Event::UserCancel)
            .await
            .map_err(|_| SubmitError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn snapshot(&self) -> ChatState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that always holds the latest state
    pub fn watch_state(&self) -> watch::Receiver<ChatState> {
        self.state_rx.clone()
    }

    /// Cancelled when the process is shutting down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Model bound to the session, if one exists
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }
}
