//! Conversation runtime executor

use super::SseEvent;

use crate::llm::LlmError;
use crate::session::ChatSession;
use crate::state_machine::{transition, ChatState, Effect, Event, TransitionError};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Event loop owning the conversation state
pub struct ChatRuntime {
    state: ChatState,
    session: Option<Arc<ChatSession>>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    state_tx: watch::Sender<ChatState>,
    /// Token to cancel the running stream task
    stream_cancel: Option<CancellationToken>,
    shutdown: CancellationToken,
}

impl ChatRuntime {
    pub fn new(
        state: ChatState,
        session: Option<Arc<ChatSession>>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        state_tx: watch::Sender<ChatState>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state,
            session,
            event_rx,
            event_tx,
            broadcast_tx,
            state_tx,
            stream_cancel: None,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            phase = self.state.phase.name(),
            model = self.session.as_ref().map(|s| s.model_id()),
            "Starting conversation runtime"
        );

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.process_event(event) {
                        tracing::warn!(error = %e, "Event rejected");
                        let _ = self.broadcast_tx.send(SseEvent::Error {
                            message: e.to_string(),
                        });
                    }
                }

                else => break,
            }
        }

        // Stop consuming any reply still streaming
        if let Some(token) = self.stream_cancel.take() {
            token.cancel();
        }

        tracing::info!("Conversation runtime stopped");
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let name = event.name();
        if let Event::StreamFailed {
            turn_id,
            message,
            kind,
        } = &event
        {
            tracing::warn!(
                turn_id = %turn_id,
                kind = kind.as_str(),
                transient = kind.is_transient(),
                error = %message,
                "Reply stream failed"
            );
        }
        let result = transition(&self.state, event)?;

        tracing::debug!(
            event = name,
            phase = result.new_state.phase.name(),
            turn_id = result.new_state.phase.turn_id(),
            effects = result.effects.len(),
            "Transition applied"
        );

        self.state = result.new_state;
        self.state_tx.send_replace(self.state.clone());

        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::OpenStream { turn_id, text } => self.open_stream(turn_id, text),

            Effect::AbortStream => {
                if let Some(token) = &self.stream_cancel {
                    tracing::info!("Cancelling reply stream");
                    token.cancel();
                }
            }

            Effect::NotifyMessage { index, message } => {
                let _ = self
                    .broadcast_tx
                    .send(SseEvent::Message { index, message });
            }

            Effect::NotifyState => {
                let _ = self.broadcast_tx.send(SseEvent::StateChange {
                    phase: self.state.phase.clone(),
                    error: self.state.error.clone(),
                    typing: self.state.is_typing(),
                });
            }

            Effect::NotifyTurnDone => {
                self.stream_cancel = None;
                let _ = self.broadcast_tx.send(SseEvent::TurnDone);
            }
        }
    }

    fn open_stream(&mut self, turn_id: String, text: String) {
        let cancel_token = CancellationToken::new();
        self.stream_cancel = Some(cancel_token.clone());

        let session = self.session.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let Some(session) = session else {
                // Sends are refused while unavailable, so this is unreachable
                // through the reducer; fail the turn rather than hang it.
                let _ = event_tx
                    .send(stream_failed(
                        turn_id,
                        &LlmError::unknown("no chat session available"),
                    ))
                    .await;
                return;
            };

            tracing::info!(turn_id = %turn_id, "Streaming reply (background)");

            // Race the whole stream against cancellation. Dropping the
            // stream on cancel leaves the session history untouched.
            let terminal = tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(turn_id = %turn_id, "Reply stream cancelled");
                    Event::StreamAborted { turn_id: turn_id.clone() }
                }

                event = consume_stream(&session, &turn_id, &text, &event_tx) => event,
            };

            let _ = event_tx.send(terminal).await;
        });
    }
}

/// Forward fragments as events and return the terminal event
async fn consume_stream(
    session: &ChatSession,
    turn_id: &str,
    text: &str,
    event_tx: &mpsc::Sender<Event>,
) -> Event {
    let mut stream = match session.send_message_stream(text).await {
        Ok(stream) => stream,
        Err(e) => return stream_failed(turn_id.to_string(), &e),
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                if event_tx
                    .send(Event::fragment(turn_id, fragment.text))
                    .await
                    .is_err()
                {
                    // Runtime gone; nobody is listening for the rest
                    return Event::StreamAborted {
                        turn_id: turn_id.to_string(),
                    };
                }
            }
            Err(e) => return stream_failed(turn_id.to_string(), &e),
        }
    }

    Event::StreamComplete {
        turn_id: turn_id.to_string(),
    }
}

fn stream_failed(turn_id: String, error: &LlmError) -> Event {
    Event::StreamFailed {
        turn_id,
        message: error.message.clone(),
        kind: error.kind,
    }
}
