//! Pure state transition function
//!
//! Given the same state and event it always produces the same new state and
//! effects; all I/O is described by the returned effects.

use super::state::{ChatMessage, ChatPhase, ChatState, MessageBody, STREAM_ERROR_TEXT};
use super::{Effect, Event};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// No change, no effects
    pub fn unchanged(state: &ChatState) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Reasons a send is refused. The state is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Message is empty")]
    BlankInput,
    #[error("A reply is still streaming, wait for it to finish or cancel it")]
    AgentBusy,
    #[error("Cancellation in progress")]
    CancellationInProgress,
    #[error("Chat session is unavailable")]
    SessionUnavailable,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(state: &ChatState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (&state.phase, event) {
        // ============================================================
        // Send
        // ============================================================
        (_, Event::UserMessage { text, .. }) if text.trim().is_empty() => {
            Err(TransitionError::BlankInput)
        }

        (ChatPhase::Streaming { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::AgentBusy)
        }

        (ChatPhase::Cancelling { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::CancellationInProgress)
        }

        (ChatPhase::Unavailable, Event::UserMessage { .. }) => {
            Err(TransitionError::SessionUnavailable)
        }

        // Idle + UserMessage -> Streaming, with user message and placeholder appended
        (ChatPhase::Idle, Event::UserMessage { text, turn_id }) => {
            let mut new_state = state.clone();
            new_state.error = None;

            let user_index = new_state.messages.len();
            new_state.messages.push(ChatMessage::user(text.clone()));
            new_state.messages.push(ChatMessage::placeholder());
            new_state.phase = ChatPhase::Streaming {
                turn_id: turn_id.clone(),
            };

            let effects = [
                Effect::notify_message(user_index, &new_state.messages[user_index]),
                Effect::notify_message(user_index + 1, &new_state.messages[user_index + 1]),
                Effect::NotifyState,
                Effect::OpenStream { turn_id, text },
            ];
            Ok(TransitionResult::new(new_state).with_effects(effects))
        }

        // ============================================================
        // Streaming
        // ============================================================

        // Each fragment extends the pending reply in place
        (ChatPhase::Streaming { turn_id: current }, Event::StreamFragment { turn_id, text })
            if *current == turn_id =>
        {
            let mut new_state = state.clone();
            let (index, last) = pending_reply(&mut new_state)?;
            if let MessageBody::Pending { partial } = &mut last.body {
                partial.push_str(&text);
            }
            let effect = Effect::notify_message(index, last);
            Ok(TransitionResult::new(new_state).with_effect(effect))
        }

        // Failure discards whatever partial text arrived
        (ChatPhase::Streaming { turn_id: current }, Event::StreamFailed { turn_id, message, .. })
            if *current == turn_id =>
        {
            finish_turn(
                state,
                |_| MessageBody::Failed { reason: message },
                Some(STREAM_ERROR_TEXT),
            )
        }

        // Normal end of stream, a stream stopped by runtime shutdown, or any
        // terminal event once cancel was requested: keep the text, no banner
        (
            ChatPhase::Streaming { turn_id: current },
            Event::StreamComplete { turn_id } | Event::StreamAborted { turn_id },
        )
        | (
            ChatPhase::Cancelling { turn_id: current },
            Event::StreamComplete { turn_id }
            | Event::StreamAborted { turn_id }
            | Event::StreamFailed { turn_id, .. },
        ) if *current == turn_id => {
            finish_turn(state, |partial| MessageBody::Complete { text: partial }, None)
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (ChatPhase::Streaming { turn_id }, Event::UserCancel) => {
            let mut new_state = state.clone();
            new_state.phase = ChatPhase::Cancelling {
                turn_id: turn_id.clone(),
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::AbortStream)
                .with_effect(Effect::NotifyState))
        }

        // Cancel with nothing in flight, fragments racing an abort, and stream
        // events from a turn that already finished are all no-ops
        (_, Event::UserCancel | Event::StreamFragment { .. })
        | (
            _,
            Event::StreamComplete { .. } | Event::StreamFailed { .. } | Event::StreamAborted { .. },
        ) => Ok(TransitionResult::unchanged(state)),
    }
}

/// The pending reply, which is always the last message while in flight
fn pending_reply(state: &mut ChatState) -> Result<(usize, &mut ChatMessage), TransitionError> {
    let index = state.messages.len().checked_sub(1);
    match (index, state.messages.last_mut()) {
        (Some(index), Some(last)) if last.is_pending() => Ok((index, last)),
        _ => Err(TransitionError::InvalidTransition(
            "in flight without a pending reply".to_string(),
        )),
    }
}

/// Close the pending reply, return to Idle and report the turn as done
fn finish_turn(
    state: &ChatState,
    finalize: impl FnOnce(String) -> MessageBody,
    banner: Option<&str>,
) -> Result<TransitionResult, TransitionError> {
    let mut new_state = state.clone();
    let (index, last) = pending_reply(&mut new_state)?;

    let partial = match std::mem::replace(
        &mut last.body,
        MessageBody::Complete {
            text: String::new(),
        },
    ) {
        MessageBody::Pending { partial } => partial,
        MessageBody::Complete { text } => text,
        MessageBody::Failed { reason } => reason,
    };
    last.body = finalize(partial);
    let message_effect = Effect::notify_message(index, last);

    new_state.phase = ChatPhase::Idle;
    if let Some(banner) = banner {
        new_state.error = Some(banner.to_string());
    }

    Ok(TransitionResult::new(new_state)
        .with_effect(message_effect)
        .with_effect(Effect::NotifyState)
        .with_effect(Effect::NotifyTurnDone))
}
