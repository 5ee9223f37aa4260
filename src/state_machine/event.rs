//! Events that can occur in a conversation

use crate::llm::LlmErrorKind;

/// Events that trigger state transitions.
///
/// Stream events carry the `turn_id` of the send that opened the stream so
/// late events from an abandoned stream can be told apart.
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
        turn_id: String,
    },
    UserCancel,

    // Stream events
    StreamFragment {
        turn_id: String,
        text: String,
    },
    StreamComplete {
        turn_id: String,
    },
    StreamFailed {
        turn_id: String,
        message: String,
        kind: LlmErrorKind,
    },
    StreamAborted {
        turn_id: String,
    },
}

impl Event {
    pub fn user_message(text: impl Into<String>, turn_id: impl Into<String>) -> Self {
        Event::UserMessage {
            text: text.into(),
            turn_id: turn_id.into(),
        }
    }

    pub fn fragment(turn_id: impl Into<String>, text: impl Into<String>) -> Self {
        Event::StreamFragment {
            turn_id: turn_id.into(),
            text: text.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::UserMessage { .. } => "user_message",
            Event::UserCancel => "user_cancel",
            Event::StreamFragment { .. } => "stream_fragment",
            Event::StreamComplete { .. } => "stream_complete",
            Event::StreamFailed { .. } => "stream_failed",
            Event::StreamAborted { .. } => "stream_aborted",
        }
    }
}
