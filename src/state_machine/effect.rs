//! Effects produced by state transitions

use super::state::ChatMessage;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a response stream on the session for this turn
    OpenStream { turn_id: String, text: String },

    /// Stop consuming the running stream
    AbortStream,

    /// The message at `index` was appended or rewritten
    NotifyMessage { index: usize, message: ChatMessage },

    /// Phase or error banner changed
    NotifyState,

    /// The send cycle finished, whatever the outcome
    NotifyTurnDone,
}

impl Effect {
    pub fn notify_message(index: usize, message: &ChatMessage) -> Self {
        Effect::NotifyMessage {
            index,
            message: message.clone(),
        }
    }
}
