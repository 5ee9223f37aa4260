//! Conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions. The
//! runtime feeds events in and executes the effects that come out.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{Author, ChatMessage, ChatPhase, ChatState, MessageBody, STREAM_ERROR_TEXT};
pub use transition::{transition, TransitionError};
