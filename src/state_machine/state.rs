//! Conversation state types

use crate::system_prompt::INTRO_MESSAGE;
use serde::{Deserialize, Serialize};

/// Text shown in place of a reply whose stream failed
pub const STREAM_ERROR_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Model,
}

/// Lifecycle of a message body.
///
/// Only a model reply is ever `Pending`, and only while its stream runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MessageBody {
    Pending { partial: String },
    Complete { text: String },
    /// `reason` is diagnostic; the displayed text is [`STREAM_ERROR_TEXT`]
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: Author,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            author: Author::User,
            body: MessageBody::Complete { text: text.into() },
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            author: Author::Model,
            body: MessageBody::Complete { text: text.into() },
        }
    }

    pub fn placeholder() -> Self {
        Self {
            author: Author::Model,
            body: MessageBody::Pending {
                partial: String::new(),
            },
        }
    }

    /// Text as displayed
    pub fn text(&self) -> &str {
        match &self.body {
            MessageBody::Pending { partial } => partial,
            MessageBody::Complete { text } => text,
            MessageBody::Failed { .. } => STREAM_ERROR_TEXT,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.body, MessageBody::Pending { .. })
    }
}

/// Where the conversation is in its send cycle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatPhase {
    /// No session handle; sends are impossible for the process lifetime
    Unavailable,

    /// Ready for a new send
    #[default]
    Idle,

    /// A reply is streaming into the last message
    Streaming { turn_id: String },

    /// Abort requested, waiting for the stream task to acknowledge
    Cancelling { turn_id: String },
}

impl ChatPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ChatPhase::Streaming { .. } | ChatPhase::Cancelling { .. })
    }

    pub fn turn_id(&self) -> Option<&str> {
        match self {
            ChatPhase::Streaming { turn_id } | ChatPhase::Cancelling { turn_id } => Some(turn_id),
            ChatPhase::Unavailable | ChatPhase::Idle => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChatPhase::Unavailable => "unavailable",
            ChatPhase::Idle => "idle",
            ChatPhase::Streaming { .. } => "streaming",
            ChatPhase::Cancelling { .. } => "cancelling",
        }
    }
}

/// Complete client-visible conversation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    pub phase: ChatPhase,
    /// Banner text; cleared at the start of each send
    pub error: Option<String>,
}

impl ChatState {
    /// Fresh conversation for a live session, seeded with the intro message
    pub fn ready() -> Self {
        Self {
            messages: vec![ChatMessage::model(INTRO_MESSAGE)],
            phase: ChatPhase::Idle,
            error: None,
        }
    }

    /// Degraded state after session initialization failed
    pub fn unavailable(banner: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            phase: ChatPhase::Unavailable,
            error: Some(banner.into()),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase.is_in_flight()
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Whether the typing indicator should show
    pub fn is_typing(&self) -> bool {
        self.is_in_flight() && self.last_message().is_some_and(|m| m.author == Author::Model)
    }
}
