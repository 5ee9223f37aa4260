//! Common types for model interactions

use super::LlmError;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Speaker of a turn in the remote conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One complete turn of remote conversation history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Streaming chat request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_instruction: String,
    /// Prior turns followed by the new user turn
    pub contents: Vec<Turn>,
}

/// One incremental piece of a streamed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
}

impl Fragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Lazy, finite, non-restartable sequence of fragments
pub type FragmentStream = BoxStream<'static, Result<Fragment, LlmError>>;
