//! Model session handle
//!
//! One `ChatSession` exists per process. It is created at startup, bound to
//! the system instruction, and passed explicitly to whatever sends turns.
//! It owns the remote conversation history: the displayed conversation is a
//! client-side mirror and is never replayed to the model.

use crate::config::ChatConfig;
use crate::llm::{
    ChatModel, ChatRequest, FragmentStream, GeminiService, LlmError, LoggingModel, Turn,
};
use crate::system_prompt::load_system_instruction;
use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Why the session could not be created.
///
/// `Display` is the banner text shown to the user; `detail` is for logs.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("API key is missing. Please set the API_KEY environment variable.")]
    MissingCredential,
    #[error("Failed to initialize the chat model. Please check your API key and configuration.")]
    Construction { detail: String },
}

impl InitError {
    fn construction(detail: impl Into<String>) -> Self {
        InitError::Construction {
            detail: detail.into(),
        }
    }
}

/// Handle to a stateful remote conversation
pub struct ChatSession {
    model: Arc<dyn ChatModel>,
    system_instruction: String,
    history: Arc<Mutex<Vec<Turn>>>,
}

impl ChatSession {
    pub fn new(model: Arc<dyn ChatModel>, system_instruction: impl Into<String>) -> Self {
        Self {
            model,
            system_instruction: system_instruction.into(),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create the process-wide session from configuration
    pub fn initialize(config: &ChatConfig) -> Result<Self, InitError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or(InitError::MissingCredential)?;

        if api_key
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(InitError::construction(
                "API key contains whitespace or control characters",
            ));
        }

        let system_instruction = load_system_instruction(config.system_prompt_path.as_deref())
            .map_err(|e| InitError::construction(format!("system prompt: {e}")))?;

        let service = GeminiService::new(
            api_key,
            config.model.clone(),
            &config.base_url,
            config.request_timeout,
        )
        .map_err(|e| InitError::construction(e.message))?;

        let model: Arc<dyn ChatModel> = Arc::new(LoggingModel::new(Arc::new(service)));
        Ok(Self::new(model, system_instruction))
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Snapshot of committed remote history
    pub fn history(&self) -> Vec<Turn> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Send one user turn and stream the reply.
    ///
    /// The turn pair is committed to history only when the stream is
    /// exhausted without error; a failed or abandoned stream leaves history
    /// as it was.
    pub async fn send_message_stream(&self, text: &str) -> Result<FragmentStream, LlmError> {
        let mut contents = self.history();
        contents.push(Turn::user(text));

        let request = ChatRequest {
            system_instruction: self.system_instruction.clone(),
            contents,
        };

        let mut inner = self.model.stream(&request).await?;
        let history = Arc::clone(&self.history);
        let user_text = text.to_string();

        let stream = async_stream::stream! {
            let mut reply = String::new();
            let mut failed = false;

            while let Some(item) = inner.next().await {
                match item {
                    Ok(fragment) => {
                        reply.push_str(&fragment.text);
                        yield Ok(fragment);
                    }
                    Err(e) => {
                        failed = true;
                        yield Err(e);
                        break;
                    }
                }
            }

            if !failed {
                let mut turns = history.lock().unwrap_or_else(PoisonError::into_inner);
                turns.push(Turn::user(user_text));
                turns.push(Turn::model(reply));
            }
        };

        Ok(stream.boxed())
    }
}
