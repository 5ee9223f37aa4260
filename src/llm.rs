//! Generative model abstraction
//!
//! The remote model is an opaque collaborator: a request goes in, a lazy
//! sequence of text fragments comes out.

mod error;
pub mod gemini;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::GeminiService;
pub use types::*;

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for streaming chat providers
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Open a response stream for the request.
    ///
    /// Errors returned here mean no fragment was produced; errors yielded by
    /// the stream end it.
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: ChatModel + ?Sized> ChatModel for Arc<T> {
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, LlmError> {
        (**self).stream(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for chat models
pub struct LoggingModel {
    inner: Arc<dyn ChatModel>,
    model_id: String,
}

impl LoggingModel {
    pub fn new(inner: Arc<dyn ChatModel>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl ChatModel for LoggingModel {
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, LlmError> {
        let start = Instant::now();
        let inner = match self.inner.stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    transient = e.kind.is_transient(),
                    "Model stream failed to open"
                );
                return Err(e);
            }
        };

        tracing::info!(
            model = %self.model_id,
            duration_ms = %start.elapsed().as_millis(),
            turns = request.contents.len(),
            "Model stream opened"
        );

        let model_id = self.model_id.clone();
        let logged = async_stream::stream! {
            let mut inner = inner;
            let mut fragments = 0usize;
            let mut bytes = 0usize;

            while let Some(item) = inner.next().await {
                match &item {
                    Ok(fragment) => {
                        fragments += 1;
                        bytes += fragment.text.len();
                    }
                    Err(e) => {
                        tracing::error!(
                            model = %model_id,
                            duration_ms = %start.elapsed().as_millis(),
                            fragments,
                            error = %e.message,
                            kind = e.kind.as_str(),
                            "Model stream failed"
                        );
                    }
                }
                yield item;
            }

            tracing::info!(
                model = %model_id,
                duration_ms = %start.elapsed().as_millis(),
                fragments,
                bytes,
                "Model stream completed"
            );
        };

        Ok(logged.boxed())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
