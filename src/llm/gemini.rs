//! Google Gemini provider implementation
//!
//! Streams replies from `streamGenerateContent` with `alt=sse`, so every
//! `data:` event of the response body is one partial
//! `GenerateContentResponse`.

use super::types::{ChatRequest, Fragment, FragmentStream, Turn};
use super::{ChatModel, LlmError};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    model: String,
    endpoint: String,
}

impl GeminiService {
    /// Build a client bound to one model.
    ///
    /// The key travels in the `x-goog-api-key` header, so a key that is not a
    /// valid header value is rejected here rather than on the first send.
    pub fn new(
        api_key: &str,
        model: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let model = model.into();

        let mut key_header = HeaderValue::from_str(api_key)
            .map_err(|_| LlmError::invalid_request("API key is not a valid header value"))?;
        key_header.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", key_header);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        let endpoint = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            base_url.trim_end_matches('/'),
            model
        );

        Ok(Self {
            client,
            model,
            endpoint,
        })
    }

    fn translate_request(request: &ChatRequest) -> GeminiRequest {
        let system_instruction = if request.system_instruction.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(&request.system_instruction)],
            })
        };

        let contents = request
            .contents
            .iter()
            .map(|Turn { role, text }| GeminiContent {
                role: Some(role.as_str().to_string()),
                parts: vec![GeminiPart::text(text)],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction,
        }
    }
}

#[async_trait]
impl ChatModel for GeminiService {
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, LlmError> {
        let gemini_request = Self::translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Gemini stream API error response");
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map_or(body, |resp| resp.error.message);
            return Err(LlmError::from_status(
                status.as_u16(),
                format!("HTTP {status}: {message}"),
            ));
        }

        let mut events = Box::pin(response.bytes_stream().eventsource());
        let fragments = async_stream::try_stream! {
            while let Some(event) = events.next().await {
                let event = event
                    .map_err(|e| LlmError::stream(format!("Failed to read response: {e}")))?;
                if event.data.is_empty() {
                    continue;
                }
                if let Some(fragment) = parse_payload(&event.data)? {
                    yield fragment;
                }
            }
        };

        Ok(fragments.boxed())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Decode one streamed `GenerateContentResponse`.
///
/// Returns `None` for payloads that carry no text (usage-only or
/// finish-reason-only chunks).
fn parse_payload(payload: &str) -> Result<Option<Fragment>, LlmError> {
    let chunk: GeminiStreamChunk = serde_json::from_str(payload)
        .map_err(|e| LlmError::stream(format!("Failed to parse stream chunk: {e}")))?;

    if let Some(error) = chunk.error {
        let code = error.code.and_then(|c| u16::try_from(c).ok()).unwrap_or(0);
        return Err(LlmError::from_status(code, error.message));
    }

    let Some(candidate) = chunk.candidates.into_iter().next() else {
        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::invalid_request(format!("Prompt blocked: {reason}")));
        }
        return Ok(None);
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if let Some(reason) = candidate.finish_reason.as_deref() {
        tracing::debug!(finish_reason = %reason, "Gemini candidate finished");
    }

    Ok((!text.is_empty()).then(|| Fragment::new(text)))
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing)]
    thought: bool,
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            thought: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    code: Option<i64>,
}
