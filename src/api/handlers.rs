//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::sse::sse_stream;
use super::types::{CancelResponse, ChatRequest, ChatResponse, ErrorResponse, ModelResponse};
use super::AppState;
use crate::render::ChatView;
use crate::runtime::{SseEvent, SubmitError};
use crate::state_machine::TransitionError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the chat page
        .route("/", get(serve_spa))
        // Static assets (embedded or filesystem fallback)
        .route("/assets/*path", get(serve_static))
        // Conversation snapshot
        .route("/api/conversation", get(get_conversation))
        // SSE streaming
        .route("/api/stream", get(stream_conversation))
        // User actions
        .route("/api/chat", post(send_chat))
        .route("/api/cancel", post(cancel_chat))
        // Model info
        .route("/api/model", get(get_model))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Page
// ============================================================

async fn serve_spa() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - UI not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Conversation
// ============================================================

async fn get_conversation(State(state): State<AppState>) -> Json<ChatView> {
    Json(ChatView::from_state(&state.runtime.snapshot()))
}

async fn stream_conversation(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before taking the snapshot so no update falls in between
    let broadcast_rx = state.runtime.subscribe();
    let view = ChatView::from_state(&state.runtime.snapshot());

    sse_stream(
        SseEvent::Init { view },
        broadcast_rx,
        state.runtime.watch_state(),
        state.runtime.shutdown_token(),
    )
}

// ============================================================
// User Actions
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    let turn_id = state.runtime.submit(&req.text).await?;

    tracing::debug!(turn_id = %turn_id, chars = req.text.chars().count(), "Message queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(ChatResponse {
            queued: true,
            turn_id,
        }),
    ))
}

async fn cancel_chat(State(state): State<AppState>) -> Result<Json<CancelResponse>, AppError> {
    state.runtime.cancel().await?;
    Ok(Json(CancelResponse { ok: true }))
}

// ============================================================
// Model Info
// ============================================================

async fn get_model(State(state): State<AppState>) -> Json<ModelResponse> {
    let model = state
        .runtime
        .model_id()
        .map_or_else(|| state.model.clone(), ToString::to_string);
    Json(ModelResponse {
        model,
        available: state.runtime.model_id().is_some(),
    })
}

async fn get_version() -> &'static str {
    concat!("cyberguard ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl From<SubmitError> for AppError {
    fn from(error: SubmitError) -> Self {
        let message = error.to_string();
        match error {
            SubmitError::Rejected(TransitionError::BlankInput) => AppError::BadRequest(message),
            SubmitError::Rejected(
                TransitionError::AgentBusy | TransitionError::CancellationInProgress,
            ) => AppError::Conflict(message),
            SubmitError::Rejected(TransitionError::SessionUnavailable) | SubmitError::Closed => {
                AppError::Unavailable(message)
            }
            SubmitError::Rejected(TransitionError::InvalidTransition(_)) => {
                AppError::Internal(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
