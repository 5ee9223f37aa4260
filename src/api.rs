//! HTTP API for the chat UI

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::RuntimeHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: RuntimeHandle,
    /// Configured model, reported even when no session could be created
    pub model: String,
}

impl AppState {
    pub fn new(runtime: RuntimeHandle, model: impl Into<String>) -> Self {
        Self {
            runtime,
            model: model.into(),
        }
    }
}
