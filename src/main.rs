//! CyberGuard - ethical cybersecurity chat assistant
//!
//! Serves a single-page chat UI and streams replies from a hosted
//! generative model into it.

mod api;
mod config;
mod llm;
mod render;
mod runtime;
mod session;
mod state_machine;
mod system_prompt;

use api::{create_router, AppState};
use config::ChatConfig;
use runtime::RuntimeHandle;
use session::{ChatSession, InitError};
use state_machine::ChatState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cyberguard=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ChatConfig::from_env();

    // A failed session is not fatal: the UI shows the banner and refuses sends
    let (session, initial) = match ChatSession::initialize(&config) {
        Ok(session) => {
            tracing::info!(
                model = %session.model_id(),
                base_url = %config.base_url,
                instruction_chars = session.system_instruction().chars().count(),
                "Chat session initialized"
            );
            (Some(Arc::new(session)), ChatState::ready())
        }
        Err(e) => {
            match &e {
                InitError::MissingCredential => {
                    tracing::warn!("No API key configured. Set API_KEY or GEMINI_API_KEY.");
                }
                InitError::Construction { detail } => {
                    tracing::error!(detail = %detail, "Failed to initialize chat session");
                }
            }
            (None, ChatState::unavailable(e.to_string()))
        }
    };

    let shutdown = CancellationToken::new();
    let (runtime, runtime_task) = RuntimeHandle::spawn(session, initial, shutdown.clone());
    let state = AppState::new(runtime, config.model.clone());

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("CyberGuard server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // Covers the server exiting on its own as well as Ctrl-C
    shutdown.cancel();
    runtime_task.await?;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            tracing::info!("Shutdown signal received");
        }
        () = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
