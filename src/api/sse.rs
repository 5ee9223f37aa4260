//! Server-Sent Events support

use crate::render::{render_bubble, ChatView};
use crate::runtime::SseEvent;
use crate::state_machine::ChatState;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Convert broadcast stream to SSE stream.
///
/// The stream ends when `shutdown` fires so open connections do not hold up
/// graceful shutdown.
pub fn sse_stream(
    init_event: SseEvent,
    broadcast_rx: broadcast::Receiver<SseEvent>,
    state_rx: watch::Receiver<ChatState>,
    shutdown: CancellationToken,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = event_stream(init_event, broadcast_rx, state_rx)
        .map(|event| Ok(sse_event_to_axum(event)));

    let combined = futures::StreamExt::take_until(events, shutdown.cancelled_owned());

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Init event followed by live updates.
///
/// A receiver that lagged has lost updates for good, so it gets a fresh
/// `init` built from the latest state in their place.
fn event_stream(
    init_event: SseEvent,
    broadcast_rx: broadcast::Receiver<SseEvent>,
    state_rx: watch::Receiver<ChatState>,
) -> impl Stream<Item = SseEvent> {
    let init = futures::stream::once(async move { init_event });

    let updates = BroadcastStream::new(broadcast_rx).map(move |result| match result {
        Ok(event) => event,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "SSE client lagged, resending snapshot");
            SseEvent::Init {
                view: ChatView::from_state(&state_rx.borrow()),
            }
        }
    });

    init.chain(updates)
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let (event_type, data) = sse_event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}

fn sse_event_payload(event: SseEvent) -> (&'static str, serde_json::Value) {
    match event {
        SseEvent::Init { view } => (
            "init",
            json!({
                "type": "init",
                "view": view
            }),
        ),
        SseEvent::Message { index, message } => (
            "message",
            json!({
                "type": "message",
                "index": index,
                // null when the bubble is hidden (blank placeholder)
                "bubble": render_bubble(index, &message),
                "message": message
            }),
        ),
        SseEvent::StateChange {
            phase,
            error,
            typing,
        } => (
            "state_change",
            json!({
                "type": "state_change",
                "state": phase,
                "in_flight": phase.is_in_flight(),
                "typing": typing,
                "error": error
            }),
        ),
        SseEvent::TurnDone => (
            "turn_done",
            json!({
                "type": "turn_done"
            }),
        ),
        SseEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    }
}
