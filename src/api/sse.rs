//! Server-Sent Events support
//!
//! Each connection starts with an `init` event carrying the full snapshot,
//! then relays store changes as they happen until the server shuts down.

use crate::chat::{ChatEvent, Snapshot};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    snapshot: Snapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<ChatEvent>,
    shutdown: CancellationToken,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(init_event(&snapshot)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(chat_event_to_axum(event))),
        Err(e) => {
            // Page reloads the snapshot on its next connect
            tracing::warn!(error = %e, "SSE subscriber lagged; events skipped");
            None
        }
    });

    // Graceful shutdown waits on open connections
    let events = futures::StreamExt::take_until(init.chain(broadcasts), shutdown.cancelled_owned());

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_event(snapshot: &Snapshot) -> Event {
    let data = json!({
        "type": "init",
        "messages": snapshot.messages,
        "busy": snapshot.busy,
        "display": snapshot.display,
        "started": snapshot.started,
    });
    Event::default().event("init").data(data.to_string())
}

fn chat_event_to_axum(event: ChatEvent) -> Event {
    let (event_type, data) = match event {
        ChatEvent::MessageAppended { message } => (
            "message",
            json!({
                "type": "message",
                "message": message
            }),
        ),
        ChatEvent::MessageUpdated { id, text } => (
            "message_update",
            json!({
                "type": "message_update",
                "id": id,
                "text": text
            }),
        ),
        ChatEvent::DisplayChanged { display } => (
            "display",
            json!({
                "type": "display",
                "display": display
            }),
        ),
        ChatEvent::BusyChanged { busy } => (
            "busy",
            json!({
                "type": "busy",
                "busy": busy
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
