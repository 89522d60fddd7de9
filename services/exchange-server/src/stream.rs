//! Event stream WebSocket endpoint
//!
//! Broadcast-only feed: subscribers receive every exchange event in
//! emission order and send nothing. A subscriber that stops draining
//! is dropped by the dispatcher; this handler just forwards frames
//! until either side goes away.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tracing::info;

use crate::dispatch::SubscriberRegistry;

#[derive(Clone)]
pub struct StreamState {
    subscribers: Arc<SubscriberRegistry>,
}

/// Router for the event-stream listener.
pub fn router(subscribers: Arc<SubscriberRegistry>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .with_state(StreamState { subscribers })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<StreamState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: StreamState) {
    info!("event subscriber connected");
    let mut frames = state.subscribers.subscribe();
    let (mut sink, mut source) = socket.split();

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                // Dispatcher dropped us (slow) or shut down.
                None => break,
            },
            inbound = source.next() => match inbound {
                // Clients do not send; anything but a close is ignored.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    info!("event subscriber disconnected");
}
