//! Order gateway WebSocket endpoint
//!
//! One bidirectional stream per client: frames in are order messages,
//! frames out are that client's accepted/rejected responses. Protocol
//! failures are answered on the offending connection and the
//! connection stays open; only the broadcast feed sees exchange state.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use tracing::info;
use types::errors::{ProtocolError, RejectReason};
use types::events::ExchangeEvent;
use types::order::OrderRequest;
use types::time::utc_ms;

use crate::actor::ExchangeHandle;

#[derive(Clone)]
pub struct GatewayState {
    handle: ExchangeHandle,
}

/// Router for the order-gateway listener.
pub fn router(handle: ExchangeHandle) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .with_state(GatewayState { handle })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: GatewayState) {
    // Every connection gets a trader id and the live round state first.
    let Some(welcome) = state.handle.connect().await else {
        return;
    };
    if send_event(&mut socket, &welcome).await.is_err() {
        return;
    }
    info!("order client connected");

    while let Some(Ok(message)) = socket.next().await {
        match message {
            Message::Text(text) => {
                let response = match OrderRequest::from_frame(&text) {
                    Ok(order) => match state.handle.submit_order(order).await {
                        Some(response) => response,
                        None => shutdown_rejection(),
                    },
                    Err(err) => protocol_rejection(&err),
                };
                if send_event(&mut socket, &response).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    info!("order client disconnected");
}

async fn send_event(socket: &mut WebSocket, event: &ExchangeEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(frame) => socket.send(Message::Text(frame)).await,
        Err(_) => Ok(()),
    }
}

/// Per-connection rejection for malformed or schema-invalid frames.
fn protocol_rejection(err: &ProtocolError) -> ExchangeEvent {
    ExchangeEvent::OrderRejected {
        reason: err.reject_reason(),
        details: serde_json::json!({"error": err.detail()}),
        trader_id: None,
        client_order_id: None,
        timestamp: utc_ms(),
    }
}

/// Rejection used when the core task is already gone.
fn shutdown_rejection() -> ExchangeEvent {
    ExchangeEvent::OrderRejected {
        reason: RejectReason::ExchangeShuttingDown,
        details: serde_json::json!({"message": "exchange is shutting down"}),
        trader_id: None,
        client_order_id: None,
        timestamp: utc_ms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_rejection_reasons() {
        let err = OrderRequest::from_frame("{bad json").unwrap_err();
        match protocol_rejection(&err) {
            ExchangeEvent::OrderRejected { reason, trader_id, .. } => {
                assert_eq!(reason, RejectReason::InvalidJson);
                assert!(trader_id.is_none());
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        let err = OrderRequest::from_frame("{\"type\":\"order\"}").unwrap_err();
        match protocol_rejection(&err) {
            ExchangeEvent::OrderRejected { reason, .. } => {
                assert_eq!(reason, RejectReason::InvalidMessage)
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}
