//! Downstream WebSocket transport
//!
//! Each accepted socket gets one task and one bounded outbound channel. The
//! task forwards engine messages to the socket and client requests to the
//! engine; it holds no relay state of its own. When the socket closes for
//! any reason the task reports `SessionClosed` so the engine can release
//! the session's subscriptions and identity.

use axum::{
    extract::{
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::stream::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::engine::EngineEvent;
use crate::protocol::ClientRequest;

/// Shared handler state: the engine inbox plus per-session channel sizing.
#[derive(Clone)]
pub struct AppState {
    pub engine_tx: mpsc::Sender<EngineEvent>,
    pub session_buffer: usize,
}

/// Build the relay's HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel(state.session_buffer);
    let (reply_tx, reply_rx) = oneshot::channel();

    let connected = state
        .engine_tx
        .send(EngineEvent::SessionConnected {
            outbound: outbound_tx,
            reply: reply_tx,
        })
        .await;
    if connected.is_err() {
        warn!("Engine unavailable; rejecting session");
        return;
    }
    let Ok(session) = reply_rx.await else {
        warn!("Engine dropped session reply; closing socket");
        return;
    };

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                // The engine closed the channel; nothing more to forward.
                let Some(message) = outbound else { break };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(error) => {
                        warn!(session, %error, "Failed to encode outbound message");
                        continue;
                    }
                };
                if socket.send(Message::Text(Utf8Bytes::from(json))).await.is_err() {
                    break;
                }
            }
            inbound = socket.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(request) = serde_json::from_str::<ClientRequest>(&text) else {
                            debug!(session, %text, "Ignoring malformed client request");
                            continue;
                        };
                        let event = EngineEvent::SessionRequest { session, request };
                        if state.engine_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        debug!(session, %error, "Socket error");
                        break;
                    }
                }
            }
        }
    }

    debug!(session, "Session socket closed");
    let _ = state
        .engine_tx
        .send(EngineEvent::SessionClosed { session })
        .await;
}
