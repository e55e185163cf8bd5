//! WebSocket handler for the supervised server's control connection.
//!
//! The server is launched with `--ipc-url ws://localhost:<port>/ipc/server`
//! and dials back here. The connection becomes the active peer of the
//! [`ControlChannel`](deployd_runtime::ControlChannel); outbound control
//! messages are written as text frames, inbound frames are decoded and
//! forwarded to the lifecycle engine.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use deployd_core::protocol::encode;
use deployd_runtime::ipc::ControlPeer;
use tracing::{debug, warn};

use crate::state::AppState;

/// `GET /ipc/server` - control channel WebSocket upgrade endpoint.
pub async fn control_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_control_ws(socket, state))
}

async fn handle_control_ws(mut socket: WebSocket, state: AppState) {
    let ControlPeer { id, mut outbound } = state.control.attach();

    loop {
        tokio::select! {
            message = outbound.recv() => {
                // None: replaced by a newer peer.
                let Some(message) = message else { break };
                let text = match encode(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(%id, error = %e, "Failed to encode control message");
                        state.control.undelivered(id, message);
                        continue;
                    }
                };
                if let Err(e) = socket.send(Message::Text(text.into())).await {
                    warn!(%id, error = %e, ?message, "Failed to write control message");
                    state.control.undelivered(id, message);
                    break;
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        // Errors are logged by the channel; keep the connection.
                        let _ = state.control.receive_text(id, text.as_str());
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            () = state.shutdown.cancelled() => {
                debug!(%id, "Closing control connection on shutdown");
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    state.control.detach(id);

    // Anything still queued was accepted for this peer and will never be written.
    while let Ok(message) = outbound.try_recv() {
        state.control.undelivered(id, message);
    }
}
