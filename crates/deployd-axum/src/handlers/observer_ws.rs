//! WebSocket handler for UI observers.
//!
//! `GET /api/ws` upgrades to a text WebSocket carrying JSON frames tagged by
//! the `_` field.
//!
//! On connect the observer receives the current server, VCS and build state,
//! then the whole retained log history, then live updates. Inbound frames are
//! [`ObserverCommand`]s forwarded to the lifecycle engine. A frame that does
//! not decode is logged and dropped; the connection stays open.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use deployd_core::protocol::{decode, encode};
use deployd_core::{Observer, ObserverCommand};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::state::AppState;

/// `GET /api/ws` - observer WebSocket upgrade endpoint.
pub async fn observer_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_observer_ws(socket, state))
}

async fn handle_observer_ws(socket: WebSocket, state: AppState) {
    let (observer, mut outbound) = Observer::channel();
    let id = observer.id();

    // State first, then history. Both hubs hold a clone of the sender; the
    // egress loop ends once both have released it.
    state.states.join(observer.clone());
    state.logs.join(observer);
    info!(observer = %id, "Observer connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut egress = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match encode(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode observer message");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let engine = state.engine.clone();
    let mut ingest = tokio::spawn(async move {
        while let Some(frame) = ws_receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => match decode::<ObserverCommand>(text.as_str()) {
                    Ok(command) => {
                        debug!(observer = %id, ?command, "Observer command");
                        if !engine.command(command) {
                            debug!("Lifecycle engine stopped, dropping command");
                        }
                    }
                    Err(e) => warn!(observer = %id, error = %e, frame = %text.as_str(), "Invalid observer frame"),
                },
                Ok(Message::Close(_)) | Err(_) => break,
                // Ignore ping/pong and binary frames.
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut ingest => { egress.abort(); }
        _ = &mut egress => { ingest.abort(); }
    }

    state.states.leave(id);
    state.logs.leave(id);
    info!(observer = %id, "Observer disconnected");
}
