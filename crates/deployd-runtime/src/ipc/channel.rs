//! Single-peer registry for the control channel.
//!
//! The supervised server dials back to the orchestrator; the transport calls
//! [`ControlChannel::attach`] when it does. Only one peer is active at a
//! time. Inbound frames are decoded here and forwarded, in order, to the
//! event stream the lifecycle engine consumes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use deployd_core::protocol::decode;
use deployd_core::{ControlEvent, ControlMessage, ControlPort, ProtocolError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Identifier of one control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

#[derive(Debug)]
struct Peer {
    id: PeerId,
    tx: mpsc::UnboundedSender<ControlMessage>,
}

/// An attached connection: its id and the queue of outbound messages the
/// transport writes to the socket.
#[derive(Debug)]
pub struct ControlPeer {
    pub id: PeerId,
    pub outbound: mpsc::UnboundedReceiver<ControlMessage>,
}

/// Registry of the one active control peer.
#[derive(Debug)]
pub struct ControlChannel {
    active: Mutex<Option<Peer>>,
    events: mpsc::UnboundedSender<ControlEvent>,
    next_peer: AtomicU64,
}

impl ControlChannel {
    /// Create the channel and the inbound event stream for the engine.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ControlEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let channel = Self {
            active: Mutex::new(None),
            events,
            next_peer: AtomicU64::new(1),
        };
        (channel, rx)
    }

    fn active(&self) -> MutexGuard<'_, Option<Peer>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new connection as the active peer.
    ///
    /// A second peer while one is active is unexpected: it is logged and the
    /// new connection replaces the old one.
    pub fn attach(&self) -> ControlPeer {
        let id = PeerId(self.next_peer.fetch_add(1, Ordering::Relaxed));
        let (tx, outbound) = mpsc::unbounded_channel();

        let replaced = self.active().replace(Peer { id, tx });
        match replaced {
            Some(previous) => warn!(
                %id,
                previous = %previous.id,
                "Control peer connected while another is active, replacing it"
            ),
            None => info!(%id, "Server connected to the control channel"),
        }

        ControlPeer { id, outbound }
    }

    /// Forget `id` if it is still the active peer.
    pub fn detach(&self, id: PeerId) {
        let mut active = self.active();
        if active.as_ref().is_some_and(|peer| peer.id == id) {
            *active = None;
            info!(%id, "Server disconnected from the control channel");
        } else {
            debug!(%id, "Stale control peer closed");
        }
    }

    /// Decode a text frame from `id` and forward it to the engine.
    ///
    /// Frames from a replaced peer are dropped. Undecodable frames are logged
    /// and dropped; the connection stays open.
    pub fn receive_text(&self, id: PeerId, text: &str) -> Result<(), ProtocolError> {
        let message = decode::<ControlMessage>(text).inspect_err(|e| match e {
            ProtocolError::UnknownVariant(tag) => {
                warn!(%id, %tag, "Ignoring unknown control message");
            }
            _ => warn!(%id, error = %e, frame = %text, "Invalid control message"),
        })?;
        self.receive(id, message);
        Ok(())
    }

    /// Forward a decoded message from `id` to the engine.
    pub fn receive(&self, id: PeerId, message: ControlMessage) {
        let current = self.active().as_ref().map(|peer| peer.id);
        if current != Some(id) {
            debug!(%id, ?message, "Dropping message from inactive control peer");
            return;
        }
        debug!(%id, ?message, "Control message received");
        self.forward(ControlEvent::Received(message));
    }

    /// Report that `message`, accepted by [`ControlPort::send`], could not be
    /// written to peer `id`.
    pub fn undelivered(&self, id: PeerId, message: ControlMessage) {
        warn!(%id, ?message, "Control message was not delivered");
        self.forward(ControlEvent::Undelivered(message));
    }

    fn forward(&self, event: ControlEvent) {
        if self.events.send(event).is_err() {
            debug!(?event, "Control event stream closed, dropping event");
        }
    }
}

impl ControlPort for ControlChannel {
    fn send(&self, message: ControlMessage) -> bool {
        let active = self.active();
        let Some(peer) = active.as_ref() else {
            warn!(?message, "No control peer attached, dropping message");
            return false;
        };
        if peer.tx.send(message).is_err() {
            warn!(id = %peer.id, ?message, "Control peer is closing, dropping message");
            return false;
        }
        debug!(id = %peer.id, ?message, "Control message sent");
        true
    }

    fn is_connected(&self) -> bool {
        self.active().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_peer_is_dropped() {
        let (channel, _events) = ControlChannel::new();
        assert!(!channel.is_connected());
        assert!(!channel.send(ControlMessage::ServerStopRequest));
    }

    #[test]
    fn test_send_reaches_attached_peer() {
        let (channel, _events) = ControlChannel::new();
        let mut peer = channel.attach();
        assert!(channel.is_connected());
        assert!(channel.send(ControlMessage::ServerStopRequest));
        assert_eq!(
            peer.outbound.try_recv().unwrap(),
            ControlMessage::ServerStopRequest
        );
    }

    #[test]
    fn test_inbound_frames_preserve_order() {
        let (channel, mut events) = ControlChannel::new();
        let peer = channel.attach();

        channel
            .receive_text(peer.id, r#"{"_":"ServerStarting"}"#)
            .unwrap();
        assert!(channel.receive_text(peer.id, "garbage").is_err());
        assert!(matches!(
            channel.receive_text(peer.id, r#"{"_":"ServerExploded"}"#),
            Err(ProtocolError::UnknownVariant(_))
        ));
        channel
            .receive_text(peer.id, r#"{"_":"ServerStarted"}"#)
            .unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            ControlEvent::Received(ControlMessage::ServerStarting)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            ControlEvent::Received(ControlMessage::ServerStarted)
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_failed_write_is_reported() {
        let (channel, mut events) = ControlChannel::new();
        let peer = channel.attach();

        channel.undelivered(peer.id, ControlMessage::ServerStopRequest);
        channel.detach(peer.id);

        assert_eq!(
            events.try_recv().unwrap(),
            ControlEvent::Undelivered(ControlMessage::ServerStopRequest)
        );
    }

    #[test]
    fn test_second_peer_replaces_first() {
        let (channel, mut events) = ControlChannel::new();
        let mut first = channel.attach();
        let mut second = channel.attach();

        assert!(channel.send(ControlMessage::ServerStopRequest));
        assert!(second.outbound.try_recv().is_ok());
        // The replaced peer's queue is closed.
        assert!(matches!(
            first.outbound.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));

        channel.receive(first.id, ControlMessage::ServerStarted);
        assert!(events.try_recv().is_err());

        // Closing the stale connection keeps the active one.
        channel.detach(first.id);
        assert!(channel.is_connected());
        channel.detach(second.id);
        assert!(!channel.is_connected());
    }
}
