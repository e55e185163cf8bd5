//! Control channel port.
//!
//! Outbound messages go through [`ControlPort`]. Inbound traffic reaches the
//! engine as a stream of [`ControlEvent`]s handed to it at construction.

use crate::protocol::ControlMessage;

/// What the control channel reports to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// A message from the server process.
    Received(ControlMessage),
    /// A message accepted by [`ControlPort::send`] that never reached the
    /// server, because the connection failed or closed first.
    Undelivered(ControlMessage),
}

/// Port for sending control messages to the supervised server process.
pub trait ControlPort: Send + Sync {
    /// Queue a message for the attached peer.
    ///
    /// Returns `false` when no peer is attached; the message is dropped,
    /// never queued. A `true` result is followed by
    /// [`ControlEvent::Undelivered`] if the write later fails.
    fn send(&self, message: ControlMessage) -> bool;

    /// Whether a peer is currently attached.
    fn is_connected(&self) -> bool;
}
