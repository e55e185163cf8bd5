use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::ObserverMessage;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique observer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Sending half of a connected client's outbound queue.
///
/// The queue is unbounded so a slow client never stalls fan-out to the
/// others; the client's egress task drains it at its own pace.
#[derive(Debug, Clone)]
pub struct Observer {
    id: ObserverId,
    tx: mpsc::UnboundedSender<ObserverMessage>,
}

impl Observer {
    /// Create an observer and the receiver its transport drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ObserverMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ObserverId(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed));
        (Self { id, tx }, rx)
    }

    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// Push a message. Returns `false` if the client has gone away.
    pub(crate) fn deliver(&self, message: ObserverMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// Registered observers of one hub.
#[derive(Debug, Default)]
pub(crate) struct ObserverSet {
    observers: Vec<Observer>,
}

impl ObserverSet {
    pub(crate) fn insert(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| o.id != id);
        self.observers.len() != before
    }

    /// Deliver to every observer, dropping those whose client is gone.
    pub(crate) fn broadcast(&mut self, message: &ObserverMessage) {
        self.observers.retain(|observer| {
            let alive = observer.deliver(message.clone());
            if !alive {
                debug!(observer = %observer.id, "Dropping disconnected observer");
            }
            alive
        });
    }

    pub(crate) fn clear(&mut self) {
        self.observers.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ServerState, StateUpdate};

    #[test]
    fn test_ids_are_unique() {
        let (a, _ra) = Observer::channel();
        let (b, _rb) = Observer::channel();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_broadcast_drops_closed_observers() {
        let (alive, mut alive_rx) = Observer::channel();
        let (gone, gone_rx) = Observer::channel();
        drop(gone_rx);

        let mut set = ObserverSet::default();
        set.insert(gone);
        set.insert(alive);

        let message = ObserverMessage::from(StateUpdate::Server(ServerState::Started));
        set.broadcast(&message);

        assert_eq!(set.len(), 1);
        assert_eq!(alive_rx.try_recv().unwrap(), message);
    }
}
