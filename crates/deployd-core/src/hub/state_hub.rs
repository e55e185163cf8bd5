//! Current state replication.

use std::sync::Mutex;

use super::lock;
use super::observer::{Observer, ObserverId, ObserverSet};
use crate::domain::{StateSnapshot, StateUpdate};
use crate::protocol::ObserverMessage;

#[derive(Debug, Default)]
struct Inner {
    snapshot: StateSnapshot,
    observers: ObserverSet,
    closed: bool,
}

/// Holder of the server, VCS and build state.
///
/// The lifecycle engine is the only publisher. Readers get whole values:
/// each publish swaps one field under the lock.
#[derive(Debug, Default)]
pub struct StateHub {
    inner: Mutex<Inner>,
}

impl StateHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new value and push it to every observer.
    ///
    /// Unchanged values are pushed too; observers treat repeats as no-ops.
    /// Returns whether the stored value changed.
    pub fn publish(&self, update: impl Into<StateUpdate>) -> bool {
        let update = update.into();
        let mut inner = lock(&self.inner);
        let changed = inner.snapshot.apply(update);
        inner.observers.broadcast(&ObserverMessage::from(update));
        changed
    }

    pub fn snapshot(&self) -> StateSnapshot {
        lock(&self.inner).snapshot
    }

    /// Send the current value of all three categories, then register.
    pub fn join(&self, observer: Observer) {
        let mut inner = lock(&self.inner);
        for update in inner.snapshot.as_updates() {
            if !observer.deliver(ObserverMessage::from(update)) {
                return;
            }
        }
        if !inner.closed {
            inner.observers.insert(observer);
        }
    }

    pub fn leave(&self, id: ObserverId) {
        lock(&self.inner).observers.remove(id);
    }

    /// Release every observer so their egress tasks end.
    pub fn close(&self) {
        let mut inner = lock(&self.inner);
        inner.closed = true;
        inner.observers.clear();
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner).observers.len()
    }
}
