//! Log history and fan-out.

use std::sync::Mutex;

use super::lock;
use super::observer::{Observer, ObserverId, ObserverSet};
use crate::domain::{LogEntry, LogSource};
use crate::ports::LogSinkPort;
use crate::protocol::ObserverMessage;

#[derive(Debug, Default)]
struct Inner {
    /// Every retained entry in emit order; per-source order is a subsequence.
    history: Vec<LogEntry>,
    observers: ObserverSet,
    closed: bool,
}

/// Append-only log history with replay-on-join.
///
/// Emit, clear and join all run under one lock, so a joining observer sees
/// exactly the history emitted before it and every entry emitted after,
/// with no gap and no duplicate.
#[derive(Debug, Default)]
pub struct LogHub {
    inner: Mutex<Inner>,
}

impl LogHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and push it to every observer.
    pub fn emit(&self, entry: LogEntry) {
        let mut inner = lock(&self.inner);
        inner.observers.broadcast(&ObserverMessage::from(entry.clone()));
        inner.history.push(entry);
    }

    /// Drop the retained history of one source.
    ///
    /// Observers are not notified; live clients clear their own view.
    pub fn clear(&self, source: LogSource) {
        lock(&self.inner).history.retain(|e| e.source != source);
    }

    /// Replay history to `observer`, then register it for live entries.
    ///
    /// An observer whose client is already gone is not registered. After
    /// [`close`](Self::close) the observer only gets the replay.
    pub fn join(&self, observer: Observer) {
        let mut inner = lock(&self.inner);
        for entry in &inner.history {
            if !observer.deliver(ObserverMessage::from(entry.clone())) {
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

    /// Snapshot of the retained history.
    pub fn history(&self) -> Vec<LogEntry> {
        lock(&self.inner).history.clone()
    }

    /// Retained history of one source.
    pub fn history_of(&self, source: LogSource) -> Vec<LogEntry> {
        lock(&self.inner)
            .history
            .iter()
            .filter(|e| e.source == source)
            .cloned()
            .collect()
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner).observers.len()
    }
}

impl LogSinkPort for LogHub {
    fn append(&self, entry: LogEntry) {
        self.emit(entry);
    }
}
