//! Log sink port.
//!
//! Stream drains push process output through this port without knowing
//! whether it ends up in the log hub, a test buffer or nowhere.

use crate::domain::LogEntry;

/// Port for appending log chunks to a sink.
///
/// Implementations must be thread-safe and must not block.
pub trait LogSinkPort: Send + Sync {
    /// Append a chunk. Ordering is preserved per caller.
    fn append(&self, entry: LogEntry);
}
