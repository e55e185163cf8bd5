//! Domain types shared by every adapter.
//!
//! These are pure value types with no infrastructure dependencies. The
//! lifecycle engine is the only writer of the state values; everything else
//! reads snapshots of them.

mod log;
mod state;

pub use log::{LogEntry, LogSource};
pub use state::{BuildState, ServerState, StateSnapshot, StateUpdate, VcsState};
