//! Process supervision.
//!
//! - `ProcessSupervisor` - spawns children, wires drains, reaps exits
//! - `spawn_drain` - forwards a child stream to a log sink in bounded chunks
//! - `shutdown_child` - SIGTERM with grace period, then SIGKILL

mod drain;
pub mod shutdown;
mod supervisor;

pub use drain::{CHUNK_SIZE, ConsoleMirror, spawn_drain};
pub use shutdown::{DEFAULT_GRACE_PERIOD, shutdown_child};
pub use supervisor::ProcessSupervisor;
