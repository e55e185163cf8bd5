//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the lifecycle engine expects from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No `tokio::process` or `git2` types in any signature
//! - Intent-based methods (spawn, fetch, send), not implementation-leaking
//! - Errors are the enums below, never `anyhow`

pub mod control_channel;
pub mod launch_planner;
pub mod log_sink;
pub mod process_supervisor;
pub mod version_control;

use thiserror::Error;

pub use control_channel::{ControlEvent, ControlPort};
pub use launch_planner::LaunchPlanner;
pub use log_sink::LogSinkPort;
pub use process_supervisor::{
    ExitOutcome, LaunchSpec, ManagedProcess, ProcessId, ProcessKind, ProcessSupervisorPort,
};
pub use version_control::{RemoteFetch, Revision, VersionControlPort, short_id};

/// Errors raised while creating an OS process.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The program could not be found.
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    /// The working directory is missing or not a directory.
    #[error("Invalid working directory: {0}")]
    InvalidWorkingDirectory(String),

    /// Any other OS-level failure.
    #[error("Failed to spawn process: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the version control backend.
///
/// Each variant carries the backend's own message.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The repository could not be opened.
    #[error("Cannot open repository: {0}")]
    Open(String),

    /// A reference or commit could not be resolved.
    #[error("Cannot resolve {0}")]
    Resolve(String),

    /// Fetching from the remote failed.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Checking out the target revision failed.
    #[error("Checkout failed: {0}")]
    Checkout(String),

    /// The blocking worker running the operation died.
    #[error("VCS task failed: {0}")]
    Task(String),
}

/// Errors raised while decoding a frame on either channel.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON or its payload does not fit the variant.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// The frame has no `_` discriminator.
    #[error("Message has no type tag")]
    MissingTag,

    /// The discriminator names a variant this build does not know.
    #[error("Unknown message type: {0}")]
    UnknownVariant(String),
}

/// Core error type for semantic domain errors.
///
/// Adapters map this to their own error types (close frames, exit codes).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Process creation failed.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// Version control operation failed.
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// Inbound message could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Settings validation error.
    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),
}
