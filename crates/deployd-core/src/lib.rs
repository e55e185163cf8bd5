//! Core domain of the deployment control plane.
//!
//! Holds the lifecycle state machine and everything it needs that does not
//! touch the OS or the network: domain values, both wire protocols, the
//! ports adapters implement, and the log and state hubs observers attach to.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod hub;
pub mod ports;
pub mod protocol;
pub mod services;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    BuildState, LogEntry, LogSource, ServerState, StateSnapshot, StateUpdate, VcsState,
};
pub use hub::{LogHub, Observer, ObserverId, StateHub};
pub use ports::{
    ControlEvent, ControlPort, CoreError, ExitOutcome, LaunchPlanner, LaunchSpec, LogSinkPort, ManagedProcess,
    ProcessId, ProcessKind, ProcessSupervisorPort, ProtocolError, RemoteFetch, Revision,
    SpawnError, VcsError, VersionControlPort,
};
pub use protocol::{ControlMessage, ObserverCommand, ObserverMessage, ServerAction};
pub use services::{DEFAULT_SHUTDOWN_TIMEOUT, EngineHandle, EnginePorts, LifecycleEngine};
pub use settings::{
    CONTROL_PATH, DEFAULT_HOST, DEFAULT_PORT, DeploySettings, OBSERVER_PATH, SettingsError,
    validate_settings,
};

