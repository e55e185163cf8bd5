//! Core services.

mod lifecycle;

pub use lifecycle::{
    DEFAULT_SHUTDOWN_TIMEOUT, EngineHandle, EnginePorts, LifecycleEngine,
};
