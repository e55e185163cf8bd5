//! OS-level adapters for the deployment control plane.
//!
//! - [`process`] - supervisor implementing the core's process port, stream
//!   drains and SIGTERM/SIGKILL shutdown
//! - [`launch`] - server and build command planning
//! - [`vcs`] - git-backed version control capability
//! - [`ipc`] - control channel peer registry

#![deny(unsafe_code)]

pub mod ipc;
pub mod launch;
pub mod process;
pub mod vcs;

pub use ipc::ControlChannel;
pub use launch::DeployLaunchPlanner;
pub use process::{ConsoleMirror, ProcessSupervisor, spawn_drain};
pub use vcs::GitVersionControl;
