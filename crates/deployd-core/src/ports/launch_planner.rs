//! Launch command planning.

use super::{LaunchSpec, SpawnError};

/// Produces the launch commands for the server and the build.
///
/// Plans are made per launch: a build may change what the server's
/// classpath contains.
pub trait LaunchPlanner: Send + Sync {
    /// Command that starts the server with the control address baked in.
    fn server(&self) -> Result<LaunchSpec, SpawnError>;

    /// Command that runs one build.
    fn build(&self) -> Result<LaunchSpec, SpawnError>;
}
