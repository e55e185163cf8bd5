//! Root CLI structure.
//!
//! Every option can also be supplied through a `DEPLOYD_*` environment
//! variable; a `.env` file in the working directory is loaded first.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use deployd_core::{DEFAULT_HOST, DEFAULT_PORT, DeploySettings};

/// Build, run and update a game server from its git checkout.
#[derive(Debug, Parser)]
#[command(name = "deployd")]
#[command(about = "Deployment control plane for a git-tracked game server")]
#[command(version)]
pub struct Cli {
    /// Root of the server checkout (a git working tree with gradlew)
    #[arg(long, env = "DEPLOYD_SERVER")]
    pub server: PathBuf,

    /// Interface to bind the web server on
    #[arg(long, env = "DEPLOYD_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port for the observer UI and the control channel
    #[arg(short, long, env = "DEPLOYD_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Git remote to fetch updates from
    #[arg(long, env = "DEPLOYD_REMOTE")]
    pub remote: Option<String>,

    /// Branch on the remote to track
    #[arg(long, env = "DEPLOYD_BRANCH")]
    pub branch: Option<String>,

    /// Java executable used to launch the server
    #[arg(long, env = "DEPLOYD_JAVA")]
    pub java: Option<String>,

    /// Server jar, relative to the server root
    #[arg(long = "main-jar", env = "DEPLOYD_MAIN_JAR")]
    pub main_jar: Option<PathBuf>,

    /// Fully qualified main class of the server
    #[arg(long = "main-class", env = "DEPLOYD_MAIN_CLASS")]
    pub main_class: Option<String>,

    /// Directory of built UI assets to serve at `/`
    #[arg(long = "static-dir", env = "DEPLOYD_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Allowed CORS origin; may be repeated. All origins are allowed if unset
    #[arg(long = "allow-origin", env = "DEPLOYD_ALLOW_ORIGINS", value_delimiter = ',')]
    pub allow_origins: Vec<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the arguments into validated deployment settings.
    ///
    /// The server root is canonicalized so child processes and the git
    /// adapter see the same absolute path.
    pub fn settings(&self) -> Result<DeploySettings> {
        let root = self
            .server
            .canonicalize()
            .with_context(|| format!("Server root {} not found", self.server.display()))?;

        let mut settings = DeploySettings::with_defaults(root)
            .with_host(self.host.clone())
            .with_port(self.port)
            .with_static_dir(self.static_dir.clone());

        if self.remote.is_some() || self.branch.is_some() {
            let remote = self.remote.clone().unwrap_or_else(|| settings.remote.clone());
            let branch = self.branch.clone().unwrap_or_else(|| settings.branch.clone());
            settings = settings.with_remote(remote, branch);
        }
        if let Some(java) = &self.java {
            settings = settings.with_java(java.clone());
        }
        if self.main_jar.is_some() || self.main_class.is_some() {
            let jar = self.main_jar.clone().unwrap_or_else(|| settings.main_jar.clone());
            let class = self.main_class.clone().unwrap_or_else(|| settings.main_class.clone());
            settings = settings.with_main(jar, class);
        }

        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}
