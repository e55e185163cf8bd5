//! Deployment settings and validation.
//!
//! Pure domain types: adapters fill these from CLI flags or environment
//! variables, the runtime reads them when planning launches.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default listen port of the orchestrator.
pub const DEFAULT_PORT: u16 = 5555;

/// Default listen address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// WebSocket path for UI observers.
pub const OBSERVER_PATH: &str = "/api/ws";

/// WebSocket path the supervised server connects back to.
pub const CONTROL_PATH: &str = "/ipc/server";

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_JAVA: &str = "java";
pub const DEFAULT_MAIN_JAR: &str = "libs/protanki-server-0.1.0.jar";
pub const DEFAULT_MAIN_CLASS: &str = "jp.assasans.protanki.server.MainKt";

/// Everything needed to supervise one server checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Root of the server checkout (git work tree, gradle project).
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Git remote to fetch from.
    pub remote: String,
    /// Branch tracked on the remote.
    pub branch: String,
    /// Java launcher used for the server.
    pub java: String,
    /// Server jar, relative to `root` unless absolute.
    pub main_jar: PathBuf,
    pub main_class: String,
    /// Optional directory with the web UI.
    pub static_dir: Option<PathBuf>,
}

impl DeploySettings {
    /// Create settings for `root` with defaults for everything else.
    #[must_use]
    pub fn with_defaults(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            remote: DEFAULT_REMOTE.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            java: DEFAULT_JAVA.to_string(),
            main_jar: PathBuf::from(DEFAULT_MAIN_JAR),
            main_class: DEFAULT_MAIN_CLASS.to_string(),
            static_dir: None,
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        self.remote = remote.into();
        self.branch = branch.into();
        self
    }

    #[must_use]
    pub fn with_java(mut self, java: impl Into<String>) -> Self {
        self.java = java.into();
        self
    }

    #[must_use]
    pub fn with_main(mut self, jar: impl Into<PathBuf>, class: impl Into<String>) -> Self {
        self.main_jar = jar.into();
        self.main_class = class.into();
        self
    }

    #[must_use]
    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Address the supervised server dials back to.
    pub fn control_url(&self) -> String {
        format!("ws://localhost:{}{CONTROL_PATH}", self.port)
    }

    /// Absolute location of the server jar.
    pub fn main_jar_path(&self) -> PathBuf {
        resolve(&self.root, &self.main_jar)
    }

    /// Directory holding the server's runtime dependencies.
    pub fn dependencies_dir(&self) -> PathBuf {
        self.root.join("dependencies")
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_settings(self)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Port must be non-zero")]
    InvalidPort,

    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("Server root cannot be empty")]
    EmptyRoot,
}

/// Validate settings values.
pub fn validate_settings(settings: &DeploySettings) -> Result<(), SettingsError> {
    if settings.port == 0 {
        return Err(SettingsError::InvalidPort);
    }

    if settings.root.as_os_str().is_empty() {
        return Err(SettingsError::EmptyRoot);
    }

    let required = [
        ("Remote", &settings.remote),
        ("Branch", &settings.branch),
        ("Java launcher", &settings.java),
        ("Main class", &settings.main_class),
        ("Host", &settings.host),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(SettingsError::Empty(name));
        }
    }

    Ok(())
}
