//! Launch command planning for the server and the build.

use std::io;
use std::path::{Path, PathBuf};

use deployd_core::{DeploySettings, LaunchPlanner, LaunchSpec, SpawnError};
use tracing::{debug, warn};

#[cfg(windows)]
const GRADLE_WRAPPER: &str = "gradlew.bat";
#[cfg(not(windows))]
const GRADLE_WRAPPER: &str = "gradlew";

/// Plans launches from deployment settings.
///
/// The server classpath is rebuilt on every launch because a build can add
/// or remove dependency jars.
#[derive(Debug, Clone)]
pub struct DeployLaunchPlanner {
    settings: DeploySettings,
}

impl DeployLaunchPlanner {
    pub const fn new(settings: DeploySettings) -> Self {
        Self { settings }
    }

    /// Dependency files followed by the main jar.
    pub fn classpath(&self) -> Result<Vec<PathBuf>, SpawnError> {
        let mut entries = dependency_files(&self.settings.dependencies_dir())?;
        entries.push(self.settings.main_jar_path());
        Ok(entries)
    }
}

/// Every regular file in `dir`, sorted. A missing directory yields nothing.
fn dependency_files(dir: &Path) -> Result<Vec<PathBuf>, SpawnError> {
    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(dir = %dir.display(), "Dependencies directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(SpawnError::Io(e)),
    };

    let mut files = Vec::new();
    for entry in read {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "Collected dependency files");
    Ok(files)
}

impl LaunchPlanner for DeployLaunchPlanner {
    fn server(&self) -> Result<LaunchSpec, SpawnError> {
        let classpath = std::env::join_paths(self.classpath()?)
            .map_err(|e| SpawnError::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        Ok(
            LaunchSpec::new(&self.settings.java, &self.settings.root).with_args([
                "-Dfile.encoding=UTF-8".to_string(),
                "-cp".to_string(),
                classpath.to_string_lossy().into_owned(),
                self.settings.main_class.clone(),
                "--ipc-url".to_string(),
                self.settings.control_url(),
            ]),
        )
    }

    fn build(&self) -> Result<LaunchSpec, SpawnError> {
        Ok(
            LaunchSpec::new(self.settings.root.join(GRADLE_WRAPPER), &self.settings.root)
                .with_args(["build", "--console=plain"]),
        )
    }
}
