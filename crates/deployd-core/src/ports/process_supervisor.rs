//! Process supervisor port.
//!
//! The supervisor owns spawning, draining and terminating OS processes. The
//! engine only ever holds [`ManagedProcess`] handles: it can ask for
//! termination and wait for the exit, nothing else.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::SpawnError;
use crate::domain::LogSource;

/// Supervisor-unique identifier of a spawned process.
///
/// Distinguishes a current process from an earlier one of the same kind
/// whose exit is reported late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of a supervised process. At most one of each kind is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    Server,
    Build,
}

impl ProcessKind {
    /// Log source the process's output is tagged with.
    pub const fn log_source(self) -> LogSource {
        match self {
            Self::Server => LogSource::Server,
            Self::Build => LogSource::Build,
        }
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Build => f.write_str("build"),
        }
    }
}

/// What to run and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The command line as a single string, for logging.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, or `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub const fn code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub const fn signaled() -> Self {
        Self { code: None }
    }

    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Handle to a supervised process.
///
/// Cloning the handle does not duplicate the process; every clone observes
/// the same exit and shares the same kill request.
#[derive(Debug, Clone)]
pub struct ManagedProcess {
    id: ProcessId,
    kind: ProcessKind,
    pid: Option<u32>,
    kill: CancellationToken,
    exit: watch::Receiver<Option<ExitOutcome>>,
}

impl ManagedProcess {
    /// Assemble a handle.
    ///
    /// The supervisor keeps the other ends: it watches `kill` and publishes
    /// the outcome on the sender of `exit` exactly once.
    pub const fn new(
        id: ProcessId,
        kind: ProcessKind,
        pid: Option<u32>,
        kill: CancellationToken,
        exit: watch::Receiver<Option<ExitOutcome>>,
    ) -> Self {
        Self {
            id,
            kind,
            pid,
            kill,
            exit,
        }
    }

    pub const fn id(&self) -> ProcessId {
        self.id
    }

    pub const fn kind(&self) -> ProcessKind {
        self.kind
    }

    /// OS process id, if the platform reported one.
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Request termination. Idempotent; a no-op once the process has exited.
    pub fn kill(&self) {
        self.kill.cancel();
    }

    /// Whether termination has been requested.
    pub fn kill_requested(&self) -> bool {
        self.kill.is_cancelled()
    }

    /// Exit outcome, if the process has already exited.
    pub fn try_exit(&self) -> Option<ExitOutcome> {
        *self.exit.borrow()
    }

    /// Wait until the process exits.
    ///
    /// Safe to call from several tasks at once. If the supervisor disappears
    /// without reporting, the process is treated as killed.
    pub async fn wait(&self) -> ExitOutcome {
        let mut exit = self.exit.clone();
        let observed = exit.wait_for(Option::is_some).await.map(|outcome| *outcome);
        if let Ok(Some(outcome)) = observed {
            return outcome;
        }
        self.exit.borrow().unwrap_or_else(ExitOutcome::signaled)
    }
}

/// Port for spawning supervised processes.
#[async_trait]
pub trait ProcessSupervisorPort: Send + Sync {
    /// Start a process and attach drains for its stdout and stderr.
    ///
    /// Output is tagged with `kind.log_source()`.
    async fn spawn(&self, spec: LaunchSpec, kind: ProcessKind)
    -> Result<ManagedProcess, SpawnError>;
}
