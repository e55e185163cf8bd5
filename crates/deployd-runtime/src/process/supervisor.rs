//! Supervisor implementing the core process port on `tokio::process`.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deployd_core::{
    ExitOutcome, LaunchSpec, LogSinkPort, ManagedProcess, ProcessId, ProcessKind,
    ProcessSupervisorPort, SpawnError,
};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::drain::{ConsoleMirror, spawn_drain};
use super::shutdown::{DEFAULT_GRACE_PERIOD, shutdown_child};

/// Spawns children, drains their output into a log sink and reaps them.
///
/// Each child gets a reaper task that owns the `Child`. The reaper waits for
/// either a natural exit or a kill request, then publishes the outcome on
/// the handle's exit watch exactly once.
pub struct ProcessSupervisor {
    sink: Arc<dyn LogSinkPort>,
    next_id: AtomicU64,
    mirror_console: bool,
    grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(sink: Arc<dyn LogSinkPort>) -> Self {
        Self {
            sink,
            next_id: AtomicU64::new(1),
            mirror_console: true,
            grace: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Whether drains mirror child output to this process's stdout/stderr.
    #[must_use]
    pub const fn with_console_mirror(mut self, enabled: bool) -> Self {
        self.mirror_console = enabled;
        self
    }

    /// Time a killed child gets between SIGTERM and SIGKILL.
    #[must_use]
    pub const fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn mirror(&self, stdout: bool) -> ConsoleMirror {
        match (self.mirror_console, stdout) {
            (false, _) => ConsoleMirror::Off,
            (true, true) => ConsoleMirror::Stdout,
            (true, false) => ConsoleMirror::Stderr,
        }
    }

    fn spawn_drains(&self, child: &mut Child, kind: ProcessKind) {
        let source = kind.log_source();
        if let Some(stdout) = child.stdout.take() {
            spawn_drain(stdout, source, self.mirror(true), Arc::clone(&self.sink));
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_drain(stderr, source, self.mirror(false), Arc::clone(&self.sink));
        }
    }
}

async fn validate_working_dir(spec: &LaunchSpec) -> Result<(), SpawnError> {
    let dir = &spec.working_dir;
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SpawnError::InvalidWorkingDirectory(format!(
            "{} is not a directory",
            dir.display()
        ))),
        Err(e) => Err(SpawnError::InvalidWorkingDirectory(format!(
            "{}: {e}",
            dir.display()
        ))),
    }
}

fn map_spawn_error(e: io::Error, spec: &LaunchSpec) -> SpawnError {
    if e.kind() == io::ErrorKind::NotFound {
        SpawnError::ExecutableNotFound(spec.program.display().to_string())
    } else {
        SpawnError::Io(e)
    }
}

#[async_trait]
impl ProcessSupervisorPort for ProcessSupervisor {
    async fn spawn(
        &self,
        spec: LaunchSpec,
        kind: ProcessKind,
    ) -> Result<ManagedProcess, SpawnError> {
        validate_working_dir(&spec).await?;

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| map_spawn_error(e, &spec))?;

        let id = ProcessId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pid = child.id();
        self.spawn_drains(&mut child, kind);

        let kill = CancellationToken::new();
        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(reap(child, kind, id, kill.clone(), exit_tx, self.grace));

        info!(%kind, %id, pid = ?pid, command = %spec.display_command(), "Spawned process");
        Ok(ManagedProcess::new(id, kind, pid, kill, exit_rx))
    }
}

/// Own the child until it exits, terminating it on request.
async fn reap(
    mut child: Child,
    kind: ProcessKind,
    id: ProcessId,
    kill: CancellationToken,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
    grace: Duration,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        () = kill.cancelled() => None,
    };
    let status = match exited {
        Some(status) => status,
        None => {
            debug!(%kind, %id, "Kill requested, shutting down process");
            shutdown_child(&mut child, grace).await
        }
    };

    let outcome = match status {
        Ok(status) => ExitOutcome { code: status.code() },
        Err(e) => {
            warn!(%kind, %id, error = %e, "Failed to reap process");
            ExitOutcome::signaled()
        }
    };
    info!(%kind, %id, %outcome, "Process exited");
    // No receivers left is fine: nobody is waiting.
    let _ = exit_tx.send(Some(outcome));
}
