//! Lifecycle engine.
//!
//! A single actor task owns the server, VCS and build state and the handles
//! of the processes it started. Observer commands, process exits and VCS
//! completion arrive on one queue; control-channel events on another. Every
//! state change is applied here and then published through the [`StateHub`],
//! so observers never see a value the engine did not decide.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{
    BuildState, LogEntry, LogSource, ServerState, StateSnapshot, StateUpdate, VcsState,
};
use crate::hub::{LogHub, StateHub};
use crate::ports::{
    ControlEvent, ControlPort, ExitOutcome, LaunchPlanner, ManagedProcess, ProcessId, ProcessKind,
    ProcessSupervisorPort, SpawnError, VcsError, VersionControlPort, short_id,
};
use crate::protocol::{ControlMessage, ObserverCommand, ServerAction};

/// How long teardown waits for killed processes to exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Infrastructure the engine drives.
#[derive(Clone)]
pub struct EnginePorts {
    pub supervisor: Arc<dyn ProcessSupervisorPort>,
    pub vcs: Arc<dyn VersionControlPort>,
    pub control: Arc<dyn ControlPort>,
    pub launcher: Arc<dyn LaunchPlanner>,
}

#[derive(Debug)]
enum EngineEvent {
    Command(ObserverCommand),
    Exited {
        kind: ProcessKind,
        id: ProcessId,
        outcome: ExitOutcome,
    },
    VcsFinished,
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle used by transports to talk to the engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    /// Queue an observer command. Returns `false` once the engine has stopped.
    pub fn command(&self, command: ObserverCommand) -> bool {
        self.tx.send(EngineEvent::Command(command)).is_ok()
    }

    /// Tear the engine down and wait for it to finish.
    ///
    /// Kills the server and build processes, waits for them (bounded), then
    /// closes both hubs. Returns immediately if the engine is already gone.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(EngineEvent::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// The deployment state machine.
pub struct LifecycleEngine {
    ports: EnginePorts,
    logs: Arc<LogHub>,
    states: Arc<StateHub>,
    shutdown_timeout: Duration,
}

impl LifecycleEngine {
    pub fn new(ports: EnginePorts, logs: Arc<LogHub>, states: Arc<StateHub>) -> Self {
        Self {
            ports,
            logs,
            states,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Start the actor task.
    ///
    /// `control_events` is the inbound stream of the control channel. The
    /// task ends after [`EngineHandle::shutdown`], or once every handle is
    /// dropped and no process or VCS task is outstanding.
    pub fn spawn(
        self,
        control_events: mpsc::UnboundedReceiver<ControlEvent>,
    ) -> (EngineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Actor {
            events: tx.downgrade(),
            state: self.states.snapshot(),
            ports: self.ports,
            logs: self.logs,
            states: self.states,
            shutdown_timeout: self.shutdown_timeout,
            server: None,
            build: None,
        };
        let task = tokio::spawn(actor.run(rx, control_events));
        (EngineHandle { tx }, task)
    }
}

/// Emit an orchestrator-authored line and mirror it to the console log.
fn report(logs: &LogHub, source: LogSource, text: impl Into<String>) {
    let text = text.into();
    info!(source = %source, "{text}");
    logs.emit(LogEntry::line(source, text));
}

struct Actor {
    ports: EnginePorts,
    logs: Arc<LogHub>,
    states: Arc<StateHub>,
    shutdown_timeout: Duration,
    /// Weak so that dropping every handle lets the inbox close.
    events: mpsc::WeakUnboundedSender<EngineEvent>,
    state: StateSnapshot,
    server: Option<ManagedProcess>,
    build: Option<ManagedProcess>,
}

impl Actor {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<EngineEvent>,
        mut control: mpsc::UnboundedReceiver<ControlEvent>,
    ) {
        let mut control_open = true;
        loop {
            tokio::select! {
                event = inbox.recv() => match event {
                    Some(event) => {
                        if !self.handle(event).await {
                            break;
                        }
                    }
                    None => {
                        debug!("All engine handles dropped");
                        self.teardown().await;
                        break;
                    }
                },
                event = control.recv(), if control_open => match event {
                    Some(ControlEvent::Received(message)) => self.on_control(message),
                    Some(ControlEvent::Undelivered(message)) => self.on_undelivered(message),
                    None => {
                        debug!("Control event stream closed");
                        control_open = false;
                    }
                },
            }
        }
        debug!("Lifecycle engine stopped");
    }

    /// Process one inbox event. Returns `false` once the engine should stop.
    async fn handle(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::Command(command) => self.on_command(command).await,
            EngineEvent::Exited { kind, id, outcome } => self.on_exit(kind, id, outcome),
            EngineEvent::VcsFinished => self.set(VcsState::Idle),
            EngineEvent::Shutdown(ack) => {
                self.teardown().await;
                let _ = ack.send(());
                return false;
            }
        }
        true
    }

    async fn on_command(&mut self, command: ObserverCommand) {
        debug!(?command, "Observer command");
        match command {
            ObserverCommand::ServerAction {
                action: ServerAction::Start,
            } => self.start_server().await,
            ObserverCommand::ServerAction {
                action: ServerAction::Stop,
            } => self.stop_server(),
            ObserverCommand::VcsUpdate => self.start_vcs_update(),
            ObserverCommand::GradleBuild => self.start_build().await,
            ObserverCommand::ClearLogs { source } => {
                self.logs.clear(source);
                debug!(source = %source, "Cleared log history");
            }
        }
    }

    fn report(&self, source: LogSource, text: impl Into<String>) {
        report(&self.logs, source, text);
    }

    /// Apply a state change and publish it if the value moved.
    fn set(&mut self, update: impl Into<StateUpdate>) {
        let update = update.into();
        if self.state.apply(update) {
            debug!(?update, "State changed");
            self.states.publish(update);
        }
    }

    fn set_server(&mut self, next: ServerState) {
        let current = self.state.server;
        if current.can_transition_to(next) {
            self.set(next);
        } else {
            warn!(?current, ?next, "Refusing illegal server state transition");
        }
    }

    /// Plan and spawn a process of `kind`.
    async fn launch(&self, kind: ProcessKind) -> Result<ManagedProcess, SpawnError> {
        let spec = match kind {
            ProcessKind::Server => self.ports.launcher.server()?,
            ProcessKind::Build => self.ports.launcher.build()?,
        };
        self.report(
            LogSource::System,
            format!("Command: {}", spec.display_command()),
        );
        self.ports.supervisor.spawn(spec, kind).await
    }

    /// Forward the process's exit to the inbox.
    fn watch_exit(&self, process: &ManagedProcess) {
        let Some(events) = self.events.upgrade() else {
            return;
        };
        let process = process.clone();
        tokio::spawn(async move {
            let outcome = process.wait().await;
            let _ = events.send(EngineEvent::Exited {
                kind: process.kind(),
                id: process.id(),
                outcome,
            });
        });
    }

    async fn start_server(&mut self) {
        if self.state.server != ServerState::Stopped {
            self.report(
                LogSource::System,
                format!("Server is {:?}, ignoring start", self.state.server),
            );
            return;
        }
        if let Some(previous) = &self.server {
            self.report(
                LogSource::System,
                format!(
                    "Previous server process {} has not exited yet, ignoring start",
                    previous.id()
                ),
            );
            return;
        }

        match self.launch(ProcessKind::Server).await {
            Ok(process) => {
                self.report(
                    LogSource::System,
                    format!("Server process started (pid {})", display_pid(&process)),
                );
                self.watch_exit(&process);
                self.server = Some(process);
                self.set_server(ServerState::ProcessStarted);
            }
            Err(e) => self.report(LogSource::System, format!("Failed to start server: {e}")),
        }
    }

    fn stop_server(&mut self) {
        if self.state.server != ServerState::Started {
            self.report(
                LogSource::System,
                format!("Server is {:?}, ignoring stop", self.state.server),
            );
            return;
        }

        self.set_server(ServerState::Stopping);
        self.report(LogSource::System, "Stopping server...");
        if !self.ports.control.send(ControlMessage::ServerStopRequest) {
            self.report(
                LogSource::System,
                "Server is not connected to the control channel, killing process",
            );
            if let Some(process) = &self.server {
                process.kill();
            }
        }
    }

    fn on_control(&mut self, message: ControlMessage) {
        let (expected, next, text) = match message {
            ControlMessage::ServerStarting => (
                ServerState::ProcessStarted,
                ServerState::Starting,
                "Server starting",
            ),
            ControlMessage::ServerStarted => {
                (ServerState::Starting, ServerState::Started, "Server started")
            }
            ControlMessage::ServerStopResponse => (
                ServerState::Stopping,
                ServerState::Stopped,
                "Server acknowledged stop",
            ),
            ControlMessage::ServerStopRequest => {
                warn!("Server process sent a stop request, ignoring");
                return;
            }
        };

        if self.state.server != expected {
            warn!(state = ?self.state.server, ?message, "Control event does not match server state");
            self.report(
                LogSource::System,
                format!(
                    "Unexpected {message:?} while server is {:?}, ignoring",
                    self.state.server
                ),
            );
            return;
        }

        self.report(LogSource::System, text);
        if next == ServerState::Stopped {
            // The handle stays owned until the exit is observed.
            if let Some(process) = &self.server {
                process.kill();
            }
        }
        self.set_server(next);
    }

    fn on_undelivered(&mut self, message: ControlMessage) {
        if message != ControlMessage::ServerStopRequest || self.state.server != ServerState::Stopping
        {
            warn!(state = ?self.state.server, ?message, "Control message was not delivered");
            return;
        }
        self.report(
            LogSource::System,
            "Stop request was not delivered to the server, killing process",
        );
        if let Some(process) = &self.server {
            process.kill();
        }
    }

    fn on_exit(&mut self, kind: ProcessKind, id: ProcessId, outcome: ExitOutcome) {
        let slot = match kind {
            ProcessKind::Server => &mut self.server,
            ProcessKind::Build => &mut self.build,
        };
        if slot.as_ref().map(ManagedProcess::id) != Some(id) {
            debug!(%kind, %id, %outcome, "Ignoring exit of a process that is no longer current");
            return;
        }
        *slot = None;

        match kind {
            ProcessKind::Server => {
                if matches!(
                    self.state.server,
                    ServerState::Stopping | ServerState::Stopped
                ) {
                    self.report(
                        LogSource::System,
                        format!("Server process exited ({outcome})"),
                    );
                } else {
                    warn!(state = ?self.state.server, %outcome, "Server process exited unexpectedly");
                    self.report(
                        LogSource::System,
                        format!("Server process exited unexpectedly ({outcome})"),
                    );
                }
                self.set_server(ServerState::Stopped);
            }
            ProcessKind::Build => {
                let line = match outcome.code {
                    Some(code) => format!("Build finished (exit code {code})"),
                    None => "Build terminated by signal".to_string(),
                };
                self.report(LogSource::Build, line);
                self.set(BuildState::Idle);
            }
        }
    }

    async fn start_build(&mut self) {
        if self.state.build != BuildState::Idle || self.build.is_some() {
            self.report(LogSource::System, "Build is already running, ignoring");
            return;
        }

        match self.launch(ProcessKind::Build).await {
            Ok(process) => {
                self.report(
                    LogSource::System,
                    format!("Build started (pid {})", display_pid(&process)),
                );
                self.watch_exit(&process);
                self.build = Some(process);
                self.set(BuildState::Building);
            }
            Err(e) => self.report(LogSource::System, format!("Failed to start build: {e}")),
        }
    }

    fn start_vcs_update(&mut self) {
        if self.state.vcs != VcsState::Idle {
            self.report(LogSource::System, "Source update already running, ignoring");
            return;
        }
        let Some(events) = self.events.upgrade() else {
            return;
        };

        self.set(VcsState::Updating);
        self.report(LogSource::System, "Updating sources...");

        let vcs = Arc::clone(&self.ports.vcs);
        let logs = Arc::clone(&self.logs);
        tokio::spawn(async move {
            if let Err(e) = sync_sources(vcs.as_ref(), &logs).await {
                report(&logs, LogSource::Vcs, format!("Error: {e}"));
            }
            let _ = events.send(EngineEvent::VcsFinished);
        });
    }

    async fn teardown(&mut self) {
        info!("Shutting down lifecycle engine");
        let processes: Vec<ManagedProcess> =
            self.server.take().into_iter().chain(self.build.take()).collect();
        for process in &processes {
            process.kill();
        }

        let waited = tokio::time::timeout(self.shutdown_timeout, async {
            for process in &processes {
                let outcome = process.wait().await;
                debug!(kind = %process.kind(), id = %process.id(), %outcome, "Process exited during shutdown");
            }
        })
        .await;
        if waited.is_err() {
            warn!(
                timeout = ?self.shutdown_timeout,
                "Supervised processes did not exit in time"
            );
        }

        self.states.close();
        self.logs.close();
    }
}

fn display_pid(process: &ManagedProcess) -> String {
    process
        .pid()
        .map_or_else(|| "unknown".to_string(), |pid| pid.to_string())
}

/// Bring the checkout to the remote head, reporting each step.
async fn sync_sources(vcs: &dyn VersionControlPort, logs: &LogHub) -> Result<(), VcsError> {
    let current = vcs.current_revision().await?;
    report(
        logs,
        LogSource::Vcs,
        format!("Current HEAD: {} - {}", current.short(), current.summary),
    );

    let fetch = vcs.fetch_remote().await?;
    if fetch.updated() {
        let previous = fetch.previous.as_deref().map_or("(none)", short_id);
        report(
            logs,
            LogSource::Vcs,
            format!("Fetch: {previous}..{}", fetch.revision.short()),
        );
    } else {
        report(logs, LogSource::Vcs, "No remote updates");
    }

    let remote = fetch.revision;
    report(
        logs,
        LogSource::Vcs,
        format!("Last commit: {} - {}", remote.short(), remote.summary),
    );

    if remote.id == current.id {
        report(logs, LogSource::Vcs, "Already up-to-date");
        return Ok(());
    }

    vcs.checkout(&remote).await?;
    report(
        logs,
        LogSource::Vcs,
        format!("Checked out commit: {}", remote.short()),
    );
    Ok(())
}
