//! Axum server bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together:
//! the hubs, the runtime adapters and the lifecycle engine are created here
//! and handed to the router as one [`AppContext`].

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use deployd_core::{
    DeploySettings, EngineHandle, EnginePorts, LaunchPlanner, LifecycleEngine, LogHub,
    ProcessSupervisorPort, StateHub, VersionControlPort,
};
use deployd_runtime::{ControlChannel, DeployLaunchPlanner, GitVersionControl, ProcessSupervisor};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::state::AppState;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub settings: DeploySettings,
    pub cors: CorsConfig,
}

impl ServerConfig {
    pub fn new(settings: DeploySettings) -> Self {
        Self {
            settings,
            cors: CorsConfig::default(),
        }
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

/// Everything the handlers need.
pub struct AppContext {
    /// Sender side of the lifecycle engine.
    pub engine: EngineHandle,
    pub logs: Arc<LogHub>,
    pub states: Arc<StateHub>,
    /// Registry of the supervised server's control connection.
    pub control: Arc<ControlChannel>,
    /// Cancelled once the engine has shut down; ends open control sockets.
    pub shutdown: CancellationToken,
}

impl AppContext {
    /// Wire the engine to the given adapters and start it.
    ///
    /// `logs` must be the hub the supervisor's drains write to. Must be
    /// called inside a Tokio runtime.
    pub fn new(
        logs: Arc<LogHub>,
        supervisor: Arc<dyn ProcessSupervisorPort>,
        vcs: Arc<dyn VersionControlPort>,
        launcher: Arc<dyn LaunchPlanner>,
    ) -> Self {
        let states = Arc::new(StateHub::new());
        let (control, control_events) = ControlChannel::new();
        let control = Arc::new(control);

        let ports = EnginePorts {
            supervisor,
            vcs,
            control: control.clone(),
            launcher,
        };
        let (engine, _task) =
            LifecycleEngine::new(ports, Arc::clone(&logs), Arc::clone(&states)).spawn(control_events);

        Self {
            engine,
            logs,
            states,
            control,
            shutdown: CancellationToken::new(),
        }
    }

    /// Shut the engine down, then release open control connections.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
        self.shutdown.cancel();
    }
}

/// Build the application context from deployment settings.
pub fn bootstrap(settings: &DeploySettings) -> Result<AppContext> {
    settings.validate().context("Invalid settings")?;
    if !settings.root.is_dir() {
        bail!("Server root {} is not a directory", settings.root.display());
    }

    let vcs = GitVersionControl::new(&settings.root, &settings.remote, &settings.branch);
    vcs.verify()
        .with_context(|| format!("Cannot use {} as a git checkout", settings.root.display()))?;

    info!(
        root = %settings.root.display(),
        remote = %settings.remote,
        branch = %settings.branch,
        control_url = %settings.control_url(),
        "Bootstrap resolved settings"
    );

    let logs = Arc::new(LogHub::new());
    let supervisor = ProcessSupervisor::new(logs.clone());
    let launcher = DeployLaunchPlanner::new(settings.clone());

    Ok(AppContext::new(
        logs,
        Arc::new(supervisor),
        Arc::new(vcs),
        Arc::new(launcher),
    ))
}

/// Serve `state` on `listener` until `shutdown` resolves.
///
/// On shutdown the engine is torn down first (children are killed), then
/// the listener is released.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = match config.settings.static_dir.as_deref() {
        Some(static_dir) => {
            info!("Serving static assets from: {}", static_dir.display());
            crate::routes::create_spa_router(Arc::clone(&state), static_dir, &config.cors)
        }
        None => crate::routes::create_router(Arc::clone(&state), &config.cors),
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested, stopping lifecycle engine");
            state.shutdown().await;
        })
        .await
        .context("Web server failed")?;

    info!("Stopped web server");
    Ok(())
}

/// Bootstrap, bind and serve until `shutdown` resolves.
pub async fn start_server(
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let state: AppState = Arc::new(bootstrap(&config.settings)?);

    let addr = format!("{}:{}", config.settings.host, config.settings.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("deployd listening on http://{}", addr);

    serve(listener, state, &config, shutdown).await
}
