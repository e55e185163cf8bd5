//! Shared fixtures for the transport tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deployd_axum::{AppContext, AppState, ServerConfig, serve};
use deployd_core::{
    DeploySettings, LaunchPlanner, LaunchSpec, LogHub, RemoteFetch, Revision, SpawnError,
    VcsError, VersionControlPort,
};
use deployd_runtime::ProcessSupervisor;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Version control that is always up to date.
pub struct StaticVcs;

#[async_trait]
impl VersionControlPort for StaticVcs {
    async fn current_revision(&self) -> Result<Revision, VcsError> {
        Ok(Revision::new("0123456789abcdef", "Initial commit"))
    }

    async fn fetch_remote(&self) -> Result<RemoteFetch, VcsError> {
        Ok(RemoteFetch {
            previous: Some("0123456789abcdef".to_string()),
            revision: Revision::new("0123456789abcdef", "Initial commit"),
        })
    }

    async fn checkout(&self, _revision: &Revision) -> Result<(), VcsError> {
        Ok(())
    }
}

/// Runs shell one-liners instead of java and gradle.
pub struct ShellPlanner {
    root: std::path::PathBuf,
}

impl ShellPlanner {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl LaunchPlanner for ShellPlanner {
    fn server(&self) -> Result<LaunchSpec, SpawnError> {
        Ok(LaunchSpec::new("sh", &self.root).with_args(["-c", "exec sleep 30"]))
    }

    fn build(&self) -> Result<LaunchSpec, SpawnError> {
        Ok(LaunchSpec::new("sh", &self.root).with_args(["-c", "echo built"]))
    }
}

/// Context wired to the real supervisor and the fakes above.
pub fn context(root: &Path) -> AppState {
    let logs = Arc::new(LogHub::new());
    let supervisor = ProcessSupervisor::new(logs.clone()).with_grace_period(Duration::from_secs(2));
    Arc::new(AppContext::new(
        logs,
        Arc::new(supervisor),
        Arc::new(StaticVcs),
        Arc::new(ShellPlanner::new(root)),
    ))
}

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn start(root: &Path) -> Self {
        let state = context(root);
        let config = ServerConfig::new(DeploySettings::with_defaults(root));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();

        let served = Arc::clone(&state);
        let task = tokio::spawn(async move {
            serve(listener, served, &config, async move {
                let _ = stopped.await;
            })
            .await
        });

        Self {
            addr,
            state,
            stop: Some(stop),
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not shut down")
            .unwrap()
            .unwrap();
    }
}
