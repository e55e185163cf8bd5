//! End-to-end WebSocket tests against a served router.
//!
//! A real supervisor runs `sh` stand-ins for the server and the build; a
//! tokio-tungstenite client plays the server's side of the control channel.

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::TestServer;
use deployd_core::{CONTROL_PATH, LogEntry, LogSource, OBSERVER_PATH};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(10);

async fn connect(url: &str) -> Client {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

/// Next text frame as JSON.
async fn next_json(ws: &mut Client) -> Value {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
                Some(Ok(_)) => {}
                other => panic!("socket ended: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a frame")
}

/// Skip frames until one equals `expected`.
async fn expect_frame(ws: &mut Client, expected: Value) {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            if next_json(ws).await == expected {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never received {expected}"));
}

async fn expect_initial_state(ws: &mut Client) {
    assert_eq!(next_json(ws).await, json!({"_": "ServerState", "state": "Stopped"}));
    assert_eq!(next_json(ws).await, json!({"_": "VcsState", "state": "Idle"}));
    assert_eq!(next_json(ws).await, json!({"_": "GradleState", "state": "Idle"}));
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}

#[tokio::test]
async fn test_observer_receives_state_then_history() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    server.state.logs.emit(LogEntry::new(LogSource::Vcs, "Current HEAD: 01234567\n"));
    server.state.logs.emit(LogEntry::new(LogSource::Server, "listening\n"));

    let mut ws = connect(&server.url(OBSERVER_PATH)).await;
    expect_initial_state(&mut ws).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"_": "Log", "source": "Git", "content": "Current HEAD: 01234567\n"})
    );
    assert_eq!(
        next_json(&mut ws).await,
        json!({"_": "Log", "source": "Server", "content": "listening\n"})
    );

    server.state.logs.emit(LogEntry::new(LogSource::System, "live\n"));
    assert_eq!(
        next_json(&mut ws).await,
        json!({"_": "Log", "source": "System", "content": "live\n"})
    );

    ws.close(None).await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_server_lifecycle_over_control_channel() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;

    let mut observer = connect(&server.url(OBSERVER_PATH)).await;
    expect_initial_state(&mut observer).await;

    send(&mut observer, json!({"_": "ServerAction", "action": "Start"})).await;
    expect_frame(&mut observer, json!({"_": "ServerState", "state": "ProcessStarted"})).await;

    let mut control = connect(&server.url(CONTROL_PATH)).await;
    send(&mut control, json!({"_": "ServerStarting"})).await;
    expect_frame(&mut observer, json!({"_": "ServerState", "state": "Starting"})).await;
    send(&mut control, json!({"_": "ServerStarted"})).await;
    expect_frame(&mut observer, json!({"_": "ServerState", "state": "Started"})).await;

    send(&mut observer, json!({"_": "ServerAction", "action": "Stop"})).await;
    expect_frame(&mut observer, json!({"_": "ServerState", "state": "Stopping"})).await;
    assert_eq!(next_json(&mut control).await, json!({"_": "ServerStopRequest"}));

    send(&mut control, json!({"_": "ServerStopResponse"})).await;
    expect_frame(&mut observer, json!({"_": "ServerState", "state": "Stopped"})).await;
    expect_frame(
        &mut observer,
        json!({"_": "Log", "source": "System", "content": "Server process exited (terminated by signal)\n"}),
    )
    .await;

    control.close(None).await.unwrap();
    observer.close(None).await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_build_output_reaches_observer() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;

    let mut ws = connect(&server.url(OBSERVER_PATH)).await;
    expect_initial_state(&mut ws).await;

    send(&mut ws, json!({"_": "GradleBuild"})).await;
    expect_frame(&mut ws, json!({"_": "GradleState", "state": "Building"})).await;
    expect_frame(&mut ws, json!({"_": "Log", "source": "Gradle", "content": "built\n"})).await;
    expect_frame(&mut ws, json!({"_": "GradleState", "state": "Idle"})).await;

    ws.close(None).await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_invalid_frame_keeps_connection_open() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    server.state.logs.emit(LogEntry::new(LogSource::Build, "BUILD SUCCESSFUL\n"));

    let mut ws = connect(&server.url(OBSERVER_PATH)).await;
    expect_initial_state(&mut ws).await;
    next_json(&mut ws).await;

    ws.send(Message::text("not json")).await.unwrap();
    send(&mut ws, json!({"_": "Reboot"})).await;
    send(&mut ws, json!({"_": "ClearLogs", "source": "Gradle"})).await;

    let logs = server.state.logs.clone();
    wait_until(|| logs.history_of(LogSource::Build).is_empty()).await;

    ws.close(None).await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_vcs_update_reports_up_to_date() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;

    let mut ws = connect(&server.url(OBSERVER_PATH)).await;
    expect_initial_state(&mut ws).await;

    send(&mut ws, json!({"_": "VcsUpdate"})).await;
    expect_frame(&mut ws, json!({"_": "VcsState", "state": "Updating"})).await;
    expect_frame(&mut ws, json!({"_": "Log", "source": "Git", "content": "Already up-to-date\n"})).await;
    expect_frame(&mut ws, json!({"_": "VcsState", "state": "Idle"})).await;

    ws.close(None).await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_kills_running_server() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;

    let mut ws = connect(&server.url(OBSERVER_PATH)).await;
    expect_initial_state(&mut ws).await;
    send(&mut ws, json!({"_": "ServerAction", "action": "Start"})).await;
    expect_frame(&mut ws, json!({"_": "ServerState", "state": "ProcessStarted"})).await;

    let state = server.state.clone();
    server.shutdown().await;

    assert_eq!(state.logs.observer_count(), 0);
    assert_eq!(state.states.observer_count(), 0);
}
