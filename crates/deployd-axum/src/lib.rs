//! Axum transport for the deployment control plane.
//!
//! Serves the observer WebSocket (`/api/ws`), the control WebSocket the
//! supervised server dials back to (`/ipc/server`), a `/health` probe and an
//! optional static UI directory. [`bootstrap`] is the composition root.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings; these are used by tests/
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tokio_tungstenite as _;
#[cfg(test)]
use tower as _;

pub mod bootstrap;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export primary types
pub use bootstrap::{AppContext, CorsConfig, ServerConfig, bootstrap, serve, start_server};
pub use routes::{create_router, create_spa_router};
pub use state::AppState;
