//! WebSocket upgrade handlers.
//!
//! - [`observer_ws`] - UI observers: state and log fan-out, user commands
//! - [`control_ws`] - the supervised server's control connection

pub mod control_ws;
pub mod observer_ws;
