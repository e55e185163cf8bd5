//! Messages exchanged with the supervised server process.

use serde::{Deserialize, Serialize};

use super::TaggedMessage;

/// Lifecycle control message on the server's dedicated channel.
///
/// `ServerStopRequest` flows from the orchestrator to the process; every
/// other variant flows the other way. Observers never see these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_")]
pub enum ControlMessage {
    ServerStarting,
    ServerStarted,
    ServerStopRequest,
    ServerStopResponse,
}

impl TaggedMessage for ControlMessage {
    const TAGS: &'static [&'static str] = &[
        "ServerStarting",
        "ServerStarted",
        "ServerStopRequest",
        "ServerStopResponse",
    ];
}
