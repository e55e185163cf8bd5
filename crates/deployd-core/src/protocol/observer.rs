//! Messages exchanged with UI observers.

use serde::{Deserialize, Serialize};

use super::TaggedMessage;
use crate::domain::{BuildState, LogEntry, LogSource, ServerState, StateUpdate, VcsState};

/// Outbound message pushed to every observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_")]
pub enum ObserverMessage {
    ServerState { state: ServerState },
    VcsState { state: VcsState },
    GradleState { state: BuildState },
    Log { source: LogSource, content: String },
}

impl From<StateUpdate> for ObserverMessage {
    fn from(update: StateUpdate) -> Self {
        match update {
            StateUpdate::Server(state) => Self::ServerState { state },
            StateUpdate::Vcs(state) => Self::VcsState { state },
            StateUpdate::Build(state) => Self::GradleState { state },
        }
    }
}

impl From<LogEntry> for ObserverMessage {
    fn from(entry: LogEntry) -> Self {
        Self::Log {
            source: entry.source,
            content: entry.content,
        }
    }
}

/// Requested server action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerAction {
    Start,
    Stop,
}

/// Inbound command sent by an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_")]
pub enum ObserverCommand {
    ServerAction { action: ServerAction },
    ClearLogs { source: LogSource },
    VcsUpdate,
    GradleBuild,
}

impl TaggedMessage for ObserverCommand {
    const TAGS: &'static [&'static str] = &["ServerAction", "ClearLogs", "VcsUpdate", "GradleBuild"];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode, encode};

    #[test]
    fn test_state_messages_use_ui_tags() {
        let json = encode(&ObserverMessage::from(StateUpdate::Build(BuildState::Building))).unwrap();
        assert_eq!(json, r#"{"_":"GradleState","state":"Building"}"#);

        let json = encode(&ObserverMessage::from(StateUpdate::Server(ServerState::ProcessStarted)))
            .unwrap();
        assert_eq!(json, r#"{"_":"ServerState","state":"ProcessStarted"}"#);
    }

    #[test]
    fn test_log_message_carries_source_beside_tag() {
        let message = ObserverMessage::from(LogEntry::new(LogSource::Vcs, "fetching\n"));
        assert_eq!(
            encode(&message).unwrap(),
            r#"{"_":"Log","source":"Git","content":"fetching\n"}"#
        );
    }

    #[test]
    fn test_decode_commands() {
        assert_eq!(
            decode::<ObserverCommand>(r#"{"_":"ServerAction","action":"Stop"}"#).unwrap(),
            ObserverCommand::ServerAction {
                action: ServerAction::Stop
            }
        );
        assert_eq!(
            decode::<ObserverCommand>(r#"{"_":"ClearLogs","source":"Gradle"}"#).unwrap(),
            ObserverCommand::ClearLogs {
                source: LogSource::Build
            }
        );
        assert_eq!(
            decode::<ObserverCommand>(r#"{"_":"GradleBuild"}"#).unwrap(),
            ObserverCommand::GradleBuild
        );
        assert_eq!(
            decode::<ObserverCommand>(r#"{"_":"VcsUpdate"}"#).unwrap(),
            ObserverCommand::VcsUpdate
        );
    }
}
