//! Lifecycle state values replicated to every observer.

use serde::{Deserialize, Serialize};

/// Lifecycle of the supervised server process.
///
/// Legal edges: `Stopped → ProcessStarted → Starting → Started → Stopping →
/// Stopped`, plus a forced `* → Stopped` when the process exits on its own.
/// The enum order carries no meaning; only the edges above do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ServerState {
    #[default]
    Stopped,
    ProcessStarted,
    Starting,
    Started,
    Stopping,
}

impl ServerState {
    /// Whether `self → next` is an edge of the lifecycle graph.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Stopped, Self::ProcessStarted)
                | (Self::ProcessStarted, Self::Starting)
                | (Self::Starting, Self::Started)
                | (Self::Started, Self::Stopping)
                | (_, Self::Stopped)
        )
    }
}

/// Version control synchronisation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VcsState {
    #[default]
    Idle,
    Updating,
}

/// Build process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildState {
    #[default]
    Idle,
    Building,
}

/// A change to one of the three state categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdate {
    Server(ServerState),
    Vcs(VcsState),
    Build(BuildState),
}

impl From<ServerState> for StateUpdate {
    fn from(state: ServerState) -> Self {
        Self::Server(state)
    }
}

impl From<VcsState> for StateUpdate {
    fn from(state: VcsState) -> Self {
        Self::Vcs(state)
    }
}

impl From<BuildState> for StateUpdate {
    fn from(state: BuildState) -> Self {
        Self::Build(state)
    }
}

/// Current value of all three state categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateSnapshot {
    pub server: ServerState,
    pub vcs: VcsState,
    pub build: BuildState,
}

impl StateSnapshot {
    /// Apply an update, returning whether the value changed.
    pub fn apply(&mut self, update: StateUpdate) -> bool {
        match update {
            StateUpdate::Server(state) => std::mem::replace(&mut self.server, state) != state,
            StateUpdate::Vcs(state) => std::mem::replace(&mut self.vcs, state) != state,
            StateUpdate::Build(state) => std::mem::replace(&mut self.build, state) != state,
        }
    }

    /// The snapshot as updates, in the order observers receive them on join.
    pub const fn as_updates(&self) -> [StateUpdate; 3] {
        [
            StateUpdate::Server(self.server),
            StateUpdate::Vcs(self.vcs),
            StateUpdate::Build(self.build),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_lifecycle_edges() {
        use ServerState::*;
        assert!(Stopped.can_transition_to(ProcessStarted));
        assert!(ProcessStarted.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Started));
        assert!(Started.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));
        assert!(Started.can_transition_to(Stopped));

        assert!(!Started.can_transition_to(ProcessStarted));
        assert!(!Stopped.can_transition_to(Started));
        assert!(!ProcessStarted.can_transition_to(Started));
        assert!(!Stopping.can_transition_to(Started));
    }

    #[test]
    fn test_snapshot_apply_reports_change() {
        let mut snapshot = StateSnapshot::default();
        assert!(snapshot.apply(VcsState::Updating.into()));
        assert!(!snapshot.apply(VcsState::Updating.into()));
        assert_eq!(snapshot.vcs, VcsState::Updating);
        assert_eq!(snapshot.server, ServerState::Stopped);
    }

    #[test]
    fn test_default_snapshot_is_idle() {
        let snapshot = StateSnapshot::default();
        assert_eq!(
            snapshot.as_updates(),
            [
                StateUpdate::Server(ServerState::Stopped),
                StateUpdate::Vcs(VcsState::Idle),
                StateUpdate::Build(BuildState::Idle),
            ]
        );
    }
}
