//! Version control capability.

use async_trait::async_trait;

use super::VcsError;

/// Length of abbreviated revision ids in log output.
pub const SHORT_ID_LEN: usize = 8;

/// Abbreviate a hex revision id for display.
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// A commit as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Full hex id.
    pub id: String,
    /// First line of the commit message.
    pub summary: String,
}

impl Revision {
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
        }
    }

    /// Id abbreviated for display.
    pub fn short(&self) -> &str {
        short_id(&self.id)
    }
}

/// Result of fetching the tracked branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFetch {
    /// Tracking ref value before the fetch, if it existed.
    pub previous: Option<String>,
    /// Tracking ref value after the fetch.
    pub revision: Revision,
}

impl RemoteFetch {
    /// Whether the fetch moved the tracking ref.
    pub fn updated(&self) -> bool {
        self.previous.as_deref() != Some(self.revision.id.as_str())
    }
}

/// Port for the version control backend.
///
/// Operations may touch the network and must not block the caller's task.
#[async_trait]
pub trait VersionControlPort: Send + Sync {
    /// Commit currently checked out.
    async fn current_revision(&self) -> Result<Revision, VcsError>;

    /// Fetch the tracked branch and report its head.
    async fn fetch_remote(&self) -> Result<RemoteFetch, VcsError>;

    /// Force the working tree to the given revision.
    async fn checkout(&self, revision: &Revision) -> Result<(), VcsError>;
}
