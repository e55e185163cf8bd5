//! Git-backed version control capability.
//!
//! libgit2 is blocking, so every operation opens the repository on the
//! blocking pool and never holds a `Repository` across an await.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use deployd_core::{RemoteFetch, Revision, VcsError, VersionControlPort};
use git2::build::CheckoutBuilder;
use git2::{Commit, Oid, Repository};
use tracing::debug;

#[derive(Debug)]
struct GitTarget {
    root: PathBuf,
    remote: String,
    branch: String,
}

/// Tracks `<remote>/<branch>` for the work tree at `root`.
#[derive(Debug, Clone)]
pub struct GitVersionControl {
    target: Arc<GitTarget>,
}

impl GitVersionControl {
    pub fn new(
        root: impl Into<PathBuf>,
        remote: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            target: Arc::new(GitTarget {
                root: root.into(),
                remote: remote.into(),
                branch: branch.into(),
            }),
        }
    }

    /// Check that `root` is a repository with the configured remote.
    pub fn verify(&self) -> Result<(), VcsError> {
        let repo = self.target.open()?;
        repo.find_remote(&self.target.remote)
            .map_err(|e| VcsError::Resolve(format!("remote {}: {}", self.target.remote, e.message())))?;
        Ok(())
    }

    async fn run<T, F>(&self, op: F) -> Result<T, VcsError>
    where
        T: Send + 'static,
        F: FnOnce(&GitTarget) -> Result<T, VcsError> + Send + 'static,
    {
        let target = Arc::clone(&self.target);
        tokio::task::spawn_blocking(move || op(&target))
            .await
            .map_err(|e| VcsError::Task(e.to_string()))?
    }
}

fn revision(commit: &Commit<'_>) -> Revision {
    Revision::new(commit.id().to_string(), commit.summary().unwrap_or_default())
}

impl GitTarget {
    fn open(&self) -> Result<Repository, VcsError> {
        Repository::open(&self.root).map_err(|e| VcsError::Open(e.message().to_string()))
    }

    fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }

    fn refspec(&self) -> String {
        format!(
            "refs/heads/{branch}:refs/remotes/{remote}/{branch}",
            branch = self.branch,
            remote = self.remote
        )
    }

    fn current(&self) -> Result<Revision, VcsError> {
        let repo = self.open()?;
        let commit = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(|e| VcsError::Resolve(format!("HEAD: {}", e.message())))?;
        Ok(revision(&commit))
    }

    fn fetch(&self) -> Result<RemoteFetch, VcsError> {
        let repo = self.open()?;
        let tracking = self.tracking_ref();
        let previous = repo.refname_to_id(&tracking).ok().map(|oid| oid.to_string());

        let mut remote = repo
            .find_remote(&self.remote)
            .map_err(|e| VcsError::Fetch(e.message().to_string()))?;
        remote
            .fetch(&[self.refspec()], None, None)
            .map_err(|e| VcsError::Fetch(e.message().to_string()))?;

        let commit = repo
            .refname_to_id(&tracking)
            .and_then(|oid| repo.find_commit(oid))
            .map_err(|e| VcsError::Resolve(format!("{tracking}: {}", e.message())))?;
        debug!(%tracking, head = %commit.id(), "Fetched remote branch");

        Ok(RemoteFetch {
            previous,
            revision: revision(&commit),
        })
    }

    fn checkout(&self, id: &str) -> Result<(), VcsError> {
        let repo = self.open()?;
        let commit = Oid::from_str(id)
            .and_then(|oid| repo.find_commit(oid))
            .map_err(|e| VcsError::Resolve(format!("{id}: {}", e.message())))?;

        let mut options = CheckoutBuilder::new();
        options.force();
        repo.checkout_tree(commit.as_object(), Some(&mut options))
            .map_err(|e| VcsError::Checkout(e.message().to_string()))?;
        repo.set_head_detached(commit.id())
            .map_err(|e| VcsError::Checkout(e.message().to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl VersionControlPort for GitVersionControl {
    async fn current_revision(&self) -> Result<Revision, VcsError> {
        self.run(GitTarget::current).await
    }

    async fn fetch_remote(&self) -> Result<RemoteFetch, VcsError> {
        self.run(GitTarget::fetch).await
    }

    async fn checkout(&self, revision: &Revision) -> Result<(), VcsError> {
        let id = revision.id.clone();
        self.run(move |target| target.checkout(&id)).await
    }
}
