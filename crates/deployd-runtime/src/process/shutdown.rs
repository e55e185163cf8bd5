//! Terminating supervised children.
//!
//! A killed server gets `grace` to flush and exit after SIGTERM; whatever is
//! still alive afterwards is SIGKILLed. The child is always reaped before
//! returning. Platforms without signals kill outright.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

/// How long a child gets to exit after SIGTERM.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Stop `child` and return its exit status.
///
/// Calling this on a child that has already exited (or been reaped) just
/// returns its status.
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if terminate(child)? {
            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                return status;
            }
            tracing::debug!(pid = ?child.id(), ?grace, "Child ignored SIGTERM, sending SIGKILL");
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    // `kill` is a no-op error once the child is gone; the status is what counts.
    if let Err(e) = child.kill().await {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        return Err(e);
    }
    child.wait().await
}

/// Send SIGTERM. Returns `false` when there is nothing left to signal.
#[cfg(unix)]
fn terminate(child: &Child) -> io::Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(false);
    };
    let pid = i32::try_from(pid).map_err(io::Error::other)?;

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::process::Command;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_sigterm_ends_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();

        let status = shutdown_child(&mut child, DEFAULT_GRACE_PERIOD).await.unwrap();
        assert!(status.code().is_none());
    }

    #[tokio::test]
    async fn test_ignored_sigterm_falls_back_to_sigkill() {
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; exec sleep 30"])
            .spawn()
            .unwrap();
        // Give the shell time to install its trap.
        sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        let status = shutdown_child(&mut child, Duration::from_millis(300))
            .await
            .unwrap();
        assert!(status.code().is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_exited_child_reports_its_status() {
        let mut child = Command::new("sh").args(["-c", "exit 4"]).spawn().unwrap();
        sleep(Duration::from_millis(100)).await;

        let status = shutdown_child(&mut child, DEFAULT_GRACE_PERIOD).await.unwrap();
        assert_eq!(status.code(), Some(4));

        // Already reaped: same status again.
        let again = shutdown_child(&mut child, DEFAULT_GRACE_PERIOD).await.unwrap();
        assert_eq!(again.code(), Some(4));
    }
}
