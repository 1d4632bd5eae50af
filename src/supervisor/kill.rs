//! Cross-platform process-tree termination
//!
//! Killing a supervised command must take down the whole process tree, not
//! just the direct shell child. The capability is abstracted behind
//! [`ProcessTreeKiller`] with one implementation per platform, selected
//! once at startup rather than branched inline at each call site.

use std::io;

/// Terminates a spawned process and all of its descendants
pub trait ProcessTreeKiller: Send + Sync {
    /// Kill the process tree rooted at `pid`
    ///
    /// Must be safe to call after the tree has already exited (idempotent
    /// from the supervisor's point of view; callers guard with their own
    /// exited flag and ignore "no such process" errors).
    fn kill_tree(&self, pid: u32) -> io::Result<()>;
}

/// POSIX implementation: signal the process group
///
/// The supervisor spawns children with `process_group(0)`, so the child's
/// pid doubles as its process group id.
#[cfg(unix)]
pub struct UnixProcessGroupKiller;

#[cfg(unix)]
impl ProcessTreeKiller for UnixProcessGroupKiller {
    fn kill_tree(&self, pid: u32) -> io::Result<()> {
        // SAFETY: killpg with SIGKILL has no memory-safety preconditions
        let result = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if result == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            // Group already gone: the tree exited between the trigger and
            // the kill
            return Ok(());
        }
        Err(err)
    }
}

/// Windows implementation: `taskkill /T /F` on the root pid
#[cfg(windows)]
pub struct WindowsTaskKiller;

#[cfg(windows)]
impl ProcessTreeKiller for WindowsTaskKiller {
    fn kill_tree(&self, pid: u32) -> io::Result<()> {
        let output = std::process::Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .output()?;
        // taskkill exits non-zero when the pid is already gone; treat that
        // the same as a successful kill
        let _ = output;
        Ok(())
    }
}

/// The platform's process-tree killer, selected at startup
pub fn platform_killer() -> std::sync::Arc<dyn ProcessTreeKiller> {
    #[cfg(unix)]
    {
        std::sync::Arc::new(UnixProcessGroupKiller)
    }
    #[cfg(windows)]
    {
        std::sync::Arc::new(WindowsTaskKiller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_tree_terminates_process_group() {
        use std::process::Stdio;

        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg("sleep 30")
            .process_group(0)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        platform_killer().kill_tree(pid).unwrap();

        let status = child.wait().await.unwrap();
        assert!(!status.success());
        assert!(status.code().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_tree_idempotent_after_exit() {
        use std::process::Stdio;

        let mut child = tokio::process::Command::new("true")
            .process_group(0)
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        child.wait().await.unwrap();

        // The group is gone; ESRCH maps to Ok
        assert!(platform_killer().kill_tree(pid).is_ok());
    }
}
