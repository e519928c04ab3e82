//! Daemon pid file and reload signalling

use anyhow::{Context, Result, bail};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants;

/// Removes the pid file when dropped
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Record this process as the daemon; refuses if another live daemon owns the file
    pub fn create(dir: &Path) -> Result<Self> {
        let path = dir.join(constants::config::PID_FILENAME);

        if let Some(pid) = read_pid(&path)
            && pid != Pid::this()
            && is_alive(pid)
        {
            bail!("Daemon already running (pid {pid})");
        }

        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        fs::write(&path, format!("{}\n", std::process::id()))
            .with_context(|| format!("Failed to write pid file {:?}", path))?;

        debug!(path = ?path, "Wrote pid file");
        Ok(Self { path })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if read_pid(&self.path) == Some(Pid::this())
            && let Err(e) = fs::remove_file(&self.path)
        {
            warn!(path = ?self.path, error = %e, "Failed to remove pid file");
        }
    }
}

fn read_pid(path: &Path) -> Option<Pid> {
    let raw = fs::read_to_string(path).ok()?;
    // 0 and negative values address process groups
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 1)
        .map(Pid::from_raw)
}

fn is_alive(pid: Pid) -> bool {
    !matches!(signal::kill(pid, None), Err(Errno::ESRCH))
}

/// Ask a running daemon to reload its configuration.
/// Returns `false` when no daemon is running.
pub fn signal_reload(dir: &Path) -> Result<bool> {
    let path = dir.join(constants::config::PID_FILENAME);
    let Some(pid) = read_pid(&path) else {
        return Ok(false);
    };

    match signal::kill(pid, Signal::SIGHUP) {
        Ok(()) => {
            info!(pid = %pid, "Asked daemon to reload");
            Ok(true)
        }
        Err(Errno::ESRCH) => {
            debug!(pid = %pid, "Removing stale pid file");
            let _ = fs::remove_file(&path);
            Ok(false)
        }
        Err(e) => Err(e).context("Failed to send SIGHUP to daemon"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");

        let pid_file = PidFile::create(dir.path()).unwrap();
        assert_eq!(read_pid(&path), Some(Pid::this()));

        drop(pid_file);
        assert!(!path.exists());
    }

    #[test]
    fn test_refuses_live_foreign_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = std::process::Command::new("sleep").arg("5").spawn().unwrap();
        fs::write(dir.path().join("daemon.pid"), child.id().to_string()).unwrap();

        assert!(PidFile::create(dir.path()).is_err());

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn test_no_daemon_means_no_signal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!signal_reload(dir.path()).unwrap());

        fs::write(dir.path().join("daemon.pid"), "0").unwrap();
        assert!(!signal_reload(dir.path()).unwrap());

        fs::write(dir.path().join("daemon.pid"), "garbage").unwrap();
        assert!(!signal_reload(dir.path()).unwrap());
    }

    #[test]
    fn test_stale_pid_file_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        let path = dir.path().join("daemon.pid");
        fs::write(&path, pid.to_string()).unwrap();
        assert!(!signal_reload(dir.path()).unwrap());
        assert!(!path.exists());
    }
}
