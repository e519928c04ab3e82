//! Opening folders in the desktop file browser

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

use crate::constants;

/// Reveals a path in the system file browser
pub trait Shell: Send + Sync {
    fn reveal_path(&self, path: &Path) -> Result<(), String>;
}

/// Delegates to `xdg-open`
#[derive(Debug, Default, Clone, Copy)]
pub struct XdgOpen;

impl Shell for XdgOpen {
    fn reveal_path(&self, path: &Path) -> Result<(), String> {
        run_opener(constants::launcher::OPENER, path)
    }
}

/// Run `program <path>`. A failure carries the program's stderr when it
/// printed any.
fn run_opener(program: &str, path: &Path) -> Result<(), String> {
    let mut child = Command::new(program)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to run {program}: {e}"))?;

    let status = child
        .wait()
        .map_err(|e| format!("failed to wait for {program}: {e}"))?;
    if status.success() {
        // A file manager started by the opener may still hold stderr open
        return Ok(());
    }

    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr);
    }
    match stderr.trim() {
        "" => Err(format!("{program} exited with {status}")),
        message => Err(message.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Opened { path: PathBuf, label: String },
    Failed { path: PathBuf, reason: String },
}

impl LaunchOutcome {
    /// One-line status, as shown in the status bar
    pub fn status_line(&self) -> String {
        match self {
            Self::Opened { path, label } if label.is_empty() => {
                format!("Opened: {}", path.display())
            }
            Self::Opened { label, .. } => format!("Opened: {label}"),
            Self::Failed { path, reason } => {
                format!("Error: Could not open {} - {reason}", path.display())
            }
        }
    }
}

pub struct FolderLauncher {
    shell: Box<dyn Shell>,
}

impl FolderLauncher {
    pub fn new(shell: impl Shell + 'static) -> Self {
        Self {
            shell: Box::new(shell),
        }
    }

    /// Open `path`; never fails, the outcome carries any error
    pub fn open(&self, path: &Path, label: &str) -> LaunchOutcome {
        if let Err(e) = fs::metadata(path) {
            debug!(path = ?path, error = %e, "Folder not accessible");
            return LaunchOutcome::Failed {
                path: path.to_path_buf(),
                reason: constants::launcher::NOT_ACCESSIBLE.to_string(),
            };
        }

        match self.shell.reveal_path(path) {
            Ok(()) => {
                info!(path = ?path, label, "Opened folder");
                LaunchOutcome::Opened {
                    path: path.to_path_buf(),
                    label: label.to_string(),
                }
            }
            Err(reason) => {
                error!(path = ?path, reason = %reason, "Failed to open folder");
                LaunchOutcome::Failed {
                    path: path.to_path_buf(),
                    reason,
                }
            }
        }
    }
}
