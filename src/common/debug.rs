use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

use crate::constants;

/// Log the parts of the environment that decide whether hotkeys and
/// folder opening can work
pub fn log_environment() {
    info!("=== Environment ===");

    if let Ok(kernel) = get_command_output("uname", &["-sr"]) {
        info!("Kernel: {}", kernel);
    }

    if let Ok(os_release) = std::fs::read_to_string("/etc/os-release")
        && let Some(name) = os_release
            .lines()
            .find_map(|line| line.strip_prefix("PRETTY_NAME="))
    {
        info!("OS: {}", name.trim_matches('"'));
    }

    info!(
        "Session Type: {}",
        env::var("XDG_SESSION_TYPE").unwrap_or_else(|_| "unknown".into())
    );
    info!(
        "Desktop Environment: {}",
        env::var("XDG_CURRENT_DESKTOP").unwrap_or_else(|_| "unknown".into())
    );
    info!(
        "DISPLAY: {}",
        env::var("DISPLAY").unwrap_or_else(|_| "unset".into())
    );

    for tool in [constants::launcher::OPENER, constants::dialog::COMMAND] {
        match find_in_path(tool) {
            Some(path) => info!("{}: {}", tool, path.display()),
            None => info!("{}: not found", tool),
        }
    }

    info!("===================");
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn get_command_output(cmd: &str, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new(cmd).args(args).output()?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
