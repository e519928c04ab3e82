//! Command-line management of the slot configuration
//!
//! One-shot commands edit the configuration through the registry and then
//! ask a running daemon to reload it.

pub mod control;
pub mod dialog;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::common::pidfile;
use crate::config::{BindingEdit, BindingRegistry, Configuration, defaults};
use crate::constants;
use crate::daemon::launcher::{FolderLauncher, XdgOpen};

pub use control::{ControlSurface, UiEvent};
use dialog::ZenityDialog;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show every slot and which hotkeys are active
    List {
        /// Print the configuration record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change a slot's folder, hotkey or label (an empty value clears it)
    Set {
        /// Slot id, e.g. ID3; a new id creates a slot
        id: String,
        #[arg(long)]
        path: Option<String>,
        /// Accelerator such as CommandOrControl+Alt+3
        #[arg(long)]
        hotkey: Option<String>,
        #[arg(long)]
        label: Option<String>,
    },

    /// Choose a slot's folder with a folder picker
    Browse { id: String },

    /// Open a slot's folder now
    Open { id: String },

    /// Write the configuration to a JSON file (asks for a location if omitted)
    Export { file: Option<PathBuf> },

    /// Replace the configuration with a JSON file (asks for a file if omitted)
    Import { file: Option<PathBuf> },

    /// Restore the built-in twelve slots
    Reset,
}

pub fn run_command(
    command: Command,
    registry: Arc<BindingRegistry>,
    config_dir: &Path,
) -> Result<()> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let launcher = Arc::new(FolderLauncher::new(XdgOpen));
    let surface = ControlSurface::new(registry, launcher, ZenityDialog, events_tx);

    let changed = execute(&surface, command)?;

    while let Ok(event) = events_rx.try_recv() {
        println!("{}", event.status_line());
    }

    if changed {
        if pidfile::signal_reload(config_dir)? {
            println!("Running daemon reloaded");
        } else {
            debug!("No running daemon to notify");
        }
    }
    Ok(())
}

/// Run one command; returns whether the stored configuration changed
fn execute(surface: &ControlSurface<ZenityDialog>, command: Command) -> Result<bool> {
    match command {
        Command::List { json: false } => {
            print!("{}", render_list(&surface.snapshot()));
            Ok(false)
        }
        Command::List { json: true } => {
            println!("{}", serde_json::to_string_pretty(&surface.get_config())?);
            Ok(false)
        }
        Command::Set {
            id,
            path,
            hotkey,
            label,
        } => {
            if path.is_none() && hotkey.is_none() && label.is_none() {
                bail!("Nothing to change: pass --path, --hotkey or --label");
            }
            let path = path.map(absolute_folder).transpose()?;
            surface.edit_slot(&id, BindingEdit { path, hotkey, label })?;
            println!("Configuration saved!");
            Ok(true)
        }
        Command::Browse { id } => {
            if surface.snapshot().get(&id).is_none() {
                bail!("Unknown slot '{id}'");
            }
            let Some(folder) = surface.browse_folder() else {
                println!("No folder selected");
                return Ok(false);
            };
            let edit = BindingEdit {
                path: Some(folder.to_string_lossy().into_owned()),
                ..Default::default()
            };
            surface.edit_slot(&id, edit)?;
            println!("{id}: {}", folder.display());
            Ok(true)
        }
        Command::Open { id } => {
            if surface.open_slot(&id)?.is_none() {
                println!("{id}: {}", constants::launcher::NO_PATH);
            }
            Ok(false)
        }
        Command::Export { file: Some(file) } => {
            surface.export_to(&file)?;
            println!("Configuration exported to {}", file.display());
            Ok(false)
        }
        Command::Export { file: None } => {
            if surface.export_config() {
                println!("Configuration exported");
            } else {
                println!("Export cancelled");
            }
            Ok(false)
        }
        Command::Import { file: Some(file) } => {
            surface.import_from(&file)?;
            Ok(true)
        }
        Command::Import { file: None } => {
            let imported = surface.import_config();
            if !imported {
                println!("Import cancelled");
            }
            Ok(imported)
        }
        Command::Reset => {
            if !surface.save_config(defaults::hardcoded().to_record()) {
                bail!("Failed to reset configuration");
            }
            println!("Configuration reset to defaults");
            Ok(true)
        }
    }
}

/// Resolve a folder given on the command line against the working directory
fn absolute_folder(path: String) -> Result<String> {
    if path.is_empty() {
        return Ok(path);
    }
    let absolute =
        std::path::absolute(&path).with_context(|| format!("Failed to resolve folder {path:?}"))?;
    Ok(absolute.to_string_lossy().into_owned())
}

/// Active hotkeys first, then every slot in id order
fn render_list(config: &Configuration) -> String {
    let mut out = String::from("Active hotkeys:\n");

    let mut any_active = false;
    for (_, binding) in config.active() {
        if let (Some(hotkey), Some(path)) = (&binding.hotkey, &binding.path) {
            any_active = true;
            out.push_str(&format!(
                "  {:<34} {} ({})\n",
                hotkey.to_string(),
                binding.display_name(),
                path.display()
            ));
        }
    }
    if !any_active {
        out.push_str("  none\n");
    }

    out.push_str("\nSlots:\n");
    if config.is_empty() {
        out.push_str("  none\n");
    }
    for (id, binding) in config.iter() {
        let hotkey = binding
            .hotkey
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".into());
        let path = binding
            .path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "(not configured)".into());
        out.push_str(&format!(
            "  {:<6} {:<34} {:<12} {}\n",
            id, hotkey, binding.label, path
        ));
    }
    out
}
