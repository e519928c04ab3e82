#![deny(unsafe_code)]

mod common;
mod config;
mod constants;
mod daemon;
mod input;
mod manager;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{BindingRegistry, JsonFileStore, defaults};

#[derive(Parser)]
#[command(name = "folder-hotkeys")]
#[command(version)]
#[command(about = "Open folders in the file browser with global hotkeys", long_about = None)]
struct Cli {
    /// Verbose logging plus an environment report
    #[arg(long, global = true)]
    debug: bool,

    /// Default configuration used when nothing has been saved yet
    #[arg(long, global = true, value_name = "FILE")]
    defaults: Option<PathBuf>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Run the hotkey daemon (default)
    Run,

    #[command(flatten)]
    Manage(manager::Command),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.debug { "debug" } else { "info" }));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    if cli.debug {
        common::debug::log_environment();
    }

    let store = JsonFileStore::in_config_dir();
    let config_dir = store
        .path()
        .parent()
        .map(PathBuf::from)
        .context("Configuration path has no parent directory")?;
    let bundled = defaults::locate_bundled(cli.defaults.as_deref());
    let (registry, _) = BindingRegistry::load_initial(Box::new(store), bundled.as_deref());
    let registry = Arc::new(registry);

    match cli.mode.unwrap_or(Mode::Run) {
        Mode::Run => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build Tokio runtime")?;

            let result = rt.block_on(daemon::run_daemon(registry, &config_dir));
            // A hung xdg-open must not keep the process alive
            rt.shutdown_timeout(Duration::from_secs(1));
            result
        }
        Mode::Manage(command) => manager::run_command(command, registry, &config_dir),
    }
}
