//! Resident daemon event loop
//!
//! Owns the X11 backend through the dispatcher. Configuration changes
//! arrive on the registry's watch channel; SIGHUP re-reads the store so
//! one-shot CLI commands can push their edits into a running daemon.

use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::common::pidfile::PidFile;
use crate::config::BindingRegistry;
use crate::constants;
use crate::daemon::dispatcher::{HotkeyDispatcher, run_launch_worker};
use crate::daemon::launcher::{FolderLauncher, XdgOpen};
use crate::input::{GlobalHotkey, HotkeyEvent, X11Backend};
use crate::manager::UiEvent;

pub async fn run_daemon(registry: Arc<BindingRegistry>, config_dir: &Path) -> Result<()> {
    let _pid_file = PidFile::create(config_dir)?;

    let mut sighup =
        signal(SignalKind::hangup()).context("Failed to register SIGHUP handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    let (hotkey_tx, mut hotkey_rx) = mpsc::channel(constants::dispatch::HOTKEY_EVENT_CAPACITY);
    let backend = X11Backend::connect(hotkey_tx)?;

    let (launch_tx, launch_rx) = mpsc::channel(constants::dispatch::LAUNCH_QUEUE_CAPACITY);
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let launcher = Arc::new(FolderLauncher::new(XdgOpen));
    tokio::spawn(run_launch_worker(launch_rx, launcher, status_tx));
    tokio::spawn(log_status(status_rx));

    let mut changes = registry.subscribe();
    let mut dispatcher = HotkeyDispatcher::new(backend, Arc::clone(&registry), launch_tx);

    let initial = changes.borrow_and_update().clone();
    dispatcher.resync(&initial);
    info!("Daemon running");

    let result = loop {
        tokio::select! {
            event = hotkey_rx.recv() => match event {
                Some(event) => {
                    dispatcher.dispatch(&event);
                }
                None => break Err(anyhow!("X11 hotkey listener stopped")),
            },

            changed = changes.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let config = changes.borrow_and_update().clone();
                dispatcher.resync(&config);
            }

            _ = sighup.recv() => {
                info!("SIGHUP received, reloading configuration");
                match registry.reload() {
                    Ok(true) => {}
                    Ok(false) => warn!("No stored configuration, keeping the current one"),
                    Err(e) => error!(error = %e, "Reload rejected"),
                }
            }

            _ = sigint.recv() => {
                info!("SIGINT received, shutting down");
                break Ok(());
            }

            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
                break Ok(());
            }
        }
    };

    teardown(hotkey_rx, dispatcher);
    result
}

/// Release every hotkey and stop the backend. The event receiver closes
/// first: dropping the backend joins a listener that may be blocked sending.
fn teardown<B: GlobalHotkey>(
    events: mpsc::Receiver<HotkeyEvent>,
    mut dispatcher: HotkeyDispatcher<B>,
) {
    drop(events);
    dispatcher.shutdown();
    drop(dispatcher);
    info!("Daemon stopped");
}

/// Status-bar equivalent for the daemon
async fn log_status(mut events: mpsc::UnboundedReceiver<UiEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            UiEvent::FolderError { .. } => error!("{}", event.status_line()),
            _ => info!("{}", event.status_line()),
        }
    }
}
