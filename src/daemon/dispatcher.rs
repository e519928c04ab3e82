//! Keeps OS hotkey registrations in step with the registry
//!
//! Registrations are rebuilt from scratch on every resync. A press is
//! resolved against the registry's current snapshot, so an edit that has
//! not been resynced yet still takes effect for the slot's path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::config::{BindingRegistry, Configuration, Hotkey};
use crate::constants;
use crate::daemon::launcher::FolderLauncher;
use crate::input::{GlobalHotkey, HotkeyEvent, RegistrationError};
use crate::manager::UiEvent;

/// A resolved hotkey press waiting to be opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub id: String,
    pub path: PathBuf,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    Active,
}

/// Result of one resync pass
#[derive(Debug, Default)]
pub struct ResyncReport {
    /// Slot ids that are now live
    pub registered: Vec<String>,
    /// Slots whose hotkey could not be registered
    pub failures: Vec<(String, RegistrationError)>,
}

pub struct HotkeyDispatcher<B: GlobalHotkey> {
    backend: B,
    registry: Arc<BindingRegistry>,
    active: HashMap<Hotkey, String>,
    launches: mpsc::Sender<LaunchRequest>,
}

impl<B: GlobalHotkey> HotkeyDispatcher<B> {
    pub fn new(
        backend: B,
        registry: Arc<BindingRegistry>,
        launches: mpsc::Sender<LaunchRequest>,
    ) -> Self {
        Self {
            backend,
            registry,
            active: HashMap::new(),
            launches,
        }
    }

    pub fn state(&self) -> DispatcherState {
        if self.active.is_empty() {
            DispatcherState::Idle
        } else {
            DispatcherState::Active
        }
    }

    /// Drop every registration and register each slot that has both a
    /// hotkey and a folder, in id order. Failures are per slot.
    pub fn resync(&mut self, config: &Configuration) -> ResyncReport {
        self.backend.unregister_all();
        self.active.clear();

        let mut report = ResyncReport::default();
        for (id, binding) in config.active() {
            let Some(hotkey) = &binding.hotkey else {
                continue;
            };

            let result = if self.active.contains_key(hotkey) {
                Err(RegistrationError::AlreadyRegistered(hotkey.clone()))
            } else {
                self.backend.register(hotkey)
            };

            match result {
                Ok(()) => {
                    debug!(slot = id, hotkey = %hotkey, "Registered hotkey");
                    self.active.insert(hotkey.clone(), id.to_string());
                    report.registered.push(id.to_string());
                }
                Err(e) => {
                    warn!(slot = id, hotkey = %hotkey, error = %e, "Failed to register hotkey");
                    report.failures.push((id.to_string(), e));
                }
            }
        }

        info!(
            backend = self.backend.name(),
            state = ?self.state(),
            registered = report.registered.len(),
            failed = report.failures.len(),
            "Hotkeys synchronized"
        );
        report
    }

    /// Look up the slot behind a press and its folder as of now
    pub fn resolve(&self, hotkey: &Hotkey) -> Option<LaunchRequest> {
        let Some(id) = self.active.get(hotkey) else {
            debug!(hotkey = %hotkey, "Press for a hotkey that is no longer registered");
            return None;
        };

        let config = self.registry.snapshot();
        let binding = config.get(id)?;
        let Some(path) = binding.path.clone() else {
            debug!(slot = %id, "Slot has no folder, ignoring press");
            return None;
        };

        Some(LaunchRequest {
            id: id.clone(),
            path,
            label: binding.label.clone(),
        })
    }

    /// Queue the launch for a press without blocking; returns whether it was queued
    pub fn dispatch(&self, event: &HotkeyEvent) -> bool {
        let Some(request) = self.resolve(&event.hotkey) else {
            return false;
        };

        match self.launches.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(request)) => {
                warn!(slot = %request.id, "Launch queue full, dropping hotkey press");
                false
            }
            Err(TrySendError::Closed(request)) => {
                warn!(slot = %request.id, "Launch worker gone, dropping hotkey press");
                false
            }
        }
    }

    /// Release every registration. Also run on drop.
    pub fn shutdown(&mut self) {
        if !self.active.is_empty() {
            info!(count = self.active.len(), "Unregistering hotkeys");
        }
        self.backend.unregister_all();
        self.active.clear();
    }
}

impl<B: GlobalHotkey> Drop for HotkeyDispatcher<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Open queued folders on the blocking pool and report each outcome.
/// At most `MAX_CONCURRENT_LAUNCHES` run at once; beyond that requests
/// wait in the queue.
pub async fn run_launch_worker(
    mut requests: mpsc::Receiver<LaunchRequest>,
    launcher: Arc<FolderLauncher>,
    events: mpsc::UnboundedSender<UiEvent>,
) {
    let slots = Arc::new(Semaphore::new(constants::dispatch::MAX_CONCURRENT_LAUNCHES));

    while let Some(request) = requests.recv().await {
        let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };
        let launcher = Arc::clone(&launcher);
        let events = events.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = launcher.open(&request.path, &request.label);
            let _ = events.send(UiEvent::from(outcome));
            drop(permit);
        });
    }
    debug!("Launch queue closed, worker exiting");
}
