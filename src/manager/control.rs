//! Control surface used by the command line
//!
//! Every operation goes through the registry, so a running daemon sees the
//! same validated configuration. Results that a UI would display are also
//! pushed as [`UiEvent`]s.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::config::{
    BindingEdit, BindingRegistry, ConfigRecord, Configuration, RegistryError, codec,
};
use crate::constants;
use crate::daemon::launcher::{FolderLauncher, LaunchOutcome};
use crate::manager::dialog::{Dialog, FileFilter};

/// Notifications for whoever presents results to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    ConfigLoaded(ConfigRecord),
    FolderOpened { path: PathBuf, label: String },
    FolderError { path: PathBuf, error: String },
}

impl UiEvent {
    pub fn status_line(&self) -> String {
        match self {
            Self::ConfigLoaded(record) => {
                format!("Configuration loaded ({} slots)", record.folders.len())
            }
            Self::FolderOpened { path, label } => LaunchOutcome::Opened {
                path: path.clone(),
                label: label.clone(),
            }
            .status_line(),
            Self::FolderError { path, error } => LaunchOutcome::Failed {
                path: path.clone(),
                reason: error.clone(),
            }
            .status_line(),
        }
    }
}

impl From<LaunchOutcome> for UiEvent {
    fn from(outcome: LaunchOutcome) -> Self {
        match outcome {
            LaunchOutcome::Opened { path, label } => Self::FolderOpened { path, label },
            LaunchOutcome::Failed { path, reason } => Self::FolderError {
                path,
                error: reason,
            },
        }
    }
}

pub struct ControlSurface<D: Dialog> {
    registry: Arc<BindingRegistry>,
    launcher: Arc<FolderLauncher>,
    dialog: D,
    events: UnboundedSender<UiEvent>,
}

impl<D: Dialog> ControlSurface<D> {
    pub fn new(
        registry: Arc<BindingRegistry>,
        launcher: Arc<FolderLauncher>,
        dialog: D,
        events: UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            registry,
            launcher,
            dialog,
            events,
        }
    }

    fn notify(&self, event: UiEvent) {
        // Nobody listening is fine for one-shot commands
        let _ = self.events.send(event);
    }

    pub fn get_config(&self) -> ConfigRecord {
        self.registry.snapshot().to_record()
    }

    pub fn snapshot(&self) -> Configuration {
        self.registry.snapshot()
    }

    /// Validate and persist a full configuration
    pub fn save_config(&self, config: ConfigRecord) -> bool {
        match self.registry.apply_mutation(config) {
            Ok(_) => {
                info!("Configuration saved");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to save configuration");
                false
            }
        }
    }

    /// Apply a partial edit to one slot
    pub fn edit_slot(&self, id: &str, edit: BindingEdit) -> Result<Configuration, RegistryError> {
        self.registry.update_binding(id, edit)
    }

    pub fn open_folder(&self, path: &Path, label: &str) -> LaunchOutcome {
        let outcome = self.launcher.open(path, label);
        self.notify(UiEvent::from(outcome.clone()));
        outcome
    }

    /// Open a slot's folder. `Ok(None)` when the slot has no folder set.
    pub fn open_slot(&self, id: &str) -> Result<Option<LaunchOutcome>> {
        let config = self.registry.snapshot();
        let Some(binding) = config.get(id) else {
            bail!("Unknown slot '{id}'");
        };
        let Some(path) = &binding.path else {
            warn!(slot = id, "{}", constants::launcher::NO_PATH);
            return Ok(None);
        };
        Ok(Some(self.open_folder(path, &binding.label)))
    }

    /// Ask the user for a folder; `None` when cancelled or the dialog failed
    pub fn browse_folder(&self) -> Option<PathBuf> {
        match self.dialog.pick_directory() {
            Ok(selection) => selection,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Folder dialog failed");
                None
            }
        }
    }

    /// Export through a save dialog; `false` if cancelled or failed
    pub fn export_config(&self) -> bool {
        let selection = self
            .dialog
            .pick_save_file(constants::dialog::EXPORT_DEFAULT_NAME, &[FileFilter::json()]);
        match selection {
            Ok(Some(path)) => self.report("export", self.export_to(&path)),
            Ok(None) => false,
            Err(e) => self.report("export", Err(e)),
        }
    }

    pub fn export_to(&self, path: &Path) -> Result<()> {
        let bytes = codec::export(&self.registry.snapshot())
            .context("Failed to serialize configuration")?;
        fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
        info!(path = ?path, "Exported configuration");
        Ok(())
    }

    /// Import through an open dialog; `false` if cancelled or rejected
    pub fn import_config(&self) -> bool {
        match self.dialog.pick_open_file(&[FileFilter::json()]) {
            Ok(Some(path)) => self.report("import", self.import_from(&path).map(|_| ())),
            Ok(None) => false,
            Err(e) => self.report("import", Err(e)),
        }
    }

    /// Replace the whole configuration with a file's contents
    pub fn import_from(&self, path: &Path) -> Result<Configuration> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let record = codec::import(&bytes).with_context(|| format!("Invalid import file {:?}", path))?;
        let config = self.registry.replace_all(record)?;

        info!(path = ?path, slots = config.len(), "Imported configuration");
        self.notify(UiEvent::ConfigLoaded(config.to_record()));
        Ok(config)
    }

    fn report(&self, operation: &'static str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(operation, error = %format!("{e:#}"), "Operation failed");
                false
            }
        }
    }
}
