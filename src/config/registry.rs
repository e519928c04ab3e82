//! The live binding registry
//!
//! Single writer: every mutation takes the in-process lock and the store's
//! cross-process lock, re-reads the store, validates the proposed record,
//! persists it, swaps it in and notifies subscribers before either lock is
//! released. Readers work on cloned snapshots.

use parking_lot::Mutex;
use std::path::Path;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::binding::{ConfigRecord, Configuration, FolderRecord, ValidationError};
use crate::config::defaults;
use crate::config::store::{ConfigStore, WriteError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Where the startup configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialSource {
    Store,
    Bundled,
    Hardcoded,
}

/// Partial update of a single slot; `Some("")` clears a field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingEdit {
    pub path: Option<String>,
    pub hotkey: Option<String>,
    pub label: Option<String>,
}

impl BindingEdit {
    fn apply(self, record: &mut FolderRecord) {
        if let Some(path) = self.path {
            record.path = path;
        }
        if let Some(hotkey) = self.hotkey {
            record.hotkey = hotkey;
        }
        if let Some(label) = self.label {
            record.label = label;
        }
    }
}

pub struct BindingRegistry {
    store: Box<dyn ConfigStore>,
    current: Mutex<Configuration>,
    changes: watch::Sender<Configuration>,
}

impl BindingRegistry {
    /// Load from the store, else the bundled default, else the built-in set.
    /// A fallback source is written to the store straight away.
    pub fn load_initial(
        store: Box<dyn ConfigStore>,
        bundled: Option<&Path>,
    ) -> (Self, InitialSource) {
        let store_lock = store
            .lock()
            .inspect_err(|e| warn!(error = %e, "Loading configuration without the store lock"))
            .ok();

        let (config, source) = match store.load() {
            Some(config) => (config, InitialSource::Store),
            None => {
                let bundled_config = bundled.and_then(|path| match defaults::load_bundled(path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        warn!(path = ?path, error = %format!("{e:#}"), "Ignoring bundled default");
                        None
                    }
                });

                let (config, source) = match bundled_config {
                    Some(config) => (config, InitialSource::Bundled),
                    None => (defaults::hardcoded(), InitialSource::Hardcoded),
                };

                if let Err(e) = store.save(&config) {
                    warn!(error = %e, "Failed to persist default configuration");
                }
                (config, source)
            }
        };
        drop(store_lock);

        info!(source = ?source, slots = config.len(), "Configuration loaded");

        let (changes, _) = watch::channel(config.clone());
        let registry = Self {
            store,
            current: Mutex::new(config),
            changes,
        };
        (registry, source)
    }

    pub fn snapshot(&self) -> Configuration {
        self.current.lock().clone()
    }

    /// Receiver that observes every accepted configuration
    pub fn subscribe(&self) -> watch::Receiver<Configuration> {
        self.changes.subscribe()
    }

    /// Replace the whole configuration with an edited one
    pub fn apply_mutation(&self, proposed: ConfigRecord) -> Result<Configuration, RegistryError> {
        self.commit("edit", |_| proposed)
    }

    /// Replace the whole configuration with an imported one
    pub fn replace_all(&self, imported: ConfigRecord) -> Result<Configuration, RegistryError> {
        self.commit("import", |_| imported)
    }

    /// Edit one slot, creating it when the id is new
    pub fn update_binding(
        &self,
        id: &str,
        edit: BindingEdit,
    ) -> Result<Configuration, RegistryError> {
        self.commit("edit", |current| {
            let mut record = current.to_record();
            edit.apply(record.folders.entry(id.to_string()).or_default());
            record
        })
    }

    /// Re-read the store without rewriting it. Returns `false` when
    /// nothing usable is stored.
    pub fn reload(&self) -> Result<bool, RegistryError> {
        let mut current = self.current.lock();
        let _store_lock = self.store.lock()?;

        let Some(config) = self.store.load() else {
            return Ok(false);
        };
        if *current != config {
            self.publish(&mut current, config, "reload");
        } else {
            debug!("Stored configuration unchanged");
        }
        Ok(true)
    }

    fn commit(
        &self,
        origin: &'static str,
        build: impl FnOnce(&Configuration) -> ConfigRecord,
    ) -> Result<Configuration, RegistryError> {
        let mut current = self.current.lock();
        let _store_lock = self.store.lock().inspect_err(|e| {
            warn!(origin, error = %e, "Configuration store is not lockable");
        })?;

        // Another process may have saved since this one last looked
        let latest = self.store.load().unwrap_or_else(|| current.clone());
        let proposed = build(&latest);
        let config = Configuration::try_from(proposed).inspect_err(|e| {
            warn!(origin, error = %e, "Rejected configuration change");
        })?;

        self.store.save(&config).inspect_err(|e| {
            warn!(origin, error = %e, "Configuration change not applied");
        })?;

        self.publish(&mut current, config.clone(), origin);
        Ok(config)
    }

    fn publish(&self, current: &mut Configuration, config: Configuration, origin: &'static str) {
        info!(
            origin,
            slots = config.len(),
            active = config.active().count(),
            "Configuration updated"
        );
        *current = config.clone();
        self.changes.send_replace(config);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::binding::InvalidField;
    use crate::config::store::JsonFileStore;
    use std::fs;
    use std::io;
    use std::path::PathBuf;

    /// Store whose writes always fail
    pub(crate) struct ReadOnlyStore(pub Option<Configuration>);

    impl ConfigStore for ReadOnlyStore {
        fn load(&self) -> Option<Configuration> {
            self.0.clone()
        }

        fn save(&self, _config: &Configuration) -> Result<(), WriteError> {
            Err(WriteError {
                path: PathBuf::from("/read-only/config.json"),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            })
        }
    }

    pub(crate) fn temp_registry(dir: &Path) -> BindingRegistry {
        let store = JsonFileStore::new(dir.join("config.json"));
        BindingRegistry::load_initial(Box::new(store), None).0
    }

    fn folder(path: &str, hotkey: &str, label: &str) -> FolderRecord {
        FolderRecord {
            path: path.to_string(),
            hotkey: hotkey.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn test_fresh_start_uses_hardcoded_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let (registry, source) =
            BindingRegistry::load_initial(Box::new(JsonFileStore::new(&path)), None);
        assert_eq!(source, InitialSource::Hardcoded);
        assert_eq!(registry.snapshot(), defaults::hardcoded());
        assert!(path.exists());

        // A stored file must win over any bundled default
        let bundled = dir.path().join("default-config.json");
        fs::write(&bundled, r#"{"folders":{"other":{"path":"/srv"}}}"#).unwrap();

        let (registry, source) =
            BindingRegistry::load_initial(Box::new(JsonFileStore::new(&path)), Some(&bundled));
        assert_eq!(source, InitialSource::Store);
        assert_eq!(registry.snapshot(), defaults::hardcoded());
    }

    #[test]
    fn test_bundled_default_beats_hardcoded() {
        let dir = tempfile::tempdir().unwrap();
        let bundled = dir.path().join("default-config.json");
        fs::write(
            &bundled,
            r#"{"folders":{"home":{"path":"/home","hotkey":"Alt+H","label":"Home"}}}"#,
        )
        .unwrap();

        let store = JsonFileStore::new(dir.path().join("config.json"));
        let (registry, source) = BindingRegistry::load_initial(Box::new(store), Some(&bundled));
        assert_eq!(source, InitialSource::Bundled);
        assert_eq!(registry.snapshot().len(), 1);
        assert!(registry.snapshot().get("home").unwrap().is_active());
    }

    #[test]
    fn test_broken_bundled_default_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let bundled = dir.path().join("default-config.json");
        fs::write(&bundled, "not json").unwrap();

        let store = JsonFileStore::new(dir.path().join("config.json"));
        let (_, source) = BindingRegistry::load_initial(Box::new(store), Some(&bundled));
        assert_eq!(source, InitialSource::Hardcoded);
    }

    #[test]
    fn test_invalid_mutation_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let registry = temp_registry(dir.path());
        let before_bytes = fs::read(&path).unwrap();
        let before = registry.snapshot();

        let mut proposed = before.to_record();
        proposed
            .folders
            .insert("ID1".into(), folder("/tmp", "Alt+1", "Ok"));
        proposed
            .folders
            .insert("ID2".into(), folder("/tmp", "Alt+Shift+Shift+2", "Bad"));

        let err = registry.apply_mutation(proposed).unwrap_err();
        assert!(matches!(err, RegistryError::Validation(ref e) if e.id == "ID2"));
        assert_eq!(fs::read(&path).unwrap(), before_bytes);
        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn test_relative_folder_edit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let registry = temp_registry(dir.path());
        let before_bytes = fs::read(&path).unwrap();

        let edit = BindingEdit {
            path: Some("relative/dir".into()),
            ..Default::default()
        };
        let err = registry.update_binding("ID1", edit).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Validation(ValidationError {
                problem: InvalidField::RelativePath(_),
                ..
            })
        ));
        assert_eq!(fs::read(&path).unwrap(), before_bytes);
        assert_eq!(registry.snapshot().get("ID1").unwrap().path, None);
    }

    #[test]
    fn test_registries_sharing_a_file_keep_each_others_edits() {
        let dir = tempfile::tempdir().unwrap();
        let first = temp_registry(dir.path());
        let second = temp_registry(dir.path());

        let set = |registry: &BindingRegistry, id: &str, path: &str| {
            let edit = BindingEdit {
                path: Some(path.to_string()),
                ..Default::default()
            };
            registry.update_binding(id, edit).unwrap()
        };
        set(&first, "ID1", "/tmp/a");
        let latest = set(&second, "ID2", "/tmp/b");

        let stored = JsonFileStore::new(dir.path().join("config.json"))
            .load()
            .unwrap();
        assert_eq!(stored.get("ID1").unwrap().path, Some(PathBuf::from("/tmp/a")));
        assert_eq!(stored.get("ID2").unwrap().path, Some(PathBuf::from("/tmp/b")));
        assert_eq!(second.snapshot(), stored);
        assert_eq!(latest, stored);
    }

    #[test]
    fn test_concurrent_writers_serialize_on_the_store() {
        let dir = tempfile::tempdir().unwrap();
        temp_registry(dir.path());

        let writers: Vec<_> = (1..=4)
            .map(|slot| {
                let dir = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let registry = temp_registry(&dir);
                    for round in 0..5 {
                        let edit = BindingEdit {
                            path: Some(format!("/tmp/{slot}/{round}")),
                            ..Default::default()
                        };
                        registry.update_binding(&format!("ID{slot}"), edit).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let stored = JsonFileStore::new(dir.path().join("config.json"))
            .load()
            .unwrap();
        for slot in 1..=4 {
            assert_eq!(
                stored.get(&format!("ID{slot}")).unwrap().path,
                Some(PathBuf::from(format!("/tmp/{slot}/4")))
            );
        }
    }

    #[test]
    fn test_write_failure_rejects_mutation() {
        let (registry, source) =
            BindingRegistry::load_initial(Box::new(ReadOnlyStore(None)), None);
        assert_eq!(source, InitialSource::Hardcoded);

        let changes = registry.subscribe();

        let edit = BindingEdit {
            path: Some("/tmp".into()),
            ..Default::default()
        };
        let err = registry.update_binding("ID1", edit).unwrap_err();
        assert!(matches!(err, RegistryError::Write(_)));
        assert_eq!(registry.snapshot(), defaults::hardcoded());
        assert!(!changes.has_changed().unwrap());
    }

    #[test]
    fn test_update_binding_edits_and_creates_slots() {
        let dir = tempfile::tempdir().unwrap();
        let registry = temp_registry(dir.path());
        let mut changes = registry.subscribe();

        let config = registry
            .update_binding(
                "ID3",
                BindingEdit {
                    path: Some("/home/alice/Desktop".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        let id3 = config.get("ID3").unwrap();
        assert_eq!(id3.path, Some(PathBuf::from("/home/alice/Desktop")));
        assert_eq!(id3.label, "Desktop");
        assert!(id3.is_active());
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().get("ID3"), Some(id3));

        let config = registry
            .update_binding(
                "ID13",
                BindingEdit {
                    hotkey: Some("shift+alt+f5".into()),
                    label: Some("Extra".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(config.len(), 13);
        assert_eq!(
            config.get("ID13").unwrap().hotkey.as_ref().unwrap().to_string(),
            "Alt+Shift+F5"
        );

        let config = registry
            .update_binding(
                "ID3",
                BindingEdit {
                    path: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(config.get("ID3").unwrap().path, None);
    }

    #[test]
    fn test_replace_all_with_empty_folders() {
        let dir = tempfile::tempdir().unwrap();
        let registry = temp_registry(dir.path());

        let config = registry.replace_all(ConfigRecord::default()).unwrap();
        assert!(config.is_empty());
        assert!(registry.snapshot().is_empty());

        let reset = registry
            .apply_mutation(defaults::hardcoded().to_record())
            .unwrap();
        assert_eq!(reset, defaults::hardcoded());
    }

    #[test]
    fn test_reload_picks_up_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let registry = temp_registry(dir.path());

        let external = r#"{"folders":{"only":{"path":"/srv","hotkey":"Alt+S","label":"Srv"}}}"#;
        fs::write(&path, external).unwrap();
        assert!(registry.reload().unwrap());
        assert_eq!(registry.snapshot().len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), external);

        fs::remove_file(&path).unwrap();
        assert!(!registry.reload().unwrap());
        assert_eq!(registry.snapshot().len(), 1);
    }
}
