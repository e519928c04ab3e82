//! Durable storage for the configuration
//!
//! A missing or unreadable file is never an error for callers: `load`
//! returns `None` and logs why, and the registry falls back to defaults.
//!
//! Several processes share the file (the daemon and one-shot commands), so
//! writers take an advisory `flock` on a sibling `.lock` file first.

use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::binding::Configuration;
use crate::constants;

#[derive(Debug, Error)]
#[error("failed to write configuration to {path:?}: {source}")]
pub struct WriteError {
    pub path: PathBuf,
    pub source: io::Error,
}

/// Exclusive hold on a store, released on drop
pub struct StoreLock {
    _file: Option<Flock<File>>,
}

impl StoreLock {
    /// For stores no other process can see
    pub fn in_process() -> Self {
        Self { _file: None }
    }
}

/// Persistence seam for the registry
pub trait ConfigStore: Send + Sync {
    /// `None` when nothing usable is stored (absent or corrupt)
    fn load(&self) -> Option<Configuration>;

    /// Replace the stored configuration; on error the previous file is untouched
    fn save(&self, config: &Configuration) -> Result<(), WriteError>;

    /// Block until no other writer, in any process, holds the store
    fn lock(&self) -> Result<StoreLock, WriteError> {
        Ok(StoreLock::in_process())
    }
}

/// Config directory, honouring `FOLDER_HOTKEYS_CONFIG_DIR`
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(constants::config::CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }

    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(constants::config::APP_DIR);
    path
}

/// Pretty JSON file, replaced atomically on save
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/config.json`
    pub fn in_config_dir() -> Self {
        Self::new(config_dir().join(constants::config::FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<file name>.<suffix>` next to the configuration file
    fn sibling(&self, suffix: &str) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| constants::config::FILENAME.to_string());
        self.path.with_file_name(format!("{file_name}.{suffix}"))
    }

    fn ensure_parent(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }

    fn write_atomically(&self, contents: &[u8]) -> io::Result<()> {
        self.ensure_parent()?;

        let temp_path = self.sibling(&format!("tmp.{}", std::process::id()));

        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(contents)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Option<Configuration> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No stored configuration");
            return None;
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read stored configuration");
                return None;
            }
        };

        match serde_json::from_str::<Configuration>(&contents) {
            Ok(config) => {
                info!(path = ?self.path, slots = config.len(), "Loaded configuration");
                Some(config)
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Stored configuration is corrupt, ignoring it");
                None
            }
        }
    }

    fn save(&self, config: &Configuration) -> Result<(), WriteError> {
        let wrap = |source: io::Error| WriteError {
            path: self.path.clone(),
            source,
        };

        let mut json = serde_json::to_vec_pretty(config).map_err(|e| wrap(io::Error::other(e)))?;
        json.push(b'\n');
        self.write_atomically(&json).map_err(wrap)?;

        info!(path = ?self.path, slots = config.len(), "Saved configuration");
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock, WriteError> {
        let lock_path = self.sibling("lock");
        let wrap = |source: io::Error| WriteError {
            path: lock_path.clone(),
            source,
        };

        self.ensure_parent().map_err(wrap)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(wrap)?;
        let file = Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| wrap(io::Error::from(errno)))?;

        debug!(path = ?lock_path, "Locked configuration store");
        Ok(StoreLock { _file: Some(file) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::binding::Binding;
    use crate::config::defaults;
    use std::path::PathBuf;

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("config.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/config.json"));

        let mut config = defaults::hardcoded();
        config.insert(
            "ID1",
            Binding::new(
                Some("Ctrl+Alt+1".parse().unwrap()),
                Some(PathBuf::from("/tmp")),
                "Temp",
            ),
        );
        store.save(&config).unwrap();

        assert_eq!(store.load(), Some(config));

        // No temp files left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("config.json")]);
    }

    #[test]
    fn test_lock_excludes_other_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let first = JsonFileStore::new(&path);
        let second = JsonFileStore::new(&path);

        let held = first.lock().unwrap();
        assert!(dir.path().join("config.json.lock").exists());

        let (tx, rx) = std::sync::mpsc::channel();
        let waiter = std::thread::spawn(move || {
            let _lock = second.lock().unwrap();
            tx.send(()).unwrap();
        });

        let wait = std::time::Duration::from_millis(200);
        assert!(rx.recv_timeout(wait).is_err());

        drop(held);
        assert!(rx.recv_timeout(std::time::Duration::from_secs(5)).is_ok());
        waiter.join().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = JsonFileStore::new(&path);

        fs::write(&path, "{ truncated").unwrap();
        assert!(store.load().is_none());

        fs::write(&path, r#"{"folders":{"ID1":{"hotkey":"Alt+Alt+1"}}}"#).unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_failed_save_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = JsonFileStore::new(&path);
        store.save(&defaults::hardcoded()).unwrap();
        let before = fs::read(&path).unwrap();

        // A directory squatting on the target makes rename fail
        let blocked = JsonFileStore::new(dir.path().join("blocked"));
        fs::create_dir(dir.path().join("blocked")).unwrap();
        fs::write(dir.path().join("blocked/keep"), "x").unwrap();
        let err = blocked.save(&defaults::hardcoded()).unwrap_err();
        assert_eq!(err.path, dir.path().join("blocked"));

        assert_eq!(fs::read(&path).unwrap(), before);
        let stray: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".tmp."))
            .collect();
        assert!(stray.is_empty());
    }
}
