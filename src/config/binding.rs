//! Slot bindings and the configuration they form
//!
//! `ConfigRecord` is the on-disk/wire shape where an empty string means
//! "unset". `Configuration` is the validated in-memory form; converting a
//! record into it is where hotkey syntax and folder paths are checked.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::hotkey::{Hotkey, HotkeyParseError};

/// One slot as it appears in the persisted and exported JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub hotkey: String,
    #[serde(default)]
    pub label: String,
}

/// `{ "folders": { "<id>": { ... } } }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub folders: BTreeMap<String, FolderRecord>,
}

/// What is wrong with a slot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidField {
    #[error("invalid hotkey '{hotkey}': {source}")]
    Hotkey {
        hotkey: String,
        source: HotkeyParseError,
    },
    #[error("folder '{0}' is not an absolute path")]
    RelativePath(String),
}

/// A slot that cannot be accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("slot {id}: {problem}")]
pub struct ValidationError {
    pub id: String,
    pub problem: InvalidField,
}

/// A hotkey/folder pair for one slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Binding {
    pub hotkey: Option<Hotkey>,
    /// `None` marks an unconfigured slot
    pub path: Option<PathBuf>,
    pub label: String,
}

impl Binding {
    pub fn new(hotkey: Option<Hotkey>, path: Option<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            hotkey,
            path,
            label: label.into(),
        }
    }

    /// Both a hotkey and a folder are set, so the slot gets registered
    pub fn is_active(&self) -> bool {
        self.hotkey.is_some() && self.path.is_some()
    }

    /// Label for status lines, falling back to the path
    pub fn display_name(&self) -> String {
        match (&self.path, self.label.is_empty()) {
            (Some(path), true) => path.display().to_string(),
            _ => self.label.clone(),
        }
    }

    fn from_record(id: &str, record: &FolderRecord) -> Result<Self, ValidationError> {
        let invalid = |problem| ValidationError {
            id: id.to_string(),
            problem,
        };

        let hotkey = Hotkey::parse_optional(&record.hotkey).map_err(|source| {
            invalid(InvalidField::Hotkey {
                hotkey: record.hotkey.clone(),
                source,
            })
        })?;

        // Stored folders must be absolute
        let path = match record.path.as_str() {
            "" => None,
            path if Path::new(path).is_absolute() => Some(PathBuf::from(path)),
            path => return Err(invalid(InvalidField::RelativePath(path.to_string()))),
        };

        Ok(Self {
            hotkey,
            path,
            label: record.label.clone(),
        })
    }

    fn to_record(&self) -> FolderRecord {
        FolderRecord {
            path: self
                .path
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_default(),
            hotkey: self
                .hotkey
                .as_ref()
                .map(Hotkey::to_string)
                .unwrap_or_default(),
            label: self.label.clone(),
        }
    }
}

/// Validated slot id → binding map, iterated in ascending id order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ConfigRecord", try_from = "ConfigRecord")]
pub struct Configuration {
    bindings: BTreeMap<String, Binding>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Binding> {
        self.bindings.get(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, binding: Binding) -> Option<Binding> {
        self.bindings.insert(id.into(), binding)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings.iter().map(|(id, binding)| (id.as_str(), binding))
    }

    /// Slots with both a hotkey and a folder, in map order
    pub fn active(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.iter().filter(|(_, binding)| binding.is_active())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn to_record(&self) -> ConfigRecord {
        ConfigRecord {
            folders: self
                .bindings
                .iter()
                .map(|(id, binding)| (id.clone(), binding.to_record()))
                .collect(),
        }
    }
}

impl TryFrom<ConfigRecord> for Configuration {
    type Error = ValidationError;

    /// All-or-nothing: the first invalid slot rejects the whole record
    fn try_from(record: ConfigRecord) -> Result<Self, Self::Error> {
        let bindings = record
            .folders
            .iter()
            .map(|(id, folder)| Ok((id.clone(), Binding::from_record(id, folder)?)))
            .collect::<Result<_, ValidationError>>()?;

        Ok(Self { bindings })
    }
}

impl From<Configuration> for ConfigRecord {
    fn from(config: Configuration) -> Self {
        config.to_record()
    }
}
