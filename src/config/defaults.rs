//! Built-in and bundled default configurations

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::binding::{Binding, Configuration};
use crate::config::codec;
use crate::config::hotkey::{Hotkey, KeyToken, Modifiers};
use crate::constants;

/// Twelve slots on CommandOrControl+Alt+{1..0,Minus,Equal}, all unconfigured
const DEFAULT_SLOTS: [(&str, KeyToken, &str); 12] = [
    ("ID1", KeyToken::Char('1'), "Documents"),
    ("ID2", KeyToken::Char('2'), "Downloads"),
    ("ID3", KeyToken::Char('3'), "Desktop"),
    ("ID4", KeyToken::Char('4'), "Projects"),
    ("ID5", KeyToken::Char('5'), "Pictures"),
    ("ID6", KeyToken::Char('6'), "Music"),
    ("ID7", KeyToken::Char('7'), "Videos"),
    ("ID8", KeyToken::Char('8'), "Folder 8"),
    ("ID9", KeyToken::Char('9'), "Folder 9"),
    ("ID10", KeyToken::Char('0'), "Folder 10"),
    ("ID11", KeyToken::Minus, "Folder 11"),
    ("ID12", KeyToken::Equal, "Folder 12"),
];

/// The compiled-in configuration, used when nothing else is available
pub fn hardcoded() -> Configuration {
    let mut config = Configuration::new();
    for (id, key, label) in DEFAULT_SLOTS {
        config.insert(
            id,
            Binding::new(
                Some(Hotkey::new(Modifiers::COMMAND_OR_CONTROL_ALT, key)),
                None,
                label,
            ),
        );
    }
    config
}

/// First existing bundled default: explicit path, next to the executable,
/// then the system-wide install location
pub fn locate_bundled(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .map(|dir| dir.join(constants::config::BUNDLED_DEFAULT_RELATIVE));

    beside_exe
        .into_iter()
        .chain(std::iter::once(PathBuf::from(
            constants::config::BUNDLED_DEFAULT_SYSTEM,
        )))
        .find(|candidate| {
            let exists = candidate.is_file();
            debug!(path = ?candidate, exists, "Checked bundled default location");
            exists
        })
}

/// Read and validate a bundled default file
pub fn load_bundled(path: &Path) -> Result<Configuration> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read bundled default {:?}", path))?;
    let record = codec::import(&bytes)
        .with_context(|| format!("Failed to parse bundled default {:?}", path))?;
    Configuration::try_from(record)
        .with_context(|| format!("Bundled default {:?} is not a valid configuration", path))
}
