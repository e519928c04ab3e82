//! Native file/folder pickers

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::constants;

/// A named group of file extensions offered by a picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn json() -> Self {
        Self {
            name: constants::dialog::JSON_FILTER_NAME.to_string(),
            extensions: vec![constants::dialog::JSON_EXTENSION.to_string()],
        }
    }

    /// zenity syntax: `JSON Files | *.json`
    fn zenity_pattern(&self) -> String {
        let globs: Vec<String> = self
            .extensions
            .iter()
            .map(|ext| format!("*.{ext}"))
            .collect();
        format!("{} | {}", self.name, globs.join(" "))
    }
}

/// Pickers return `Ok(None)` when the user cancels
pub trait Dialog {
    fn pick_directory(&self) -> Result<Option<PathBuf>>;
    fn pick_save_file(&self, default_name: &str, filters: &[FileFilter])
    -> Result<Option<PathBuf>>;
    fn pick_open_file(&self, filters: &[FileFilter]) -> Result<Option<PathBuf>>;
}

/// Dialogs shown through `zenity --file-selection`
#[derive(Debug, Default, Clone, Copy)]
pub struct ZenityDialog;

impl ZenityDialog {
    fn run(&self, args: &[String]) -> Result<Option<PathBuf>> {
        debug!(args = ?args, "Showing file dialog");
        let output = Command::new(constants::dialog::COMMAND)
            .arg("--file-selection")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run {}", constants::dialog::COMMAND))?;

        match output.status.code() {
            Some(0) => {
                let selected = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok((!selected.is_empty()).then(|| PathBuf::from(selected)))
            }
            Some(constants::dialog::CANCELLED_STATUS) => Ok(None),
            _ => bail!(
                "{} failed ({}): {}",
                constants::dialog::COMMAND,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }
}

fn filter_args(filters: &[FileFilter]) -> Vec<String> {
    filters
        .iter()
        .map(|filter| format!("--file-filter={}", filter.zenity_pattern()))
        .collect()
}

impl Dialog for ZenityDialog {
    fn pick_directory(&self) -> Result<Option<PathBuf>> {
        self.run(&["--directory".into(), "--title=Select Folder".into()])
    }

    fn pick_save_file(
        &self,
        default_name: &str,
        filters: &[FileFilter],
    ) -> Result<Option<PathBuf>> {
        let mut args = vec![
            "--save".to_string(),
            "--title=Export Configuration".to_string(),
            format!("--filename={default_name}"),
        ];
        args.extend(filter_args(filters));
        self.run(&args)
    }

    fn pick_open_file(&self, filters: &[FileFilter]) -> Result<Option<PathBuf>> {
        let mut args = vec!["--title=Import Configuration".to_string()];
        args.extend(filter_args(filters));
        self.run(&args)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Answers every picker with the same canned response
    #[derive(Default)]
    pub(crate) struct ScriptedDialog {
        pub answer: Option<PathBuf>,
        pub save_requests: Mutex<Vec<(String, Vec<FileFilter>)>>,
    }

    impl ScriptedDialog {
        pub fn answering(path: impl Into<PathBuf>) -> Self {
            Self {
                answer: Some(path.into()),
                ..Default::default()
            }
        }

        pub fn cancelling() -> Self {
            Self::default()
        }
    }

    impl Dialog for ScriptedDialog {
        fn pick_directory(&self) -> Result<Option<PathBuf>> {
            Ok(self.answer.clone())
        }

        fn pick_save_file(
            &self,
            default_name: &str,
            filters: &[FileFilter],
        ) -> Result<Option<PathBuf>> {
            self.save_requests
                .lock()
                .push((default_name.to_string(), filters.to_vec()));
            Ok(self.answer.clone())
        }

        fn pick_open_file(&self, _filters: &[FileFilter]) -> Result<Option<PathBuf>> {
            Ok(self.answer.clone())
        }
    }

    #[test]
    fn test_json_filter_pattern() {
        assert_eq!(FileFilter::json().zenity_pattern(), "JSON Files | *.json");

        let filter = FileFilter {
            name: "Config".into(),
            extensions: vec!["json".into(), "txt".into()],
        };
        assert_eq!(
            filter_args(&[filter]),
            vec!["--file-filter=Config | *.json *.txt".to_string()]
        );
    }
}
