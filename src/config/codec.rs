//! Export/import of the full configuration as portable JSON
//!
//! The export format is the persisted record itself, pretty-printed with
//! ids in ascending order, so exporting the same configuration twice
//! yields identical bytes.

use serde_json::Value;
use thiserror::Error;

use crate::config::binding::{ConfigRecord, Configuration};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("missing top-level \"folders\" object")]
    MissingFolders,
}

/// Serialize a configuration to export bytes
pub fn export(config: &Configuration) -> serde_json::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(&config.to_record())?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse export bytes into a raw record; hotkeys are validated by the registry
pub fn import(bytes: &[u8]) -> Result<ConfigRecord, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    let value: Value = serde_json::from_str(text)?;

    match value.get("folders") {
        Some(Value::Object(_)) => Ok(serde_json::from_value(value)?),
        _ => Err(ParseError::MissingFolders),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::binding::Binding;
    use crate::config::defaults;
    use std::path::PathBuf;

    #[test]
    fn test_round_trip() {
        let mut config = defaults::hardcoded();
        config.insert(
            "ID3",
            Binding::new(
                Some("CommandOrControl+Alt+3".parse().unwrap()),
                Some(PathBuf::from("/home/alice/Desktop")),
                "Desktop",
            ),
        );
        config.insert("custom", Binding::new(None, None, "no hotkey yet"));

        let bytes = export(&config).unwrap();
        let restored = Configuration::try_from(import(&bytes).unwrap()).unwrap();
        assert_eq!(restored, config);

        // Deterministic output
        assert_eq!(export(&restored).unwrap(), bytes);
    }

    #[test]
    fn test_round_trip_empty() {
        let config = Configuration::new();
        let bytes = export(&config).unwrap();
        assert_eq!(
            Configuration::try_from(import(&bytes).unwrap()).unwrap(),
            config
        );
    }

    #[test]
    fn test_export_is_pretty_and_sorted() {
        let mut config = Configuration::new();
        config.insert("b", Binding::new(None, None, "B"));
        config.insert("a", Binding::new(None, None, "A"));

        let text = String::from_utf8(export(&config).unwrap()).unwrap();
        assert!(text.starts_with("{\n  \"folders\": {\n    \"a\": {"));
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn test_empty_folders_is_legal() {
        let record = import(br#"{"folders": {}}"#).unwrap();
        assert!(record.folders.is_empty());
    }

    #[test]
    fn test_partial_entries_default_to_empty() {
        let record = import(br#"{"folders": {"ID1": {"label": "Docs"}}}"#).unwrap();
        let entry = &record.folders["ID1"];
        assert_eq!(entry.path, "");
        assert_eq!(entry.hotkey, "");
        assert_eq!(entry.label, "Docs");
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert!(matches!(
            import(br#"{"bindings": {}}"#),
            Err(ParseError::MissingFolders)
        ));
        assert!(matches!(
            import(br#"{"folders": []}"#),
            Err(ParseError::MissingFolders)
        ));
        assert!(matches!(import(b"[1, 2]"), Err(ParseError::MissingFolders)));
        assert!(matches!(import(b"{not json"), Err(ParseError::Malformed(_))));
        assert!(matches!(
            import(br#"{"folders": {"ID1": {"path": 5}}}"#),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            import(&[0x7b, 0xff, 0xfe, 0x7d]),
            Err(ParseError::Encoding(_))
        ));
    }

    #[test]
    fn test_import_does_not_validate_hotkeys() {
        let record = import(br#"{"folders": {"ID1": {"hotkey": "Alt+Nope"}}}"#).unwrap();
        assert!(Configuration::try_from(record).is_err());
    }
}
