//! Hotkey accelerators and key code mapping
//!
//! Hotkeys are stored as accelerator strings such as `CommandOrControl+Alt+1`.
//! Parsing is case-insensitive and accepts the usual modifier aliases; the
//! canonical spelling is what gets written back.

use evdev::KeyCode;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Why an accelerator string was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyParseError {
    #[error("hotkey is empty")]
    Empty,
    #[error("empty token in '{0}'")]
    EmptyToken(String),
    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),
    #[error("modifier '{0}' given more than once")]
    DuplicateModifier(String),
    #[error("key '{0}' must be the last token")]
    KeyNotLast(String),
    #[error("no key after the modifiers")]
    MissingKey,
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

/// Modifier set of a hotkey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    /// Control on Linux, Command on macOS
    pub command_or_control: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        command_or_control: false,
        alt: false,
        shift: false,
    };

    pub const COMMAND_OR_CONTROL_ALT: Self = Self {
        command_or_control: true,
        alt: true,
        shift: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    CommandOrControl,
    Alt,
    Shift,
}

impl Modifier {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "commandorcontrol" | "cmdorctrl" | "commandorctrl" | "cmdorcontrol" | "control"
            | "ctrl" => Some(Self::CommandOrControl),
            "alt" | "option" => Some(Self::Alt),
            "shift" => Some(Self::Shift),
            _ => None,
        }
    }

    fn canonical(self) -> &'static str {
        match self {
            Self::CommandOrControl => "CommandOrControl",
            Self::Alt => "Alt",
            Self::Shift => "Shift",
        }
    }
}

/// The non-modifier key of a hotkey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyToken {
    /// `A`-`Z` (stored uppercase) and `0`-`9`
    Char(char),
    /// `F1`-`F12`
    Function(u8),
    Minus,
    Equal,
    Comma,
    Period,
    Slash,
    Backslash,
    Semicolon,
    Quote,
    Backquote,
    BracketLeft,
    BracketRight,
    Space,
    Tab,
    Enter,
    Escape,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
}

/// Named keys with their canonical spelling and evdev name
const NAMED_KEYS: &[(KeyToken, &str, &str)] = &[
    (KeyToken::Minus, "Minus", "KEY_MINUS"),
    (KeyToken::Equal, "Equal", "KEY_EQUAL"),
    (KeyToken::Comma, "Comma", "KEY_COMMA"),
    (KeyToken::Period, "Period", "KEY_DOT"),
    (KeyToken::Slash, "Slash", "KEY_SLASH"),
    (KeyToken::Backslash, "Backslash", "KEY_BACKSLASH"),
    (KeyToken::Semicolon, "Semicolon", "KEY_SEMICOLON"),
    (KeyToken::Quote, "Quote", "KEY_APOSTROPHE"),
    (KeyToken::Backquote, "Backquote", "KEY_GRAVE"),
    (KeyToken::BracketLeft, "BracketLeft", "KEY_LEFTBRACE"),
    (KeyToken::BracketRight, "BracketRight", "KEY_RIGHTBRACE"),
    (KeyToken::Space, "Space", "KEY_SPACE"),
    (KeyToken::Tab, "Tab", "KEY_TAB"),
    (KeyToken::Enter, "Enter", "KEY_ENTER"),
    (KeyToken::Escape, "Escape", "KEY_ESC"),
    (KeyToken::Backspace, "Backspace", "KEY_BACKSPACE"),
    (KeyToken::Delete, "Delete", "KEY_DELETE"),
    (KeyToken::Insert, "Insert", "KEY_INSERT"),
    (KeyToken::Home, "Home", "KEY_HOME"),
    (KeyToken::End, "End", "KEY_END"),
    (KeyToken::PageUp, "PageUp", "KEY_PAGEUP"),
    (KeyToken::PageDown, "PageDown", "KEY_PAGEDOWN"),
    (KeyToken::Up, "Up", "KEY_UP"),
    (KeyToken::Down, "Down", "KEY_DOWN"),
    (KeyToken::Left, "Left", "KEY_LEFT"),
    (KeyToken::Right, "Right", "KEY_RIGHT"),
];

impl KeyToken {
    fn parse(token: &str) -> Option<Self> {
        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next())
            && c.is_ascii_alphanumeric()
        {
            return Some(Self::Char(c.to_ascii_uppercase()));
        }

        if let Some(number) = token
            .strip_prefix('F')
            .or_else(|| token.strip_prefix('f'))
            .and_then(|n| n.parse::<u8>().ok())
            && (1..=12).contains(&number)
        {
            return Some(Self::Function(number));
        }

        NAMED_KEYS
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(token))
            .map(|(key, _, _)| *key)
    }

    fn named(&self) -> Option<(&'static str, &'static str)> {
        NAMED_KEYS
            .iter()
            .find(|(key, _, _)| key == self)
            .map(|(_, name, evdev)| (*name, *evdev))
    }

    /// Linux input event name, e.g. `KEY_1` or `KEY_MINUS`
    pub fn evdev_name(&self) -> String {
        match self {
            Self::Char(c) => format!("KEY_{c}"),
            Self::Function(n) => format!("KEY_F{n}"),
            named => named
                .named()
                .map(|(_, evdev)| evdev.to_string())
                .unwrap_or_default(),
        }
    }

    /// evdev key code (KEY_1 = 2, KEY_A = 30, KEY_F1 = 59)
    pub fn key_code(&self) -> Option<u16> {
        KeyCode::from_str(&self.evdev_name())
            .ok()
            .map(|key| key.code())
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{c}"),
            Self::Function(n) => write!(f, "F{n}"),
            named => match named.named() {
                Some((name, _)) => f.write_str(name),
                None => Err(fmt::Error),
            },
        }
    }
}

/// A parsed, normalized global hotkey
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub key: KeyToken,
}

impl Hotkey {
    pub fn new(modifiers: Modifiers, key: KeyToken) -> Self {
        Self { modifiers, key }
    }

    /// Parse a stored hotkey field; an empty string means unset
    pub fn parse_optional(text: &str) -> Result<Option<Self>, HotkeyParseError> {
        if text.trim().is_empty() {
            Ok(None)
        } else {
            text.parse().map(Some)
        }
    }
}

impl FromStr for Hotkey {
    type Err = HotkeyParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(HotkeyParseError::Empty);
        }

        let tokens: Vec<&str> = trimmed.split('+').map(str::trim).collect();
        if tokens.iter().any(|token| token.is_empty()) {
            return Err(HotkeyParseError::EmptyToken(trimmed.to_string()));
        }

        let (last, leading) = tokens.split_last().ok_or(HotkeyParseError::Empty)?;

        let mut modifiers = Modifiers::NONE;
        for token in leading {
            let modifier = match Modifier::parse(token) {
                Some(modifier) => modifier,
                None if KeyToken::parse(token).is_some() => {
                    return Err(HotkeyParseError::KeyNotLast(token.to_string()));
                }
                None => return Err(HotkeyParseError::UnknownModifier(token.to_string())),
            };

            let slot = match modifier {
                Modifier::CommandOrControl => &mut modifiers.command_or_control,
                Modifier::Alt => &mut modifiers.alt,
                Modifier::Shift => &mut modifiers.shift,
            };
            if *slot {
                return Err(HotkeyParseError::DuplicateModifier(
                    modifier.canonical().to_string(),
                ));
            }
            *slot = true;
        }

        let key = match KeyToken::parse(last) {
            Some(key) => key,
            None if Modifier::parse(last).is_some() => return Err(HotkeyParseError::MissingKey),
            None => return Err(HotkeyParseError::UnknownKey(last.to_string())),
        };

        Ok(Self { modifiers, key })
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if self.modifiers.command_or_control {
            parts.push(Modifier::CommandOrControl.canonical().to_string());
        }
        if self.modifiers.alt {
            parts.push(Modifier::Alt.canonical().to_string());
        }
        if self.modifiers.shift {
            parts.push(Modifier::Shift.canonical().to_string());
        }
        parts.push(self.key.to_string());

        f.write_str(&parts.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical() {
        let hotkey: Hotkey = "CommandOrControl+Alt+1".parse().unwrap();
        assert_eq!(hotkey.modifiers, Modifiers::COMMAND_OR_CONTROL_ALT);
        assert_eq!(hotkey.key, KeyToken::Char('1'));
        assert_eq!(hotkey.to_string(), "CommandOrControl+Alt+1");
    }

    #[test]
    fn test_aliases_and_case_normalize() {
        let hotkey: Hotkey = " ctrl + option + shift + a ".parse().unwrap();
        assert_eq!(hotkey.to_string(), "CommandOrControl+Alt+Shift+A");

        let hotkey: Hotkey = "Shift+CmdOrCtrl+minus".parse().unwrap();
        assert_eq!(hotkey.to_string(), "CommandOrControl+Shift+Minus");

        let a: Hotkey = "Alt+CommandOrControl+Equal".parse().unwrap();
        let b: Hotkey = "CmdOrControl+ALT+equal".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bare_key_and_function_keys() {
        let hotkey: Hotkey = "f12".parse().unwrap();
        assert_eq!(hotkey.modifiers, Modifiers::NONE);
        assert_eq!(hotkey.key, KeyToken::Function(12));
        assert_eq!(hotkey.to_string(), "F12");

        let hotkey: Hotkey = "Alt+PageDown".parse().unwrap();
        assert_eq!(hotkey.key, KeyToken::PageDown);
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!("".parse::<Hotkey>(), Err(HotkeyParseError::Empty));
        assert_eq!("   ".parse::<Hotkey>(), Err(HotkeyParseError::Empty));
        assert!(matches!(
            "Alt++1".parse::<Hotkey>(),
            Err(HotkeyParseError::EmptyToken(_))
        ));
        assert!(matches!(
            "Alt+1+".parse::<Hotkey>(),
            Err(HotkeyParseError::EmptyToken(_))
        ));
        assert_eq!(
            "Super+1".parse::<Hotkey>(),
            Err(HotkeyParseError::UnknownModifier("Super".to_string()))
        );
        assert_eq!(
            "Ctrl+Control+1".parse::<Hotkey>(),
            Err(HotkeyParseError::DuplicateModifier(
                "CommandOrControl".to_string()
            ))
        );
        assert_eq!(
            "1+Alt".parse::<Hotkey>(),
            Err(HotkeyParseError::KeyNotLast("1".to_string()))
        );
        assert_eq!(
            "CommandOrControl+Alt".parse::<Hotkey>(),
            Err(HotkeyParseError::MissingKey)
        );
        assert_eq!(
            "Alt+F13".parse::<Hotkey>(),
            Err(HotkeyParseError::UnknownKey("F13".to_string()))
        );
        assert_eq!(
            "Alt+Banana".parse::<Hotkey>(),
            Err(HotkeyParseError::UnknownKey("Banana".to_string()))
        );
    }

    #[test]
    fn test_parse_optional() {
        assert_eq!(Hotkey::parse_optional("").unwrap(), None);
        assert_eq!(Hotkey::parse_optional("  ").unwrap(), None);
        assert!(Hotkey::parse_optional("Alt+1").unwrap().is_some());
        assert!(Hotkey::parse_optional("Alt+").is_err());
    }

    #[test]
    fn test_evdev_key_codes() {
        assert_eq!(KeyToken::Char('1').key_code(), Some(2));
        assert_eq!(KeyToken::Char('0').key_code(), Some(11));
        assert_eq!(KeyToken::Minus.key_code(), Some(12));
        assert_eq!(KeyToken::Equal.key_code(), Some(13));
        assert_eq!(KeyToken::Tab.key_code(), Some(15));
        assert_eq!(KeyToken::Char('A').key_code(), Some(30));
        assert_eq!(KeyToken::Function(1).key_code(), Some(59));
    }

    #[test]
    fn test_every_named_key_maps_to_a_code() {
        for (key, name, _) in NAMED_KEYS {
            assert!(key.key_code().is_some(), "{name} has no evdev code");
            assert_eq!(KeyToken::parse(name), Some(*key));
            assert_eq!(key.to_string(), *name);
        }
    }
}
