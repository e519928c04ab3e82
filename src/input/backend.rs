//! Global hotkey backend abstraction
//!
//! The dispatcher only sees this trait; presses come back as
//! [`HotkeyEvent`]s on the channel handed to the backend at construction.

use thiserror::Error;

use crate::config::Hotkey;

/// A registered hotkey was pressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyEvent {
    pub hotkey: Hotkey,
}

/// A single hotkey could not be registered; other hotkeys are unaffected
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0} is already registered")]
    AlreadyRegistered(Hotkey),
    #[error("{0} is grabbed by another application")]
    Claimed(Hotkey),
    #[error("{0} has no keycode on this system")]
    Unmappable(Hotkey),
    #[error("failed to register {hotkey}: {reason}")]
    Backend { hotkey: Hotkey, reason: String },
}

/// OS-level global hotkey registration
pub trait GlobalHotkey {
    fn register(&mut self, hotkey: &Hotkey) -> Result<(), RegistrationError>;

    /// Release every registration; safe to call repeatedly
    fn unregister_all(&mut self);

    /// Human-readable backend name
    fn name(&self) -> &'static str;
}
