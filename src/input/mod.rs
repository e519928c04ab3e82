//! Global hotkey input

pub mod backend;
pub mod x11_backend;

pub use backend::{GlobalHotkey, HotkeyEvent, RegistrationError};
pub use x11_backend::X11Backend;
