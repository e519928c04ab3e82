//! Hotkey daemon - registers hotkeys and opens folders when they fire

pub mod dispatcher;
pub mod launcher;
mod main_loop;

pub use main_loop::run_daemon;
