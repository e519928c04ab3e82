//! Configuration management
//!
//! Slot bindings, the accelerator grammar, JSON persistence, import/export
//! and the live registry that owns the current configuration.

pub mod binding;
pub mod codec;
pub mod defaults;
pub mod hotkey;
pub mod registry;
pub mod store;

pub use binding::{ConfigRecord, Configuration};
pub use hotkey::Hotkey;
pub use registry::{BindingEdit, BindingRegistry, RegistryError};
pub use store::JsonFileStore;
