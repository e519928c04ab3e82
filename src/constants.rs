//! Application-wide constants
//!
//! File names, queue sizes and external command names live here so the
//! rest of the crate never carries bare literals.

/// Configuration storage constants
pub mod config {
    /// Directory under the user's config dir
    pub const APP_DIR: &str = "folder-hotkeys";

    /// Persisted configuration file name
    pub const FILENAME: &str = "config.json";

    /// Environment variable overriding the configuration directory
    pub const CONFIG_DIR_ENV: &str = "FOLDER_HOTKEYS_CONFIG_DIR";

    /// Bundled default, relative to the directory holding the executable
    pub const BUNDLED_DEFAULT_RELATIVE: &str = "config/default-config.json";

    /// System-wide bundled default installed by packages
    pub const BUNDLED_DEFAULT_SYSTEM: &str = "/usr/share/folder-hotkeys/default-config.json";

    /// Pid file written by the resident daemon
    pub const PID_FILENAME: &str = "daemon.pid";
}

/// Hotkey dispatch constants
pub mod dispatch {
    /// Pending launches between hotkey delivery and the launch worker
    pub const LAUNCH_QUEUE_CAPACITY: usize = 16;

    /// Opener processes allowed to run at once
    pub const MAX_CONCURRENT_LAUNCHES: usize = 4;

    /// Key press events buffered between the X11 listener and the daemon loop
    pub const HOTKEY_EVENT_CAPACITY: usize = 32;
}

/// X11 backend constants
pub mod x11 {
    /// poll() timeout for the listener thread, in milliseconds
    pub const POLL_TIMEOUT_MS: i32 = 250;

    /// X11 keycodes are evdev keycodes shifted by this offset
    pub const EVDEV_KEYCODE_OFFSET: u16 = 8;
}

/// Folder launcher constants
pub mod launcher {
    /// Command used to reveal a folder in the file browser
    pub const OPENER: &str = "xdg-open";

    /// Failure reason for paths that cannot be accessed
    pub const NOT_ACCESSIBLE: &str = "not accessible";

    /// Status reported when a slot has no folder
    pub const NO_PATH: &str = "No path configured";
}

/// Dialog constants
pub mod dialog {
    /// Native dialog helper
    pub const COMMAND: &str = "zenity";

    /// zenity exit status when the user cancels
    pub const CANCELLED_STATUS: i32 = 1;

    /// Suggested export file name
    pub const EXPORT_DEFAULT_NAME: &str = "hotkey-folder-config.json";

    /// Filter shown in export/import dialogs
    pub const JSON_FILTER_NAME: &str = "JSON Files";
    pub const JSON_EXTENSION: &str = "json";
}
