//! X11 XGrabKey hotkey backend
//!
//! Grabs each hotkey on the root window and listens for presses on a
//! dedicated thread. No special permissions are needed.
//!
//! Limitations:
//! - A combination grabbed by another client cannot be registered (BadAccess)
//! - Some exotic key combinations may not work under XWayland

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xproto::*;
use x11rb::protocol::{ErrorKind, Event};
use x11rb::rust_connection::RustConnection;

use crate::config::Hotkey;
use crate::constants;
use crate::input::backend::{GlobalHotkey, HotkeyEvent, RegistrationError};

type GrabMap = HashMap<(Keycode, ModMask), Hotkey>;

/// Lock-key states a grab must cover so NumLock/CapsLock don't break hotkeys
fn lock_masks() -> [ModMask; 4] {
    [
        ModMask::from(0u16),         // No lock keys
        ModMask::M2,                 // NumLock (Mod2)
        ModMask::LOCK,               // CapsLock
        ModMask::M2 | ModMask::LOCK, // NumLock + CapsLock
    ]
}

pub struct X11Backend {
    conn: Arc<RustConnection>,
    root: Window,
    grabs: Arc<Mutex<GrabMap>>,
    stop: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl X11Backend {
    /// Connect to the display and start the listener thread
    pub fn connect(sender: Sender<HotkeyEvent>) -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to X11 for hotkey listening")?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .context("X11 screen not found")?;

        info!(screen = screen_num, "X11 hotkey backend connected to display");

        let conn = Arc::new(conn);
        let grabs: Arc<Mutex<GrabMap>> = Arc::default();
        let stop = Arc::new(AtomicBool::new(false));

        let listener = {
            let conn = Arc::clone(&conn);
            let grabs = Arc::clone(&grabs);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("x11-hotkeys".into())
                .spawn(move || {
                    if let Err(e) = run_x11_listener(&conn, &grabs, &stop, sender) {
                        error!(error = %e, "X11 hotkey listener error");
                    }
                })
                .context("Failed to spawn X11 listener thread")?
        };

        Ok(Self {
            conn,
            root,
            grabs,
            stop,
            listener: Some(listener),
        })
    }
}

impl GlobalHotkey for X11Backend {
    fn register(&mut self, hotkey: &Hotkey) -> Result<(), RegistrationError> {
        let (keycode, modmask) =
            hotkey_to_x11(hotkey).ok_or_else(|| RegistrationError::Unmappable(hotkey.clone()))?;

        let mut grabs = self.grabs.lock();
        if grabs.contains_key(&(keycode, modmask)) {
            return Err(RegistrationError::AlreadyRegistered(hotkey.clone()));
        }

        grab_hotkey(&self.conn, self.root, keycode, modmask, hotkey)?;
        grabs.insert((keycode, modmask), hotkey.clone());

        debug!(
            hotkey = %hotkey,
            x11_keycode = keycode,
            modmask = ?modmask,
            "Grabbed hotkey"
        );
        Ok(())
    }

    fn unregister_all(&mut self) {
        let mut grabs = self.grabs.lock();
        if grabs.is_empty() {
            return;
        }

        for (keycode, modmask) in grabs.keys() {
            ungrab_hotkey(&self.conn, self.root, *keycode, *modmask, usize::MAX);
        }
        if let Err(e) = self.conn.flush() {
            warn!(error = %e, "Failed to flush X11 connection after ungrab");
        }

        debug!(count = grabs.len(), "Released X11 hotkey grabs");
        grabs.clear();
    }

    fn name(&self) -> &'static str {
        "X11"
    }
}

impl Drop for X11Backend {
    fn drop(&mut self) {
        self.unregister_all();
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.listener.take()
            && handle.join().is_err()
        {
            error!("X11 listener thread panicked");
        }
    }
}

/// Grab every lock-key permutation; on failure release what was grabbed
fn grab_hotkey(
    conn: &RustConnection,
    root: Window,
    keycode: Keycode,
    modmask: ModMask,
    hotkey: &Hotkey,
) -> Result<(), RegistrationError> {
    for (grabbed, lock_mask) in lock_masks().into_iter().enumerate() {
        let effective_modmask = modmask | lock_mask;

        let result = conn
            .grab_key(
                false, // deliver to this client only
                root,
                effective_modmask,
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )
            .map_err(ReplyError::from)
            .and_then(|cookie| cookie.check());

        if let Err(e) = result {
            ungrab_hotkey(conn, root, keycode, modmask, grabbed);
            let _ = conn.flush();
            return Err(match e {
                ReplyError::X11Error(ref x11) if x11.error_kind == ErrorKind::Access => {
                    RegistrationError::Claimed(hotkey.clone())
                }
                other => RegistrationError::Backend {
                    hotkey: hotkey.clone(),
                    reason: other.to_string(),
                },
            });
        }
    }

    Ok(())
}

/// Release the first `count` lock-key permutations of a grab
fn ungrab_hotkey(
    conn: &RustConnection,
    root: Window,
    keycode: Keycode,
    modmask: ModMask,
    count: usize,
) {
    for lock_mask in lock_masks().into_iter().take(count) {
        let effective_modmask = modmask | lock_mask;
        if let Err(e) = conn.ungrab_key(keycode, root, effective_modmask) {
            warn!(x11_keycode = keycode, error = %e, "Failed to ungrab key");
        }
    }
}

/// Listener loop: wait on the X11 fd, map presses back to hotkeys
#[allow(unsafe_code)] // Required for libc::poll() system call
fn run_x11_listener(
    conn: &RustConnection,
    grabs: &Mutex<GrabMap>,
    stop: &AtomicBool,
    sender: Sender<HotkeyEvent>,
) -> Result<()> {
    let x11_fd = conn.stream().as_raw_fd();

    while !stop.load(Ordering::Relaxed) {
        let mut poll_fds = [libc::pollfd {
            fd: x11_fd,
            events: libc::POLLIN,
            revents: 0,
        }];

        // SAFETY: `poll_fds` is a valid pointer to a stack-allocated array of `pollfd`.
        // The array length is 1, which matches the second argument.
        let poll_result =
            unsafe { libc::poll(poll_fds.as_mut_ptr(), 1, constants::x11::POLL_TIMEOUT_MS) };

        if poll_result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err).context("poll() on X11 connection failed");
        }

        // Drain even on timeout: replies read by register() may have queued events
        while let Some(event) = conn.poll_for_event()? {
            match event {
                Event::KeyPress(key_event) => {
                    let modmask = normalize_modmask(key_event.state);
                    let hotkey = grabs.lock().get(&(key_event.detail, modmask)).cloned();

                    match hotkey {
                        Some(hotkey) => {
                            info!(hotkey = %hotkey, "Hotkey pressed");
                            if sender.blocking_send(HotkeyEvent { hotkey }).is_err() {
                                debug!("Hotkey receiver closed, stopping X11 listener");
                                return Ok(());
                            }
                        }
                        None => debug!(
                            keycode = key_event.detail,
                            modmask = ?modmask,
                            "KeyPress event didn't match any registered hotkey"
                        ),
                    }
                }
                Event::MappingNotify(_) => {
                    warn!("Keyboard mapping changed - hotkeys may not work correctly until reload");
                }
                _ => {}
            }
        }
    }

    debug!("X11 listener stopped");
    Ok(())
}

/// Normalize modifier mask by removing lock keys
fn normalize_modmask(state: KeyButMask) -> ModMask {
    let state_u16: u16 = state.into();

    // Keep only Shift, Control, Mod1 (Alt)
    let normalized =
        state_u16 & (ModMask::SHIFT.bits() | ModMask::CONTROL.bits() | ModMask::M1.bits());

    ModMask::from(normalized)
}

/// X11 keycode and modifier mask for a hotkey
fn hotkey_to_x11(hotkey: &Hotkey) -> Option<(Keycode, ModMask)> {
    let x11_keycode = evdev_keycode_to_x11(hotkey.key.key_code()?)?;

    let mut modmask = ModMask::from(0u16);
    if hotkey.modifiers.command_or_control {
        modmask |= ModMask::CONTROL;
    }
    if hotkey.modifiers.shift {
        modmask |= ModMask::SHIFT;
    }
    if hotkey.modifiers.alt {
        modmask |= ModMask::M1; // Alt is typically Mod1
    }

    Some((x11_keycode, modmask))
}

/// Convert evdev keycode to X11 keycode
///
/// X11 keycodes are evdev keycode + 8 on modern Linux systems.
/// Valid X11 keycodes are 8-255.
fn evdev_keycode_to_x11(evdev_code: u16) -> Option<Keycode> {
    let x11_code = evdev_code.checked_add(constants::x11::EVDEV_KEYCODE_OFFSET)?;
    Keycode::try_from(x11_code).ok()
}
