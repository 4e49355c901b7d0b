//! Input state polling for the capture client.
//!
//! The capture engine never receives input *events*; it asks, once per tick,
//! whether each tracked key and button is currently down.  Platform backends
//! (GLFW window handle, X11 keymap query, `GetAsyncKeyState`, ...) implement
//! [`InputSource`]; tests and the headless binary use
//! [`mock::MockInputSource`].
//!
//! # Testability
//!
//! [`KeyStateSampler`] is the only caller of [`InputSource::is_key_down`] and
//! it iterates [`KeyCode::TRACKED`] exclusively, so a backend is never asked
//! about a code outside the tracked set.

use std::collections::BTreeSet;

use inputlink_core::{KeyCode, MouseButton};

pub mod mock;

/// Read-only view of the current keyboard and mouse button state.
pub trait InputSource: Send {
    /// Returns `true` while `key` is held.
    fn is_key_down(&self, key: KeyCode) -> bool;

    /// Returns `true` while `button` is held.
    fn is_mouse_down(&self, button: MouseButton) -> bool;
}

/// Polls an [`InputSource`] over the tracked key set and the five mouse buttons.
pub struct KeyStateSampler<S> {
    source: S,
}

impl<S: InputSource> KeyStateSampler<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Returns every tracked key that is down right now.
    pub fn sample_keys(&self) -> BTreeSet<KeyCode> {
        KeyCode::TRACKED
            .into_iter()
            .filter(|key| self.source.is_key_down(*key))
            .collect()
    }

    /// Returns the down state of each button, indexed in [`MouseButton::ALL`] order.
    pub fn sample_mouse(&self) -> [bool; 5] {
        MouseButton::ALL.map(|button| self.source.is_mouse_down(button))
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
