//! Scriptable input source for tests and the headless binary.
//!
//! Clones share one state, so a test can keep a handle, pass another into the
//! capture engine, and press or release keys between ticks.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use inputlink_core::{KeyCode, MouseButton};

use super::InputSource;

#[derive(Debug, Default)]
struct MockState {
    keys: BTreeSet<KeyCode>,
    buttons: BTreeSet<usize>,
    key_queries: usize,
}

/// Shared handle to a set of "held" keys and buttons.
#[derive(Debug, Clone, Default)]
pub struct MockInputSource {
    state: Arc<Mutex<MockState>>,
}

impl MockInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn press(&self, key: KeyCode) {
        self.lock().keys.insert(key);
    }

    pub fn release(&self, key: KeyCode) {
        self.lock().keys.remove(&key);
    }

    /// Replaces the whole held key set.
    pub fn hold_only(&self, keys: &[KeyCode]) {
        self.lock().keys = keys.iter().copied().collect();
    }

    pub fn press_button(&self, button: MouseButton) {
        self.lock().buttons.insert(button as usize);
    }

    pub fn release_button(&self, button: MouseButton) {
        self.lock().buttons.remove(&(button as usize));
    }

    /// Releases every key and button.
    pub fn release_all(&self) {
        let mut state = self.lock();
        state.keys.clear();
        state.buttons.clear();
    }

    /// Number of [`InputSource::is_key_down`] calls served so far.
    pub fn key_queries(&self) -> usize {
        self.lock().key_queries
    }
}

impl InputSource for MockInputSource {
    fn is_key_down(&self, key: KeyCode) -> bool {
        let mut state = self.lock();
        state.key_queries += 1;
        state.keys.contains(&key)
    }

    fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.lock().buttons.contains(&(button as usize))
    }
}
