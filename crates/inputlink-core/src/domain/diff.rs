//! Press/release delta tracking over the tracked key set.
//!
//! [`DiffTracker`] owns the *pressed set* (keys held as of the previous tick)
//! and the *press order* (the same keys, in the order they went down).  Each
//! tick the caller hands it the full set of keys that are down right now and
//! gets back only what changed.
//!
//! ```text
//! tick 1: sample {LeftShift}        -> [LeftShift PRESS]
//! tick 2: sample {LeftShift, K}     -> [K PRESS]
//! tick 3: sample {K}                -> [LeftShift RELEASE]
//! ```
//!
//! Deltas are reported in [`KeyCode::TRACKED`] order, so identical input always
//! yields identical output ordering.

use std::collections::BTreeSet;

use crate::keymap::KeyCode;
use crate::protocol::messages::KeyAction;

/// One key edge detected between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: KeyCode,
    pub action: KeyAction,
}

impl KeyTransition {
    pub fn press(key: KeyCode) -> Self {
        Self {
            key,
            action: KeyAction::Press,
        }
    }

    pub fn release(key: KeyCode) -> Self {
        Self {
            key,
            action: KeyAction::Release,
        }
    }
}

/// All key edges produced by one call to [`DiffTracker::diff`], in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDelta {
    pub transitions: Vec<KeyTransition>,
}

impl KeyDelta {
    /// Keys that went down this tick.
    pub fn pressed(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.transitions
            .iter()
            .filter(|t| t.action == KeyAction::Press)
            .map(|t| t.key)
    }

    /// Keys that came up this tick.
    pub fn released(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.transitions
            .iter()
            .filter(|t| t.action == KeyAction::Release)
            .map(|t| t.key)
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Holds the previous tick's pressed set and turns new samples into deltas.
#[derive(Debug, Default)]
pub struct DiffTracker {
    pressed: BTreeSet<KeyCode>,
    press_order: Vec<KeyCode>,
}

impl DiffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a new sample and returns the keys that changed state.
    ///
    /// Newly pressed keys are appended to the press order; released keys are
    /// removed from it.  Keys outside [`KeyCode::TRACKED`] cannot appear in
    /// `sample` because the type system only admits tracked keys.
    pub fn diff(&mut self, sample: &BTreeSet<KeyCode>) -> KeyDelta {
        let mut delta = KeyDelta::default();

        for key in KeyCode::TRACKED {
            let down_now = sample.contains(&key);
            let was_down = self.pressed.contains(&key);

            if down_now && !was_down {
                self.pressed.insert(key);
                self.press_order.push(key);
                delta.transitions.push(KeyTransition::press(key));
            } else if !down_now && was_down {
                self.pressed.remove(&key);
                self.press_order.retain(|k| *k != key);
                delta.transitions.push(KeyTransition::release(key));
            }
        }

        delta
    }

    /// Keys currently held.
    pub fn pressed(&self) -> &BTreeSet<KeyCode> {
        &self.pressed
    }

    /// Currently held keys in the order they went down.
    pub fn press_order(&self) -> &[KeyCode] {
        &self.press_order
    }

    /// Forgets every held key.
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.press_order.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
