//! Mouse button identities and per-button edge detection.
//!
//! Mouse buttons are tracked independently of the keyboard: no ordering
//! buffer and no combination detection apply to them.

use crate::protocol::messages::KeyAction;

/// A tracked mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Button4,
    Button5,
}

impl MouseButton {
    /// All tracked buttons in poll order.
    pub const ALL: [MouseButton; 5] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::Button4,
        MouseButton::Button5,
    ];

    /// Wire label used in `MOUSE_BUTTON` lines.
    pub fn as_str(self) -> &'static str {
        match self {
            MouseButton::Left => "LEFT",
            MouseButton::Right => "RIGHT",
            MouseButton::Middle => "MIDDLE",
            MouseButton::Button4 => "BUTTON_4",
            MouseButton::Button5 => "BUTTON_5",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.as_str() == label)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Remembers the last observed state of each button.
#[derive(Debug, Default)]
pub struct MouseTracker {
    down: [bool; 5],
}

impl MouseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a fresh sample and returns every button whose state flipped,
    /// in [`MouseButton::ALL`] order.
    pub fn diff(&mut self, sample: [bool; 5]) -> Vec<(MouseButton, KeyAction)> {
        let mut changes = Vec::new();
        for button in MouseButton::ALL {
            let now = sample[button.index()];
            if now != self.down[button.index()] {
                self.down[button.index()] = now;
                changes.push((button, KeyAction::from_down(now)));
            }
        }
        changes
    }

    pub fn is_down(&self, button: MouseButton) -> bool {
        self.down[button.index()]
    }

    pub fn reset(&mut self) {
        self.down = [false; 5];
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
