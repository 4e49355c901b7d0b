//! Modifier-first ordering of key events with a short settle delay.
//!
//! Modifiers and the key they modify are usually seen in the same tick, but a
//! receiver interpreting `Shift+K` needs the Shift press *before* the K press.
//! Polling granularity also means the two can land on adjacent ticks.  The
//! buffer handles both:
//!
//! 1. Every key transition of the tick is pushed into the buffer.
//! 2. A modifier *press* arms a countdown of `settle_ticks` ticks.
//! 3. While the countdown is armed, [`EventOrderingBuffer::flush_if_ready`]
//!    withholds the batch and decrements the countdown once per call.
//! 4. Once the countdown is zero the whole batch is stably sorted so modifier
//!    events come first (arrival order is kept within each class) and emitted.

use tracing::debug;

use crate::domain::diff::KeyTransition;
use crate::protocol::messages::KeyAction;

/// Number of ticks a modifier press holds the batch back.
pub const DEFAULT_SETTLE_TICKS: u32 = 3;

#[derive(Debug)]
pub struct EventOrderingBuffer {
    pending: Vec<KeyTransition>,
    countdown: u32,
    settle_ticks: u32,
}

impl Default for EventOrderingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_TICKS)
    }
}

impl EventOrderingBuffer {
    pub fn new(settle_ticks: u32) -> Self {
        Self {
            pending: Vec::new(),
            countdown: 0,
            settle_ticks,
        }
    }

    /// Buffers one transition; a modifier press (re)arms the settle countdown.
    pub fn push(&mut self, transition: KeyTransition) {
        if transition.key.is_modifier() && transition.action == KeyAction::Press {
            self.countdown = self.settle_ticks;
            debug!(key = ?transition.key, delay = self.countdown, "modifier press arms settle delay");
        }
        self.pending.push(transition);
    }

    /// Called once per tick.  Returns the sorted batch when it is ready, or an
    /// empty vector while the batch is still settling (or nothing is buffered).
    pub fn flush_if_ready(&mut self) -> Vec<KeyTransition> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        if self.countdown > 0 {
            self.countdown -= 1;
            debug!(
                delay = self.countdown,
                buffered = self.pending.len(),
                "holding key events"
            );
            return Vec::new();
        }

        let mut batch = std::mem::take(&mut self.pending);
        // `sort_by_key` is stable, so arrival order survives within each class.
        batch.sort_by_key(|t| !t.key.is_modifier());
        batch
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remaining ticks before the batch may flush.
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Drops buffered events and disarms the countdown.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.countdown = 0;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
