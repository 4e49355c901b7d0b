//! Chord detection with break/restore tracking.
//!
//! A *combination* is the exact set of keys held at once, with at least two
//! members.  [`SequenceDetector`] tracks every combination it has reported in
//! one of two maps:
//!
//! - **active** – the combination is fully held right now.
//! - **broken** – it was fully held, then lost a member, and at least one of
//!   its members is still down.  If the very same set is held again it is
//!   reported as `RESTORE` rather than a fresh `PRESS`.
//!
//! ```text
//! held {Ctrl, C}        -> SEQ PRESS   Ctrl+C      active: {Ctrl,C}
//! held {Ctrl}           -> SEQ RELEASE Ctrl+C      broken: {Ctrl,C}
//! held {Ctrl, C}        -> SEQ RESTORE Ctrl+C      active: {Ctrl,C}
//! held {}               -> SEQ RELEASE Ctrl+C      (broken entry dropped, no member held)
//! ```
//!
//! Each combination carries its *reporting order*: the order its members were
//! pressed when it was first seen.  That order survives the active/broken
//! round trip so a restored chord reads the same as when it was first pressed.
//!
//! Single keys never become combinations, so a lone held key produces no `SEQ`
//! lines.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::keymap::KeyCode;
use crate::protocol::messages::{LineMessage, SeqAction};

/// Minimum number of simultaneously held keys that form a combination.
pub const MIN_COMBINATION_SIZE: usize = 2;

/// A set of keys held together.  Equality ignores press order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Combination(BTreeSet<KeyCode>);

impl Combination {
    pub fn new(keys: BTreeSet<KeyCode>) -> Self {
        Self(keys)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: KeyCode) -> bool {
        self.0.contains(&key)
    }

    /// Returns `true` while every member is in `pressed`.
    pub fn is_held(&self, pressed: &BTreeSet<KeyCode>) -> bool {
        self.0.is_subset(pressed)
    }

    /// Returns `true` while at least one member is in `pressed`.
    pub fn any_held(&self, pressed: &BTreeSet<KeyCode>) -> bool {
        self.0.iter().any(|k| pressed.contains(k))
    }

    /// Restricts `press_order` to this combination's members.
    fn ordered_from(&self, press_order: &[KeyCode]) -> Vec<KeyCode> {
        press_order
            .iter()
            .copied()
            .filter(|k| self.0.contains(k))
            .collect()
    }
}

impl FromIterator<KeyCode> for Combination {
    fn from_iter<T: IntoIterator<Item = KeyCode>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A `SEQ` event: the action plus the members in reporting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEvent {
    pub action: SeqAction,
    pub keys: Vec<KeyCode>,
}

impl SequenceEvent {
    pub fn to_message(&self) -> LineMessage {
        LineMessage::Sequence {
            action: self.action,
            keys: self.keys.clone(),
        }
    }
}

/// Tracks active and broken combinations across ticks.
#[derive(Debug, Default)]
pub struct SequenceDetector {
    active: BTreeMap<Combination, Vec<KeyCode>>,
    broken: BTreeMap<Combination, Vec<KeyCode>>,
}

impl SequenceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates combination state from the post-diff pressed set.
    ///
    /// `press_order` is the pressed set in the order keys went down.  Events
    /// are returned in the order: entry (`PRESS`/`RESTORE`), then exits
    /// (`RELEASE`).
    pub fn update(
        &mut self,
        pressed: &BTreeSet<KeyCode>,
        press_order: &[KeyCode],
    ) -> Vec<SequenceEvent> {
        let mut events = Vec::new();

        if pressed.len() >= MIN_COMBINATION_SIZE {
            let current = Combination::new(pressed.clone());
            if !self.active.contains_key(&current) {
                events.push(self.enter(current, press_order));
            }
        }

        let exited: Vec<Combination> = self
            .active
            .keys()
            .filter(|c| !c.is_held(pressed))
            .cloned()
            .collect();
        for combination in exited {
            if let Some(order) = self.active.remove(&combination) {
                debug!(keys = ?order, "sequence broken");
                events.push(SequenceEvent {
                    action: SeqAction::Release,
                    keys: order.clone(),
                });
                if combination.len() >= MIN_COMBINATION_SIZE {
                    self.broken.insert(combination, order);
                }
            }
        }

        self.broken.retain(|combination, order| {
            let keep = combination.any_held(pressed);
            if !keep {
                debug!(keys = ?order, "discarding broken sequence");
            }
            keep
        });

        events
    }

    fn enter(&mut self, current: Combination, press_order: &[KeyCode]) -> SequenceEvent {
        if let Some(cached) = self.broken.remove(&current) {
            debug!(keys = ?cached, "sequence restored");
            self.active.insert(current, cached.clone());
            return SequenceEvent {
                action: SeqAction::Restore,
                keys: cached,
            };
        }

        let order = current.ordered_from(press_order);
        debug!(keys = ?order, "new sequence");
        self.active.insert(current, order.clone());
        SequenceEvent {
            action: SeqAction::Press,
            keys: order,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn broken_count(&self) -> usize {
        self.broken.len()
    }

    pub fn is_active(&self, combination: &Combination) -> bool {
        self.active.contains_key(combination)
    }

    pub fn is_broken(&self, combination: &Combination) -> bool {
        self.broken.contains_key(combination)
    }

    /// Drops every tracked combination without emitting events.
    pub fn reset(&mut self) {
        self.active.clear();
        self.broken.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
