//! # inputlink-core
//!
//! Shared library for InputLink containing the per-tick input state machines
//! and the line-oriented wire protocol.
//!
//! This crate has zero dependencies on OS APIs, async runtimes, or network
//! sockets.  Everything here is a plain state transition over a bounded
//! domain, so it can be driven from a test one tick at a time.
//!
//! # Architecture overview
//!
//! InputLink observes a user's keyboard and mouse by *polling* device state on
//! a fixed tick and forwards what changed to a remote process as text lines.
//! The pieces in this crate are:
//!
//! - **`keymap`** – The fixed set of trackable keys ([`KeyCode`]), their
//!   numeric codes, human-readable names, and modifier classification.
//!
//! - **`domain`** – The state machines that turn raw samples into events:
//!   [`DiffTracker`] (press/release deltas), [`SequenceDetector`] (chords with
//!   break/restore tracking), [`EventOrderingBuffer`] (modifier-first ordering
//!   with a settle delay) and [`MouseTracker`].
//!
//! - **`protocol`** – The pipe-delimited text lines sent over the wire and a
//!   parser for reading them back.

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::diff::{DiffTracker, KeyDelta, KeyTransition};
pub use domain::mouse::{MouseButton, MouseTracker};
pub use domain::ordering::{EventOrderingBuffer, DEFAULT_SETTLE_TICKS};
pub use domain::sequence::{Combination, SequenceDetector, SequenceEvent};
pub use keymap::KeyCode;
pub use protocol::codec::{decode_line, ProtocolError};
pub use protocol::messages::{KeyAction, LineMessage, OutgoingEvent, SeqAction};
