//! Domain layer: the per-tick input state machines.
//!
//! None of these types know where samples come from or where events go.  The
//! capture engine in `inputlink-client` feeds them one tick at a time.
//!
//! - **`diff`** – Turns a full pressed-key sample into press/release deltas
//!   and keeps the temporal press order.
//! - **`sequence`** – Detects multi-key combinations and tracks their
//!   active/broken/restored lifecycle.
//! - **`ordering`** – Buffers a tick's key deltas so modifiers are reported
//!   first, with a short settle delay.
//! - **`mouse`** – Edge detection for the five tracked mouse buttons.

pub mod diff;
pub mod mouse;
pub mod ordering;
pub mod sequence;
