//! Line message types for the InputLink wire protocol.
//!
//! Every message is one line of UTF-8 text with pipe-delimited fields:
//!
//! ```text
//! KEY|PRESS|75|key.keyboard.k                                  4 fields
//! MOUSE_BUTTON|LEFT|PRESS                                      3 fields
//! SEQ|PRESS|340+75|key.keyboard.left.shift+key.keyboard.k      4 fields
//! PING|1718000000000                                           2 fields
//! ```
//!
//! Fields are never escaped; no field may contain `|`.  Sequence members are
//! joined with `+` in the order the keys were first pressed.
//!
//! The line terminator is added by the transport, not by [`LineMessage`]'s
//! `Display` impl.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::mouse::MouseButton;
use crate::keymap::KeyCode;

/// Field separator.
pub const FIELD_SEPARATOR: char = '|';

/// Separator between sequence members in the code and name fields.
pub const MEMBER_SEPARATOR: char = '+';

pub const TAG_KEY: &str = "KEY";
pub const TAG_MOUSE_BUTTON: &str = "MOUSE_BUTTON";
pub const TAG_SEQUENCE: &str = "SEQ";
pub const TAG_PING: &str = "PING";

/// Press or release of a single key or mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Press,
    Release,
}

impl KeyAction {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyAction::Press => "PRESS",
            KeyAction::Release => "RELEASE",
        }
    }

    /// Maps a "is down now" edge to the action it represents.
    pub fn from_down(is_down: bool) -> Self {
        if is_down {
            KeyAction::Press
        } else {
            KeyAction::Release
        }
    }
}

/// Lifecycle step of a multi-key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqAction {
    /// A combination became fully held for the first time.
    Press,
    /// A fully held combination lost at least one member.
    Release,
    /// A previously broken combination became fully held again.
    Restore,
}

impl SeqAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SeqAction::Press => "PRESS",
            SeqAction::Release => "RELEASE",
            SeqAction::Restore => "RESTORE",
        }
    }
}

/// A decoded or to-be-encoded protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMessage {
    /// `KEY|<action>|<code>|<name>`
    Key { action: KeyAction, key: KeyCode },
    /// `MOUSE_BUTTON|<button>|<action>`
    MouseButton {
        button: MouseButton,
        action: KeyAction,
    },
    /// `SEQ|<action>|<codes>|<names>`; `keys` is in reporting order.
    Sequence { action: SeqAction, keys: Vec<KeyCode> },
    /// `PING|<epoch-millis>`
    Ping { epoch_millis: u64 },
}

impl LineMessage {
    /// Returns the leading tag of the line (`KEY`, `SEQ`, ...).
    pub fn tag(&self) -> &'static str {
        match self {
            LineMessage::Key { .. } => TAG_KEY,
            LineMessage::MouseButton { .. } => TAG_MOUSE_BUTTON,
            LineMessage::Sequence { .. } => TAG_SEQUENCE,
            LineMessage::Ping { .. } => TAG_PING,
        }
    }

    /// Number of `|`-separated fields this message occupies on the wire.
    pub fn field_count(&self) -> usize {
        match self {
            LineMessage::Key { .. } | LineMessage::Sequence { .. } => 4,
            LineMessage::MouseButton { .. } => 3,
            LineMessage::Ping { .. } => 2,
        }
    }

    /// Builds a ping stamped with the current wall-clock time.
    pub fn ping_now() -> Self {
        LineMessage::Ping {
            epoch_millis: current_epoch_millis(),
        }
    }

    /// Formats the message into an immutable outgoing line.
    pub fn to_event(&self) -> OutgoingEvent {
        OutgoingEvent(self.to_string())
    }
}

impl fmt::Display for LineMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineMessage::Key { action, key } => write!(
                f,
                "{TAG_KEY}|{}|{}|{}",
                action.as_str(),
                key.code(),
                key.name()
            ),
            LineMessage::MouseButton { button, action } => write!(
                f,
                "{TAG_MOUSE_BUTTON}|{}|{}",
                button.as_str(),
                action.as_str()
            ),
            LineMessage::Sequence { action, keys } => {
                let codes: Vec<String> = keys.iter().map(|k| k.code().to_string()).collect();
                let names: Vec<&str> = keys.iter().map(|k| k.name()).collect();
                write!(
                    f,
                    "{TAG_SEQUENCE}|{}|{}|{}",
                    action.as_str(),
                    codes.join("+"),
                    names.join("+")
                )
            }
            LineMessage::Ping { epoch_millis } => write!(f, "{TAG_PING}|{epoch_millis}"),
        }
    }
}

/// A formatted line ready to hand to the transport.
///
/// Created once by the capture engine and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEvent(String);

impl OutgoingEvent {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutgoingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<LineMessage> for OutgoingEvent {
    fn from(msg: LineMessage) -> Self {
        msg.to_event()
    }
}

/// Milliseconds since the Unix epoch, or 0 if the clock is before 1970.
pub fn current_epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
