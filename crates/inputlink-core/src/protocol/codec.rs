//! Parser for InputLink protocol lines.
//!
//! The capture side only ever formats lines (see [`LineMessage`]'s `Display`
//! impl).  Receivers, the debugging listener, and tests use [`decode_line`] to
//! turn a line back into a typed message.  A trailing `\n` or `\r\n` is
//! tolerated.

use thiserror::Error;

use crate::domain::mouse::MouseButton;
use crate::keymap::KeyCode;
use crate::protocol::messages::{
    KeyAction, LineMessage, SeqAction, FIELD_SEPARATOR, MEMBER_SEPARATOR, TAG_KEY,
    TAG_MOUSE_BUTTON, TAG_PING, TAG_SEQUENCE,
};

/// Errors that can occur while parsing a protocol line.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The line was empty after stripping the terminator.
    #[error("empty line")]
    Empty,

    /// The leading tag is not a known message type.
    #[error("unknown message tag: {0:?}")]
    UnknownTag(String),

    /// The line has the wrong number of `|`-separated fields for its tag.
    #[error("{tag} expects {expected} fields, got {actual}")]
    FieldCount {
        tag: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An action field was not one of the values allowed for the tag.
    #[error("invalid action {0:?}")]
    InvalidAction(String),

    /// A mouse button label was not recognised.
    #[error("invalid mouse button {0:?}")]
    InvalidButton(String),

    /// A numeric field could not be parsed or names an untracked key.
    #[error("invalid key code {0:?}")]
    InvalidKeyCode(String),

    /// A sequence's code list and name list disagree.
    #[error("sequence codes and names do not match")]
    SequenceMismatch,

    /// The ping timestamp was not an unsigned integer.
    #[error("invalid ping timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// Parses one protocol line into a [`LineMessage`].
///
/// # Errors
///
/// Returns a [`ProtocolError`] describing the first problem found.
///
/// # Examples
///
/// ```rust
/// use inputlink_core::protocol::codec::decode_line;
/// use inputlink_core::protocol::messages::{KeyAction, LineMessage};
/// use inputlink_core::KeyCode;
///
/// let msg = decode_line("KEY|PRESS|75|key.keyboard.k\n").unwrap();
/// assert_eq!(msg, LineMessage::Key { action: KeyAction::Press, key: KeyCode::K });
/// ```
pub fn decode_line(line: &str) -> Result<LineMessage, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }

    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    match fields[0] {
        TAG_KEY => {
            expect_fields(TAG_KEY, &fields, 4)?;
            let key = parse_key(fields[2])?;
            if key.name() != fields[3] {
                return Err(ProtocolError::InvalidKeyCode(fields[2].to_string()));
            }
            Ok(LineMessage::Key {
                action: parse_key_action(fields[1])?,
                key,
            })
        }
        TAG_MOUSE_BUTTON => {
            expect_fields(TAG_MOUSE_BUTTON, &fields, 3)?;
            let button = MouseButton::from_label(fields[1])
                .ok_or_else(|| ProtocolError::InvalidButton(fields[1].to_string()))?;
            Ok(LineMessage::MouseButton {
                button,
                action: parse_key_action(fields[2])?,
            })
        }
        TAG_SEQUENCE => {
            expect_fields(TAG_SEQUENCE, &fields, 4)?;
            let action = match fields[1] {
                "PRESS" => SeqAction::Press,
                "RELEASE" => SeqAction::Release,
                "RESTORE" => SeqAction::Restore,
                other => return Err(ProtocolError::InvalidAction(other.to_string())),
            };
            let keys = fields[2]
                .split(MEMBER_SEPARATOR)
                .map(parse_key)
                .collect::<Result<Vec<_>, _>>()?;
            let names: Vec<&str> = fields[3].split(MEMBER_SEPARATOR).collect();
            if names.len() != keys.len() || keys.iter().zip(&names).any(|(k, n)| k.name() != *n) {
                return Err(ProtocolError::SequenceMismatch);
            }
            Ok(LineMessage::Sequence { action, keys })
        }
        TAG_PING => {
            expect_fields(TAG_PING, &fields, 2)?;
            let epoch_millis = fields[1]
                .parse()
                .map_err(|_| ProtocolError::InvalidTimestamp(fields[1].to_string()))?;
            Ok(LineMessage::Ping { epoch_millis })
        }
        other => Err(ProtocolError::UnknownTag(other.to_string())),
    }
}

fn expect_fields(tag: &'static str, fields: &[&str], expected: usize) -> Result<(), ProtocolError> {
    if fields.len() == expected {
        Ok(())
    } else {
        Err(ProtocolError::FieldCount {
            tag,
            expected,
            actual: fields.len(),
        })
    }
}

fn parse_key_action(s: &str) -> Result<KeyAction, ProtocolError> {
    match s {
        "PRESS" => Ok(KeyAction::Press),
        "RELEASE" => Ok(KeyAction::Release),
        other => Err(ProtocolError::InvalidAction(other.to_string())),
    }
}

fn parse_key(s: &str) -> Result<KeyCode, ProtocolError> {
    s.parse::<i32>()
        .ok()
        .and_then(KeyCode::from_code)
        .ok_or_else(|| ProtocolError::InvalidKeyCode(s.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
