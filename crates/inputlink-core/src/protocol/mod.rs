//! Protocol module containing the line message types and the line parser.

pub mod codec;
pub mod messages;

pub use codec::{decode_line, ProtocolError};
pub use messages::*;
