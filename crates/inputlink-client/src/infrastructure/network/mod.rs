//! Network adapters for the capture client.

pub mod line_transport;

pub use line_transport::{
    ConnectionState, LineTransport, ReadOutcome, TransportConfig, TransportError, TransportEvent,
};

/// Port the receiving side listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 9009;
