//! Application layer: use cases for the capture client.

/// Per-tick capture pipeline and the `LineSink` seam.
pub mod capture_engine;

/// Transport lifecycle tied to the primary connection.
pub mod link_session;
