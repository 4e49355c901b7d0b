//! Infrastructure layer: input polling, TCP transport and config storage.

/// Input state polling (`InputSource`) and the scriptable mock source.
pub mod input_capture;

/// Line-oriented TCP transport with health monitoring.
pub mod network;

/// TOML configuration persistence.
pub mod storage;
