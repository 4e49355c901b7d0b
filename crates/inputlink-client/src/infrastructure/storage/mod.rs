//! Persistent storage for the capture client.

pub mod config;
