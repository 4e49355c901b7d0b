//! inputlink-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does inputlink-client do?
//!
//! It watches the local keyboard and mouse and forwards what the user does to
//! a remote listener as plain text lines:
//!
//! 1. Once per tick it polls the held state of every tracked key and button.
//! 2. The core engine turns the samples into `KEY`, `SEQ` and `MOUSE_BUTTON`
//!    lines, modifiers first.
//! 3. Each line is written to a TCP stream that is health-checked in the
//!    background and re-established when it drops.
//!
//! Nothing is ever injected; the client only observes.
//!
//! The library does not poll any OS input API itself.  Embedders provide an
//! [`InputSource`](infrastructure::input_capture::InputSource) for their
//! platform.  The bundled `inputlink-client` binary only drives a mock source
//! and serves as a harness for the link lifecycle.

/// Application layer: capture engine and link lifecycle.
pub mod application;

/// Infrastructure layer: input sources, network, storage.
pub mod infrastructure;
