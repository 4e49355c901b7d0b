//! LinkSession: ties the line transport and capture to the primary connection.
//!
//! The embedding application already holds a *primary* connection to the
//! receiving machine (a game server session, an SSH tunnel, ...).  The line
//! stream goes to the same host:
//!
//! - primary connection up   → derive host, connect with bounded retries,
//!   start capture
//! - primary connection down → stop capture (full reset), disconnect
//! - periodic watchdog       → if the primary is up but the line stream is
//!   not, try one reconnect
//!
//! Retries live here rather than in the transport, which only ever makes a
//! single attempt per `connect()`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::capture_engine::{CaptureEngine, TickStats};
use crate::infrastructure::input_capture::InputSource;
use crate::infrastructure::network::DEFAULT_PORT;

/// Error type for session lifecycle operations.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("no usable host in peer address {0:?}")]
    NoHost(String),

    #[error("could not connect to {host}:{port} after {attempts} attempt(s)")]
    RetriesExhausted {
        host: String,
        port: u16,
        attempts: u32,
    },
}

/// Connection control the session needs from a transport.
#[async_trait]
pub trait LinkControl: Send + Sync {
    /// Makes one connection attempt.
    async fn connect(&self, host: &str, port: u16) -> bool;
    async fn disconnect(&self);
    async fn is_connected(&self) -> bool;
}

/// Session tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Used instead of the primary connection's host when set.
    pub host_override: Option<String>,
    pub port: u16,
    pub connect_attempts: u32,
    pub retry_backoff: Duration,
    pub start_capture_on_connect: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            host_override: None,
            port: DEFAULT_PORT,
            connect_attempts: 3,
            retry_backoff: Duration::from_secs(1),
            start_capture_on_connect: true,
        }
    }
}

/// Extracts the host part of a peer address.
///
/// Accepts `1.2.3.4:25565`, `name/1.2.3.4:25565`, `[::1]:25565`,
/// `example.com:25565` and bare hosts.  Returns `None` for empty input.
pub fn peer_host(address: &str) -> Option<String> {
    let trimmed = address.trim();
    let addr = trimmed.rsplit_once('/').map_or(trimmed, |(_, a)| a);

    if let Ok(sock) = addr.parse::<SocketAddr>() {
        return Some(sock.ip().to_string());
    }
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return Some(ip.to_string());
    }

    let host = match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => addr,
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() || host.contains(char::is_whitespace) {
        None
    } else {
        Some(host.to_string())
    }
}

pub struct LinkSession<S> {
    engine: CaptureEngine<S>,
    link: Arc<dyn LinkControl>,
    settings: SessionSettings,
    host: Option<String>,
}

impl<S: InputSource> LinkSession<S> {
    pub fn new(
        engine: CaptureEngine<S>,
        link: Arc<dyn LinkControl>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            engine,
            link,
            settings,
            host: None,
        }
    }

    /// Connects the line stream to the primary connection's host.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoHost`] if no host can be derived and none is
    /// configured, [`SessionError::RetriesExhausted`] if every attempt failed.
    pub async fn on_primary_connected(&mut self, peer_address: &str) -> Result<(), SessionError> {
        let host = match &self.settings.host_override {
            Some(host) => host.clone(),
            None => peer_host(peer_address)
                .ok_or_else(|| SessionError::NoHost(peer_address.to_string()))?,
        };
        info!(%host, port = self.settings.port, "primary connection up");
        self.host = Some(host.clone());

        if !self.link.is_connected().await && !self.connect_with_retry(&host).await {
            return Err(SessionError::RetriesExhausted {
                host,
                port: self.settings.port,
                attempts: self.settings.connect_attempts,
            });
        }

        if self.settings.start_capture_on_connect {
            self.engine.start();
        }
        Ok(())
    }

    /// Stops capture, then closes the line stream.
    pub async fn on_primary_disconnected(&mut self) {
        info!("primary connection down");
        self.host = None;
        self.engine.stop();
        self.link.disconnect().await;
    }

    /// Makes one reconnect attempt if the primary is up but the link is not.
    /// Returns `true` if a reconnect succeeded.
    pub async fn watchdog(&mut self) -> bool {
        let Some(host) = self.host.as_deref() else {
            return false;
        };
        if self.link.is_connected().await {
            return false;
        }

        warn!(%host, "line stream is down, reconnecting");
        let restored = self.link.connect(host, self.settings.port).await;
        if restored {
            info!(%host, "line stream restored");
        }
        restored
    }

    /// Flips capture on or off and returns the new state.
    pub fn toggle_capture(&mut self) -> bool {
        let capturing = self.engine.toggle();
        info!(capturing, "capture toggled");
        capturing
    }

    pub async fn tick(&mut self) -> TickStats {
        self.engine.tick().await
    }

    pub fn engine(&self) -> &CaptureEngine<S> {
        &self.engine
    }

    /// Host the link is bound to while the primary connection is up.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    async fn connect_with_retry(&self, host: &str) -> bool {
        let attempts = self.settings.connect_attempts.max(1);
        for attempt in 1..=attempts {
            info!(attempt, attempts, %host, "connecting line stream");
            if self.link.connect(host, self.settings.port).await {
                return true;
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_backoff).await;
            }
        }
        warn!(%host, attempts, "giving up on line stream");
        false
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
