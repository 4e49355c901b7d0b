//! LineTransport: one outbound TCP stream carrying newline-terminated lines.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──socket ok + PING ok──► Connected
//!      ▲                          │                                  │
//!      └──── socket/probe fail ───┘                        probe fails│
//!      ▲                                                             ▼
//!      └─────────────────────── teardown ◄────────────────────── Degraded
//! ```
//!
//! While Connected a background monitor writes a `PING|<millis>` line every
//! `health_interval`.  A write that fails marks the link Degraded and tears it
//! down.  `disconnect()`, a failed `send()`, and the monitor all funnel into
//! the same teardown routine, which is a no-op once the link is already down.
//!
//! # Locking
//!
//! Three async mutexes, none of them held across I/O on another:
//!
//! - `link`: state, generation and the cancel flag.  Only held for
//!   bookkeeping, so `state()` always answers promptly.
//! - `writer`: the write half.  A write holds it, bounded by
//!   `write_timeout`, and gives it up as soon as the cancel flag flips.
//! - `reader`: the read half, so a blocked `read_line()` does not stall
//!   senders.
//!
//! Teardown flips the cancel flag first, which wakes any in-flight read or
//! write, and only then takes the halves out of their slots and closes them.
//! A send therefore either finishes its write or fails, and never touches a
//! closed handle.
//!
//! Every established connection gets a new *generation* number.  The halves
//! and the background tasks carry the generation they belong to, and a
//! teardown only closes its own, so a late monitor, listener or teardown
//! cannot kill a newer connection.

use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use inputlink_core::LineMessage;

use crate::application::capture_engine::LineSink;
use crate::application::link_session::LinkControl;

/// Error type for connection establishment and line writes.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is already {0:?}")]
    Busy(ConnectionState),

    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("initial health probe to {addr} failed: {source}")]
    ProbeFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("connect to {addr} was cancelled by disconnect")]
    Cancelled { addr: String },

    #[error("link is not connected")]
    NotConnected,

    #[error("write stalled for {timeout:?}, peer is not reading")]
    WriteTimeout { timeout: Duration },

    #[error("write failed: {source}")]
    WriteFailed {
        #[source]
        source: io::Error,
    },
}

/// Observable link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// A health probe failed; teardown is in progress.
    Degraded,
}

/// Result of [`LineTransport::read_line`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One line with its terminator stripped.
    Line(String),
    /// The peer closed the stream, the read failed, or the link was torn down.
    EndOfStream,
}

/// Events produced by [`LineTransport::spawn_listener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    LineReceived(String),
    Closed,
}

/// Timing knobs for the transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on a single TCP connect attempt.
    pub connect_timeout: Duration,
    /// Period of the background liveness probe.
    pub health_interval: Duration,
    /// Upper bound on one line write.  A write that takes longer counts as
    /// failed and tears the link down.
    pub write_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            health_interval: Duration::from_secs(10),
            write_timeout: Duration::from_millis(500),
        }
    }
}

struct Link {
    state: ConnectionState,
    cancel: Option<watch::Sender<bool>>,
    generation: u64,
}

struct LineWriter {
    half: OwnedWriteHalf,
    cancel: watch::Receiver<bool>,
    generation: u64,
}

struct LineReader {
    lines: BufReader<OwnedReadHalf>,
    cancel: watch::Receiver<bool>,
    generation: u64,
}

/// A teardown that has flipped the state but not yet closed the halves.
struct TeardownTicket {
    before: ConnectionState,
    generation: u64,
}

struct Shared {
    config: TransportConfig,
    link: Mutex<Link>,
    writer: Mutex<Option<LineWriter>>,
    reader: Mutex<Option<LineReader>>,
}

/// Cloneable handle to one logical connection slot.
#[derive(Clone)]
pub struct LineTransport {
    shared: Arc<Shared>,
}

impl LineTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    cancel: None,
                    generation: 0,
                }),
                writer: Mutex::new(None),
                reader: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.link.lock().await.state
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Opens the stream and starts the health monitor.
    ///
    /// Returns `false` without touching the current link if it is not
    /// Disconnected, and `false` after cleaning up if the socket or the
    /// initial probe fails.
    pub async fn connect(&self, host: &str, port: u16) -> bool {
        match self.try_connect(host, port).await {
            Ok(()) => true,
            Err(TransportError::Busy(state)) => {
                debug!(?state, "connect refused, link busy");
                false
            }
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    async fn try_connect(&self, host: &str, port: u16) -> Result<(), TransportError> {
        let generation = {
            let mut link = self.shared.link.lock().await;
            if link.state != ConnectionState::Disconnected {
                return Err(TransportError::Busy(link.state));
            }
            link.state = ConnectionState::Connecting;
            link.generation
        };

        let addr = format!("{host}:{port}");
        let timeout = self.shared.config.connect_timeout;
        info!(%addr, "connecting");

        let stream = match time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.shared.abandon_connect(generation).await;
                return Err(TransportError::ConnectFailed { addr, source });
            }
            Err(_) => {
                self.shared.abandon_connect(generation).await;
                return Err(TransportError::ConnectTimeout { addr, timeout });
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle");
        }

        let (read_half, mut write_half) = stream.into_split();
        let probe = LineMessage::ping_now().to_string();
        let write_timeout = self.shared.config.write_timeout;
        let probed = time::timeout(write_timeout, write_line(&mut write_half, &probe))
            .await
            .unwrap_or_else(|_| {
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("probe write stalled for {write_timeout:?}"),
                ))
            });
        if let Err(source) = probed {
            self.shared.abandon_connect(generation).await;
            return Err(TransportError::ProbeFailed { addr, source });
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        {
            // Lock order: link, then reader, then writer.
            let mut link = self.shared.link.lock().await;
            if link.generation != generation || link.state != ConnectionState::Connecting {
                return Err(TransportError::Cancelled { addr });
            }
            *self.shared.reader.lock().await = Some(LineReader {
                lines: BufReader::new(read_half),
                cancel: cancel_rx.clone(),
                generation,
            });
            *self.shared.writer.lock().await = Some(LineWriter {
                half: write_half,
                cancel: cancel_rx.clone(),
                generation,
            });
            link.cancel = Some(cancel_tx);
            link.state = ConnectionState::Connected;
        }
        info!(%addr, from = ?ConnectionState::Connecting, to = ?ConnectionState::Connected, "connected");

        tokio::spawn(health_monitor(
            Arc::downgrade(&self.shared),
            cancel_rx,
            generation,
        ));
        Ok(())
    }

    /// Closes the link.  Calling it while already disconnected does nothing.
    ///
    /// A write or read in flight on the link is cancelled rather than waited for.
    pub async fn disconnect(&self) {
        if !self.shared.teardown(None).await {
            debug!("disconnect requested, already disconnected");
        }
    }

    /// Writes `line` plus `\n`.  Returns `false` when not connected or when
    /// the write fails or stalls past `write_timeout` (which also tears the
    /// link down).
    pub async fn send(&self, line: &str) -> bool {
        let generation = {
            let link = self.shared.link.lock().await;
            if link.state != ConnectionState::Connected {
                debug!(line, state = ?link.state, "send skipped, not connected");
                return false;
            }
            link.generation
        };

        match self.shared.write_on(generation, line).await {
            Ok(()) => true,
            Err(TransportError::NotConnected) => {
                debug!(line, "send skipped, link torn down");
                false
            }
            Err(e) => {
                error!(error = %e, line, "send failed, disconnecting");
                self.shared.teardown(Some(generation)).await;
                false
            }
        }
    }

    /// Waits for one line from the peer.
    ///
    /// Returns [`ReadOutcome::EndOfStream`] when not connected, when the peer
    /// closes the stream, and when a teardown happens mid-read.
    pub async fn read_line(&self) -> ReadOutcome {
        let mut guard = self.shared.reader.lock().await;
        let Some(LineReader { lines, cancel, .. }) = guard.as_mut() else {
            return ReadOutcome::EndOfStream;
        };
        if *cancel.borrow() {
            return ReadOutcome::EndOfStream;
        }

        let mut buf = String::new();
        let read = tokio::select! {
            read = lines.read_line(&mut buf) => Some(read),
            _ = cancel.changed() => None,
        };

        match read {
            Some(Ok(0)) => {
                debug!("peer closed the stream");
                ReadOutcome::EndOfStream
            }
            Some(Ok(_)) => {
                let len = buf.trim_end_matches(['\r', '\n']).len();
                buf.truncate(len);
                ReadOutcome::Line(buf)
            }
            Some(Err(e)) => {
                warn!(error = %e, "read failed");
                ReadOutcome::EndOfStream
            }
            None => ReadOutcome::EndOfStream,
        }
    }

    /// Spawns a task forwarding every received line to `events`.
    ///
    /// On end of stream the task tears down the connection it was started
    /// for, sends [`TransportEvent::Closed`], and exits.
    pub fn spawn_listener(&self, events: mpsc::Sender<TransportEvent>) -> JoinHandle<()> {
        let transport = self.clone();
        tokio::spawn(async move {
            let generation = transport.shared.link.lock().await.generation;
            loop {
                match transport.read_line().await {
                    ReadOutcome::Line(line) => {
                        debug!(%line, "received");
                        if events.send(TransportEvent::LineReceived(line)).await.is_err() {
                            break;
                        }
                    }
                    ReadOutcome::EndOfStream => {
                        if transport.shared.teardown(Some(generation)).await {
                            info!("peer closed the connection");
                        }
                        let _ = events.send(TransportEvent::Closed).await;
                        break;
                    }
                }
            }
        })
    }
}

impl Shared {
    /// Rolls a failed connect back to Disconnected unless a disconnect already did.
    async fn abandon_connect(&self, generation: u64) {
        let mut link = self.link.lock().await;
        if link.generation == generation && link.state == ConnectionState::Connecting {
            link.state = ConnectionState::Disconnected;
        }
    }

    /// Writes one line on the writer of `generation`.
    ///
    /// Gives up with [`TransportError::WriteTimeout`] after `write_timeout`,
    /// and with [`TransportError::NotConnected`] if that connection is gone or
    /// is torn down while the write is in flight.
    async fn write_on(&self, generation: u64, line: &str) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let Some(LineWriter { half, cancel, .. }) =
            guard.as_mut().filter(|w| w.generation == generation)
        else {
            return Err(TransportError::NotConnected);
        };
        if *cancel.borrow() {
            return Err(TransportError::NotConnected);
        }

        let timeout = self.config.write_timeout;
        tokio::select! {
            written = time::timeout(timeout, write_line(half, line)) => match written {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(TransportError::WriteFailed { source }),
                Err(_) => Err(TransportError::WriteTimeout { timeout }),
            },
            _ = cancel.changed() => Err(TransportError::NotConnected),
        }
    }

    /// Closes the read side, then the write side, then lets the socket drop.
    ///
    /// With `Some(generation)` only that connection is torn down.  Returns
    /// `true` if this call performed the teardown.
    async fn teardown(&self, only: Option<u64>) -> bool {
        match self.begin_teardown(only).await {
            Some(ticket) => {
                self.close_halves(ticket).await;
                true
            }
            None => false,
        }
    }

    /// Marks the link Disconnected and flips its cancel flag, which wakes a
    /// blocked read or a stalled write so their slots free up.
    async fn begin_teardown(&self, only: Option<u64>) -> Option<TeardownTicket> {
        let (ticket, cancel) = {
            let mut link = self.link.lock().await;
            if only.is_some_and(|g| g != link.generation) {
                return None;
            }
            if link.state == ConnectionState::Disconnected {
                return None;
            }
            let ticket = TeardownTicket {
                before: link.state,
                generation: link.generation,
            };
            link.state = ConnectionState::Disconnected;
            link.generation = link.generation.wrapping_add(1);
            (ticket, link.cancel.take())
        };

        if let Some(cancel) = cancel {
            cancel.send_replace(true);
        }
        Some(ticket)
    }

    /// Takes the halves of the ticket's generation out of their slots and
    /// closes them.  Halves of a newer connection are left alone.
    async fn close_halves(&self, ticket: TeardownTicket) {
        let generation = ticket.generation;

        let reader = {
            let mut slot = self.reader.lock().await;
            if slot.as_ref().is_some_and(|r| r.generation == generation) {
                slot.take()
            } else {
                None
            }
        };
        if reader.is_some() {
            drop(reader);
            debug!("read side closed");
        }

        let writer = {
            let mut slot = self.writer.lock().await;
            if slot.as_ref().is_some_and(|w| w.generation == generation) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(mut writer) = writer {
            match writer.half.shutdown().await {
                Ok(()) => debug!("write side closed"),
                Err(e) => warn!(error = %e, "error closing write side"),
            }
        }

        info!(from = ?ticket.before, to = ?ConnectionState::Disconnected, "disconnected");
    }

    /// Writes one probe on the current connection.  Returns `false` when the
    /// monitor should stop.
    async fn probe(&self, generation: u64) -> bool {
        {
            let link = self.link.lock().await;
            if link.generation != generation || link.state != ConnectionState::Connected {
                return false;
            }
        }

        let ping = LineMessage::ping_now().to_string();
        match self.write_on(generation, &ping).await {
            Ok(()) => {
                debug!("health probe ok");
                true
            }
            Err(TransportError::NotConnected) => false,
            Err(e) => {
                {
                    let mut link = self.link.lock().await;
                    if link.generation != generation || link.state != ConnectionState::Connected {
                        return false;
                    }
                    link.state = ConnectionState::Degraded;
                }
                warn!(
                    error = %e,
                    from = ?ConnectionState::Connected,
                    to = ?ConnectionState::Degraded,
                    "health probe failed"
                );
                self.teardown(Some(generation)).await;
                false
            }
        }
    }
}

async fn health_monitor(shared: Weak<Shared>, mut cancel: watch::Receiver<bool>, generation: u64) {
    let Some(interval) = shared.upgrade().map(|s| s.config.health_interval) else {
        return;
    };
    debug!(?interval, generation, "health monitor started");

    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.changed() => break,
        }
        let Some(strong) = shared.upgrade() else {
            break;
        };
        if !strong.probe(generation).await {
            break;
        }
    }

    debug!(generation, "health monitor stopped");
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> io::Result<()> {
    let mut framed = String::with_capacity(line.len() + 1);
    framed.push_str(line);
    framed.push('\n');
    writer.write_all(framed.as_bytes()).await?;
    writer.flush().await
}

#[async_trait]
impl LineSink for LineTransport {
    async fn send_line(&self, line: &str) -> bool {
        self.send(line).await
    }
}

#[async_trait]
impl LinkControl for LineTransport {
    async fn connect(&self, host: &str, port: u16) -> bool {
        LineTransport::connect(self, host, port).await
    }

    async fn disconnect(&self) {
        LineTransport::disconnect(self).await
    }

    async fn is_connected(&self) -> bool {
        LineTransport::is_connected(self).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    use super::*;

    fn quiet_config() -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(2),
            health_interval: Duration::from_secs(60),
            write_timeout: Duration::from_secs(2),
        }
    }

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    async fn wait_for_state(transport: &LineTransport, want: ConnectionState, within: Duration) {
        time::timeout(within, async {
            while transport.state().await != want {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("state not reached in time");
    }

    #[test]
    fn test_default_config_matches_link_defaults() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.connect_timeout, Duration::from_secs(3));
        assert_eq!(cfg.health_interval, Duration::from_secs(10));
        assert_eq!(cfg.write_timeout, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_send_while_disconnected_returns_false() {
        // Arrange
        let transport = LineTransport::new(quiet_config());

        // Act
        let sent = transport.send("KEY|PRESS|65|key.keyboard.a").await;

        // Assert
        assert!(!sent);
        assert_eq!(transport.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_sends_probe_then_lines() {
        // Arrange
        let (listener, port) = listener().await;
        let transport = LineTransport::new(quiet_config());

        // Act
        let connected = transport.connect("127.0.0.1", port).await;
        let sent = transport.send("MOUSE_BUTTON|LEFT|PRESS").await;
        let (peer, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(peer).lines();

        // Assert
        assert!(connected);
        assert!(sent);
        assert!(transport.is_connected().await);
        let probe = lines.next_line().await.unwrap().unwrap();
        assert!(probe.starts_with("PING|"), "{probe}");
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("MOUSE_BUTTON|LEFT|PRESS")
        );
    }

    #[tokio::test]
    async fn test_connect_while_connected_is_refused() {
        let (_listener, port) = listener().await;
        let transport = LineTransport::new(quiet_config());
        assert!(transport.connect("127.0.0.1", port).await);

        let again = transport.connect("127.0.0.1", port).await;

        assert!(!again);
        assert_eq!(transport.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails_cleanly() {
        // Arrange – bind then drop to get a port nobody listens on
        let (listener, port) = listener().await;
        drop(listener);
        let transport = LineTransport::new(quiet_config());

        // Act
        let connected = transport.connect("127.0.0.1", port).await;

        // Assert
        assert!(!connected);
        assert_eq!(transport.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        // Arrange
        let (_listener, port) = listener().await;
        let transport = LineTransport::new(quiet_config());
        assert!(transport.connect("127.0.0.1", port).await);

        // Act
        transport.disconnect().await;
        transport.disconnect().await;

        // Assert
        assert_eq!(transport.state().await, ConnectionState::Disconnected);
        assert!(!transport.send("PING|1").await);
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let (listener, port) = listener().await;
        let transport = LineTransport::new(quiet_config());
        assert!(transport.connect("127.0.0.1", port).await);
        let _first = listener.accept().await.unwrap();
        transport.disconnect().await;

        let reconnected = transport.connect("127.0.0.1", port).await;

        assert!(reconnected);
        assert!(transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_health_probe_failure_disconnects_within_a_few_intervals() {
        // Arrange
        let (listener, port) = listener().await;
        let interval = Duration::from_millis(100);
        let transport = LineTransport::new(TransportConfig {
            health_interval: interval,
            ..quiet_config()
        });
        assert!(transport.connect("127.0.0.1", port).await);

        // Act – the peer goes away without a word
        let (peer, _) = listener.accept().await.unwrap();
        drop(peer);
        drop(listener);

        // Assert – detected by the first or second probe after the reset
        wait_for_state(&transport, ConnectionState::Disconnected, interval * 4).await;
        assert!(!transport.send("KEY|PRESS|65|key.keyboard.a").await);
    }

    #[tokio::test]
    async fn test_read_line_returns_lines_then_end_of_stream() {
        // Arrange
        let (listener, port) = listener().await;
        let transport = LineTransport::new(quiet_config());
        assert!(transport.connect("127.0.0.1", port).await);
        let (mut peer, _) = listener.accept().await.unwrap();

        // Act
        peer.write_all(b"hello\r\nworld\n").await.unwrap();
        peer.shutdown().await.unwrap();

        // Assert
        assert_eq!(transport.read_line().await, ReadOutcome::Line("hello".into()));
        assert_eq!(transport.read_line().await, ReadOutcome::Line("world".into()));
        assert_eq!(transport.read_line().await, ReadOutcome::EndOfStream);
    }

    #[tokio::test]
    async fn test_disconnect_cancels_blocked_read() {
        // Arrange
        let (listener, port) = listener().await;
        let transport = LineTransport::new(quiet_config());
        assert!(transport.connect("127.0.0.1", port).await);
        let _peer = listener.accept().await.unwrap();
        let reader = transport.clone();
        let pending = tokio::spawn(async move { reader.read_line().await });
        time::sleep(Duration::from_millis(50)).await;

        // Act
        transport.disconnect().await;

        // Assert
        let outcome = time::timeout(Duration::from_secs(2), pending)
            .await
            .expect("read was not cancelled")
            .unwrap();
        assert_eq!(outcome, ReadOutcome::EndOfStream);
    }

    #[tokio::test]
    async fn test_read_line_while_disconnected_is_end_of_stream() {
        let transport = LineTransport::new(quiet_config());
        assert_eq!(transport.read_line().await, ReadOutcome::EndOfStream);
    }

    #[tokio::test]
    async fn test_listener_forwards_lines_and_disconnects_on_close() {
        // Arrange
        let (listener, port) = listener().await;
        let transport = LineTransport::new(quiet_config());
        assert!(transport.connect("127.0.0.1", port).await);
        let (peer, _) = listener.accept().await.unwrap();
        let mut peer = BufReader::new(peer);
        let mut probe = String::new();
        peer.read_line(&mut probe).await.unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = transport.spawn_listener(tx);

        // Act – the probe was consumed, so dropping the peer sends a clean FIN
        peer.write_all(b"TOGGLE|ON\n").await.unwrap();
        drop(peer);

        // Assert
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::LineReceived("TOGGLE|ON".into()))
        );
        assert_eq!(rx.recv().await, Some(TransportEvent::Closed));
        handle.await.unwrap();
        assert_eq!(transport.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peer_that_stops_reading_fails_send_within_write_timeout() {
        // Arrange – the peer accepts and then never reads
        let (listener, port) = listener().await;
        let write_timeout = Duration::from_millis(200);
        let transport = LineTransport::new(TransportConfig {
            write_timeout,
            ..quiet_config()
        });
        assert!(transport.connect("127.0.0.1", port).await);
        let (_peer, _) = listener.accept().await.unwrap();
        let line = "X".repeat(64 * 1024);

        // Act – keep writing until the socket buffers are full
        let mut refused = false;
        for _ in 0..4096 {
            let bound = write_timeout + Duration::from_secs(1);
            let sent = time::timeout(bound, transport.send(&line))
                .await
                .expect("send outlived its write timeout");
            if !sent {
                refused = true;
                break;
            }
        }

        // Assert
        assert!(refused, "buffers never filled");
        assert_eq!(transport.state().await, ConnectionState::Disconnected);
        assert!(!transport.send("KEY|PRESS|65|key.keyboard.a").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disconnect_cancels_stalled_write() {
        // Arrange – a write timeout long enough that only disconnect can end the stall
        let (listener, port) = listener().await;
        let transport = LineTransport::new(TransportConfig {
            write_timeout: Duration::from_secs(60),
            ..quiet_config()
        });
        assert!(transport.connect("127.0.0.1", port).await);
        let (_peer, _) = listener.accept().await.unwrap();
        let sender = transport.clone();
        let flood = tokio::spawn(async move {
            let line = "X".repeat(64 * 1024);
            let mut sent = 0usize;
            while sender.send(&line).await {
                sent += 1;
            }
            sent
        });
        time::sleep(Duration::from_millis(500)).await;

        // Act
        let state = time::timeout(Duration::from_millis(100), transport.state())
            .await
            .expect("state() blocked behind the stalled write");
        let stalled = !flood.is_finished();
        time::timeout(Duration::from_secs(1), transport.disconnect())
            .await
            .expect("disconnect blocked behind the stalled write");

        // Assert
        assert_eq!(state, ConnectionState::Connected);
        assert!(stalled);
        time::timeout(Duration::from_secs(1), flood)
            .await
            .expect("stalled send was not cancelled")
            .unwrap();
        assert_eq!(transport.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_racing_teardown_all_return() {
        // Arrange
        let (listener, port) = listener().await;
        let transport = LineTransport::new(quiet_config());
        assert!(transport.connect("127.0.0.1", port).await);
        let (peer, _) = listener.accept().await.unwrap();
        let drain = tokio::spawn(async move {
            let mut lines = BufReader::new(peer).lines();
            let mut received = 0usize;
            while let Ok(Some(_)) = lines.next_line().await {
                received += 1;
            }
            received
        });

        let mut senders = Vec::new();
        for task in 0..16 {
            let transport = transport.clone();
            senders.push(tokio::spawn(async move {
                let mut accepted = 0usize;
                for i in 0..100 {
                    if transport.send(&format!("KEY|PRESS|{task}|{i}")).await {
                        accepted += 1;
                    }
                }
                accepted
            }));
        }
        time::sleep(Duration::from_millis(5)).await;

        // Act – two teardowns race each other and the senders
        let (first, second) = tokio::join!(
            transport.shared.teardown(None),
            transport.shared.teardown(None)
        );
        let mut accepted = 0;
        for sender in senders {
            accepted += time::timeout(Duration::from_secs(2), sender)
                .await
                .expect("send did not return")
                .expect("send panicked");
        }

        // Assert
        assert!(first ^ second, "exactly one teardown must do the work");
        assert_eq!(transport.state().await, ConnectionState::Disconnected);
        assert!(!transport.send("KEY|PRESS|65|key.keyboard.a").await);
        let received = time::timeout(Duration::from_secs(2), drain)
            .await
            .expect("peer never saw end of stream")
            .unwrap();
        assert!(received > accepted, "probe plus {accepted} lines, got {received}");
    }

    #[tokio::test]
    async fn test_stale_teardown_leaves_newer_connection_readable() {
        // Arrange
        let (listener, port) = listener().await;
        let transport = LineTransport::new(quiet_config());
        assert!(transport.connect("127.0.0.1", port).await);
        let (_first, _) = listener.accept().await.unwrap();

        // Act – a reconnect completes between the two phases of a teardown
        let ticket = transport.shared.begin_teardown(None).await.unwrap();
        assert!(transport.connect("127.0.0.1", port).await);
        let (mut peer, _) = listener.accept().await.unwrap();
        transport.shared.close_halves(ticket).await;
        peer.write_all(b"STILL|HERE\n").await.unwrap();

        // Assert
        assert!(transport.is_connected().await);
        assert_eq!(
            transport.read_line().await,
            ReadOutcome::Line("STILL|HERE".into())
        );
        assert!(transport.send("KEY|PRESS|65|key.keyboard.a").await);
    }

    #[tokio::test]
    async fn test_teardown_for_old_generation_is_a_no_op() {
        let (listener, port) = listener().await;
        let transport = LineTransport::new(quiet_config());
        assert!(transport.connect("127.0.0.1", port).await);
        let (_first, _) = listener.accept().await.unwrap();
        let stale = transport.shared.link.lock().await.generation;
        transport.disconnect().await;
        assert!(transport.connect("127.0.0.1", port).await);

        let torn = transport.shared.teardown(Some(stale)).await;

        assert!(!torn);
        assert!(transport.is_connected().await);
    }
}
