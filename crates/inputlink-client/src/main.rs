//! InputLink capture client entry point.
//!
//! ```text
//! inputlink-client [PEER_ADDRESS]
//! ```
//!
//! `PEER_ADDRESS` stands in for the primary connection's peer address
//! (`1.2.3.4:25565`, `name/1.2.3.4:25565`, ...).  Without it `link.host` from
//! the config file is used.
//!
//! # Harness only
//!
//! The binary ships without a platform polling backend.  It samples a
//! [`MockInputSource`] that nobody presses, so it exercises the connect,
//! health, watchdog and shutdown paths against a real receiver but never
//! forwards a keystroke.  Real capture comes from embedding the library with
//! an [`InputSource`] implementation for the host platform.
//!
//! [`MockInputSource`]: inputlink_client::infrastructure::input_capture::mock::MockInputSource
//! [`InputSource`]: inputlink_client::infrastructure::input_capture::InputSource
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config, init tracing
//!  └─ LinkSession::on_primary_connected()   -- connect with retries, start capture
//!  └─ select! loop
//!       ├─ tick interval      -> LinkSession::tick()
//!       ├─ watchdog interval  -> LinkSession::watchdog(), respawn listener
//!       ├─ listener events    -> log received lines / closures
//!       └─ Ctrl-C             -> LinkSession::on_primary_disconnected()
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use inputlink_client::application::capture_engine::CaptureEngine;
use inputlink_client::application::link_session::{LinkSession, SessionError};
use inputlink_client::infrastructure::input_capture::mock::MockInputSource;
use inputlink_client::infrastructure::network::{LineTransport, TransportEvent};
use inputlink_client::infrastructure::storage::config::{self, AppConfig, ConfigError};

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match config::load_config() {
        Ok(cfg) => cfg,
        Err(ConfigError::NoPlatformConfigDir) => AppConfig::default(),
        Err(e) => return Err(e).context("failed to load configuration"),
    };

    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.capture.log_level)),
        )
        .init();

    info!("InputLink client starting");

    let Some(peer) = std::env::args().nth(1).or_else(|| config.link.host.clone()) else {
        bail!("no receiver address: pass PEER_ADDRESS or set link.host in the config file");
    };

    let transport = LineTransport::new(config.link.transport_config());

    // Headless build: no platform polling backend, so nothing is ever held.
    warn!("no platform input backend in this build; running as a link harness");
    let source = MockInputSource::new();
    let engine = CaptureEngine::new(
        source,
        Arc::new(transport.clone()),
        config.capture.settle_ticks,
    );
    let mut session = LinkSession::new(
        engine,
        Arc::new(transport.clone()),
        config.session_settings(),
    );

    let (events_tx, mut events_rx) = mpsc::channel(64);
    match session.on_primary_connected(&peer).await {
        Ok(()) => {
            transport.spawn_listener(events_tx.clone());
        }
        Err(e @ SessionError::NoHost(_)) => return Err(e.into()),
        Err(e) => warn!("{e}; the watchdog keeps retrying"),
    }

    let mut ticks = time::interval(config.capture.tick_interval());
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut watchdog = time::interval(WATCHDOG_INTERVAL);
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("InputLink client ready.  Press Ctrl-C to exit.");

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                let stats = session.tick().await;
                if stats.emitted() > 0 {
                    debug!(sent = stats.sent, dropped = stats.dropped, "tick");
                }
            }
            // Ticks are skipped while a reconnect attempt is in flight.
            _ = watchdog.tick() => {
                if session.watchdog().await {
                    transport.spawn_listener(events_tx.clone());
                }
            }
            Some(event) = events_rx.recv() => match event {
                TransportEvent::LineReceived(line) => debug!(%line, "line from receiver"),
                TransportEvent::Closed => info!("receiver closed the line stream"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    session.on_primary_disconnected().await;
    info!("InputLink client stopped");
    Ok(())
}
