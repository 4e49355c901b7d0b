//! TOML-based configuration persistence for the capture client.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\InputLink\config.toml`
//! - Linux:    `~/.config/inputlink/config.toml`
//! - macOS:    `~/Library/Application Support/InputLink/config.toml`
//!
//! ```toml
//! [capture]
//! tick_interval_ms = 50
//! settle_ticks = 3
//! start_on_connect = true
//! log_level = "info"
//!
//! [link]
//! host = "192.168.1.20"   # optional; normally taken from the primary connection
//! port = 9009
//! connect_timeout_ms = 3000
//! health_interval_secs = 10
//! write_timeout_ms = 500
//! connect_attempts = 3
//! retry_backoff_ms = 1000
//! ```
//!
//! Every field has a `#[serde(default = ...)]`, so a missing file, a missing
//! section, or a missing key all fall back to the values above.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::link_session::SessionSettings;
use crate::infrastructure::network::{TransportConfig, DEFAULT_PORT};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but cannot be used.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub link: LinkConfig,
}

/// Sampling and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Milliseconds between two sampling ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Ticks a modifier press holds key lines back.
    #[serde(default = "default_settle_ticks")]
    pub settle_ticks: u32,
    /// Start capturing as soon as the link comes up.
    #[serde(default = "default_true")]
    pub start_on_connect: bool,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Connection settings for the line transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkConfig {
    /// Fixed receiver host.  When absent the host of the primary connection is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
    /// Upper bound on one line write before the link counts as stalled.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Connect attempts per primary-connection event.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Pause between two connect attempts.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_tick_interval_ms() -> u64 {
    50
}
fn default_settle_ticks() -> u32 {
    inputlink_core::DEFAULT_SETTLE_TICKS
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_connect_timeout_ms() -> u64 {
    3000
}
fn default_health_interval_secs() -> u64 {
    10
}
fn default_write_timeout_ms() -> u64 {
    500
}
fn default_connect_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1000
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            settle_ticks: default_settle_ticks(),
            start_on_connect: default_true(),
            log_level: default_log_level(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            health_interval_secs: default_health_interval_secs(),
            write_timeout_ms: default_write_timeout_ms(),
            connect_attempts: default_connect_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl CaptureConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl LinkConfig {
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            health_interval: Duration::from_secs(self.health_interval_secs),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}

impl AppConfig {
    /// Settings for the link session built from both sections.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            host_override: self.link.host.clone(),
            port: self.link.port,
            connect_attempts: self.link.connect_attempts,
            retry_backoff: Duration::from_millis(self.link.retry_backoff_ms),
            start_capture_on_connect: self.capture.start_on_connect,
        }
    }

    /// Rejects values that would stall or panic the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.tick_interval_ms == 0 {
            return Err(invalid("capture.tick_interval_ms", "must be at least 1"));
        }
        if self.link.health_interval_secs == 0 {
            return Err(invalid("link.health_interval_secs", "must be at least 1"));
        }
        if self.link.write_timeout_ms == 0 {
            return Err(invalid("link.write_timeout_ms", "must be at least 1"));
        }
        if self.link.connect_attempts == 0 {
            return Err(invalid("link.connect_attempts", "must be at least 1"));
        }
        if self.link.port == 0 {
            return Err(invalid("link.port", "must not be 0"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform config file.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads and validates `AppConfig` from `path`, returning
/// `AppConfig::default()` if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value is out of range.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let cfg = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Persists `config` to the platform config file.
///
/// # Errors
///
/// See [`save_config_to`].
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory, including the `InputLink` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("InputLink"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("inputlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("InputLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
