//! TOML-based configuration for the NetStation client.
//!
//! Example:
//!
//! ```toml
//! [device]
//! address = "10.10.10.42"
//! port = 55513
//!
//! [transport]
//! io_timeout_ms = 2000
//!
//! [session]
//! system_spec = "NTEL"
//! markers = 26
//! interval_ms = 5000
//! duration_ms = 50
//!
//! [logging]
//! log_level = "info"
//! ```
//!
//! Every field has a `#[serde(default = "...")]` helper, so an empty file (or
//! no file at all) yields a working configuration.  Timeouts are absent by
//! default, which keeps the socket calls fully blocking.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use netstation_core::SystemSpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::marker_session::MarkerPlan;
use crate::infrastructure::connection::TransportOptions;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
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
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the acquisition host listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// IPv4 address of the NetStation host.
    #[serde(default = "default_address")]
    pub address: Ipv4Addr,
    /// TCP port of the event-synchronization service.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Optional socket timeouts.  Zero is treated the same as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// Read/write timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_timeout_ms: Option<u64>,
    /// TCP handshake timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

/// Parameters of the marker session run by the demo binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Byte-order token announced at session start.
    #[serde(default = "SystemSpec::native")]
    pub system_spec: SystemSpec,
    /// Number of marker rounds.
    #[serde(default = "default_markers")]
    pub markers: u32,
    /// Pause after each round, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Duration stamped on each marker, in milliseconds.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: i32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_address() -> Ipv4Addr {
    Ipv4Addr::new(10, 10, 10, 42)
}
fn default_port() -> u16 {
    55513
}
fn default_markers() -> u32 {
    26
}
fn default_interval_ms() -> u64 {
    5000
}
fn default_duration_ms() -> i32 {
    50
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_spec: SystemSpec::native(),
            markers: default_markers(),
            interval_ms: default_interval_ms(),
            duration_ms: default_duration_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

fn millis(value: Option<u64>) -> Option<Duration> {
    value.filter(|ms| *ms > 0).map(Duration::from_millis)
}

impl From<&TransportConfig> for TransportOptions {
    fn from(cfg: &TransportConfig) -> Self {
        Self {
            io_timeout: millis(cfg.io_timeout_ms),
            connect_timeout: millis(cfg.connect_timeout_ms),
        }
    }
}

impl From<&SessionConfig> for MarkerPlan {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            system_spec: cfg.system_spec,
            markers: cfg.markers,
            interval: Duration::from_millis(cfg.interval_ms),
            duration_ms: cfg.duration_ms,
        }
    }
}

// ── Load / save ───────────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path` as pretty TOML, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
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

// ── Tests ─────────────────────────────────────────────────────────────────────
