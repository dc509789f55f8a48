//! Configuration for applications embedding fanfly.
//!
//! TOML file loading, the `FANFLY_MOCK_MODE` environment switch, and
//! translation to `fanfly_core::HubConfig`. Credentials are never part of
//! the file; they are entered at login and live in memory only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use fanfly_core::HubConfig;

/// The only environment variable consulted.
pub const MOCK_MODE_ENV: &str = "FANFLY_MOCK_MODE";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tracing setup failed: {0}")]
    Tracing(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub hub: HubSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[hub]`: backend selection and timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HubSection {
    /// Use the simulated backend. Overridden by `FANFLY_MOCK_MODE`.
    #[serde(default = "default_mock_mode")]
    pub mock_mode: bool,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// State poll period, milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Artificial delay per simulated request, milliseconds.
    #[serde(default)]
    pub simulated_latency_ms: u64,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            mock_mode: default_mock_mode(),
            base_url: default_base_url(),
            timeout: default_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            simulated_latency_ms: 0,
        }
    }
}

fn default_mock_mode() -> bool {
    true
}
fn default_base_url() -> String {
    fanfly_core::HubConfig::default().base_url.to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    3000
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingSection {
    /// `EnvFilter` directive, e.g. `"info"` or `"fanfly_core=debug"`.
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "fanfly", "fanfly").map_or_else(
        || PathBuf::from(".fanfly.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from the platform config file plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` plus environment. A missing file means
/// defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::raw()
                .only(&[MOCK_MODE_ENV])
                .map(|_| "hub.mock_mode".into()),
        );

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Validate and convert to the runtime `HubConfig`.
    pub fn to_hub_config(&self) -> Result<HubConfig, ConfigError> {
        let hub = &self.hub;
        let base_url: url::Url = hub.base_url.parse().map_err(|_| ConfigError::Validation {
            field: "hub.base_url".into(),
            reason: format!("invalid URL: {}", hub.base_url),
        })?;

        if hub.poll_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "hub.poll_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if hub.timeout == 0 {
            return Err(ConfigError::Validation {
                field: "hub.timeout".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(HubConfig {
            mock_mode: hub.mock_mode,
            base_url,
            timeout: Duration::from_secs(hub.timeout),
            poll_interval: Duration::from_millis(hub.poll_interval_ms),
            simulated_latency: Duration::from_millis(hub.simulated_latency_ms),
        })
    }
}

// ── Tracing ─────────────────────────────────────────────────────────

/// Install a global fmt subscriber. `RUST_LOG` takes precedence over
/// `logging.level`. Fails if a subscriber is already installed.
pub fn init_tracing(logging: &LoggingSection) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| ConfigError::Validation {
            field: "logging.level".into(),
            reason: e.to_string(),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let result = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ConfigError::Tracing(e.to_string()))
}
