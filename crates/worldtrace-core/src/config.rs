//! Configuration loading and typed config structures for a trace run.
//!
//! The configuration lives in a YAML file (by default `worldtrace.yaml`).
//! This module defines strongly-typed structs that mirror the YAML
//! structure and a loader that reads it. Every field has a default, so an
//! empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but cannot be used.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration of one trace run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TraceConfig {
    /// Login credentials.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Session timing and start location.
    #[serde(default)]
    pub session: SessionConfig,

    /// Reconnect backoff bounds.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Object path tracer output.
    #[serde(default)]
    pub tracer: TracerConfig,

    /// Navigation policy selection.
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// Diagnostic logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TraceConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override credentials when set:
    /// - `WORLDTRACE_FIRST_NAME` overrides `credentials.first_name`
    /// - `WORLDTRACE_LAST_NAME` overrides `credentials.last_name`
    /// - `WORLDTRACE_PASSWORD` overrides `credentials.password`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.credentials.apply_env_overrides();
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty mapping.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "session.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.reconnect.floor_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "reconnect.floor_ms must be at least 1".to_owned(),
            });
        }
        if self.reconnect.max_backoff_ms < self.reconnect.floor_ms {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "reconnect.max_backoff_ms ({}) is below reconnect.floor_ms ({})",
                    self.reconnect.max_backoff_ms, self.reconnect.floor_ms
                ),
            });
        }
        Ok(())
    }
}

/// Account credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CredentialsConfig {
    /// Account first name.
    #[serde(default)]
    pub first_name: String,

    /// Account last name.
    #[serde(default)]
    pub last_name: String,

    /// Account password.
    #[serde(default)]
    pub password: String,
}

impl CredentialsConfig {
    /// Override credentials with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("WORLDTRACE_FIRST_NAME") {
            self.first_name = val;
        }
        if let Ok(val) = std::env::var("WORLDTRACE_LAST_NAME") {
            self.last_name = val;
        }
        if let Ok(val) = std::env::var("WORLDTRACE_PASSWORD") {
            self.password = val;
        }
    }
}

/// Session timing, identification and start location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Total trace duration in seconds.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Tick period in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Region and coordinates to log in at, instead of the default location.
    #[serde(default)]
    pub start_location: Option<StartLocation>,

    /// Client name reported at login.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Client version reported at login.
    #[serde(default = "default_version")]
    pub version: String,
}

impl SessionConfig {
    /// Total trace duration.
    pub const fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Tick period.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            start_location: None,
            user_agent: default_user_agent(),
            version: default_version(),
        }
    }
}

/// A requested login position.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartLocation {
    /// Region name.
    pub region: String,
    /// X coordinate within the region.
    pub x: i32,
    /// Y coordinate within the region.
    pub y: i32,
    /// Z coordinate within the region.
    pub z: i32,
}

/// Reconnect backoff bounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconnectConfig {
    /// Initial retry delay, restored after every successful login.
    #[serde(default = "default_floor_ms")]
    pub floor_ms: u64,

    /// Upper bound on the retry delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl ReconnectConfig {
    /// Initial retry delay.
    pub const fn floor(&self) -> Duration {
        Duration::from_millis(self.floor_ms)
    }

    /// Upper bound on the retry delay.
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            floor_ms: default_floor_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Object path tracer settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TracerConfig {
    /// Where the trace array is written.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Observation radius requested from the world at trace start.
    #[serde(default = "default_camera_far")]
    pub camera_far: f32,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            camera_far: default_camera_far(),
        }
    }
}

/// Navigation policy selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NavigationConfig {
    /// Policy name: `none` or `static_rotating`.
    #[serde(default = "default_policy")]
    pub policy: String,

    /// Seconds per full turn for the rotating policy.
    #[serde(default = "default_rotation_period_secs")]
    pub rotation_period_secs: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            rotation_period_secs: default_rotation_period_secs(),
        }
    }
}

/// Diagnostic logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const fn default_duration_secs() -> u64 {
    30
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    String::from(env!("CARGO_PKG_NAME"))
}

fn default_version() -> String {
    String::from(env!("CARGO_PKG_VERSION"))
}

const fn default_floor_ms() -> u64 {
    1000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_output_path() -> PathBuf {
    PathBuf::from("object_paths.json")
}

const fn default_camera_far() -> f32 {
    512.0
}

fn default_policy() -> String {
    String::from("static_rotating")
}

const fn default_rotation_period_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    String::from("info")
}
