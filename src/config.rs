//! Handler configuration loaded from TOML and environment variables.
//!
//! Environment overrides use the `CORTEX` prefix with `__` between nested
//! keys, e.g. `CORTEX__RATE_LIMITS__TOAST_WINDOW_MS=2000`.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::GroupKeyStrategy;
use crate::handler::FatalPolicy;
use crate::ratelimit::{RateLimitWindows, DEFAULT_RECENT_CAPACITY};

/// Route fatal errors are redirected to by default.
pub const DEFAULT_ERROR_ROUTE: &str = "/error";

/// Errors that can occur when loading handler configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// The path could not be represented as UTF-8.
    #[error("Invalid configuration path: {0}")]
    InvalidPath(String),

    /// The configuration could not be parsed or deserialized.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// A value parsed but makes no sense.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Window lengths in milliseconds, as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub toast_window_ms: u64,
    pub system_window_ms: u64,
    pub log_window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let windows = RateLimitWindows::default();
        Self {
            toast_window_ms: windows.toast.as_millis() as u64,
            system_window_ms: windows.system.as_millis() as u64,
            log_window_ms: windows.log.as_millis() as u64,
        }
    }
}

impl RateLimitConfig {
    pub fn windows(&self) -> RateLimitWindows {
        RateLimitWindows::new()
            .with_toast(Duration::from_millis(self.toast_window_ms))
            .with_system(Duration::from_millis(self.system_window_ms))
            .with_log(Duration::from_millis(self.log_window_ms))
    }
}

/// Everything the error handler can be tuned with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub rate_limits: RateLimitConfig,
    /// Recent errors kept per group.
    pub recent_capacity: usize,
    /// Route fatal errors navigate to.
    pub error_route: String,
    pub fatal_policy: FatalPolicy,
    pub group_key_strategy: GroupKeyStrategy,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            rate_limits: RateLimitConfig::default(),
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            error_route: DEFAULT_ERROR_ROUTE.to_string(),
            fatal_policy: FatalPolicy::default(),
            group_key_strategy: GroupKeyStrategy::default(),
        }
    }
}

impl HandlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist
    /// - The path is not valid UTF-8
    /// - The file or an override cannot be parsed
    /// - The resulting values fail validation
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigError::InvalidPath(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path_str.to_string()));
        }

        let config = Config::builder()
            .add_source(File::new(path_str, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("CORTEX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let handler_config: HandlerConfig = config.try_deserialize()?;
        handler_config.validate()?;
        Ok(handler_config)
    }

    /// Parses configuration from an inline TOML string. No environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        let handler_config: HandlerConfig = config.try_deserialize()?;
        handler_config.validate()?;
        Ok(handler_config)
    }

    /// Checks values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.error_route.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "error_route must start with '/', got {:?}",
                self.error_route
            )));
        }
        Ok(())
    }

    pub fn windows(&self) -> RateLimitWindows {
        self.rate_limits.windows()
    }

    pub fn with_windows(mut self, windows: RateLimitWindows) -> Self {
        self.rate_limits = RateLimitConfig {
            toast_window_ms: windows.toast.as_millis() as u64,
            system_window_ms: windows.system.as_millis() as u64,
            log_window_ms: windows.log.as_millis() as u64,
        };
        self
    }

    pub fn with_fatal_policy(mut self, policy: FatalPolicy) -> Self {
        self.fatal_policy = policy;
        self
    }

    pub fn with_error_route(mut self, route: impl Into<String>) -> Self {
        self.error_route = route.into();
        self
    }

    pub fn with_group_key_strategy(mut self, strategy: GroupKeyStrategy) -> Self {
        self.group_key_strategy = strategy;
        self
    }

    pub fn with_recent_capacity(mut self, capacity: usize) -> Self {
        self.recent_capacity = capacity;
        self
    }
}
