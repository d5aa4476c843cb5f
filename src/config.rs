//! Configuration management for Loginguard.
//!
//! Settings come from an optional YAML file, overridden by environment
//! variables prefixed with `LOGINGUARD` (sections separated by `__`, e.g.
//! `LOGINGUARD__RATE_LIMITING__MAX_ATTEMPTS=3`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{LoginGuardError, Result};
use crate::ratelimit::RateLimitPolicy;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LOGINGUARD";

/// Main configuration for the Loginguard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginGuardConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 50051))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Failed attempts allowed per window before blocking
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Counting window in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Lockout duration in seconds
    #[serde(default = "default_block_duration_secs")]
    pub block_duration_secs: u64,

    /// Interval between expired entry sweeps in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_secs: default_window_secs(),
            block_duration_secs: default_block_duration_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    15 * 60
}

fn default_block_duration_secs() -> u64 {
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

impl RateLimitingConfig {
    /// The lockout policy described by this section.
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_attempts: self.max_attempts,
            window: Duration::from_secs(self.window_secs),
            block_duration: Duration::from_secs(self.block_duration_secs),
        }
    }

    /// Interval between sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoginGuardConfig {
    /// Load configuration from an optional YAML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Yaml),
            );
        }

        let config: LoginGuardConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LoginGuardConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LoginGuardError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the rate limiter cannot enforce sensibly.
    pub fn validate(&self) -> Result<()> {
        let rl = &self.rate_limiting;
        if rl.max_attempts == 0 {
            return Err(LoginGuardError::Config(
                "rate_limiting.max_attempts must be at least 1".into(),
            ));
        }
        if rl.window_secs == 0 {
            return Err(LoginGuardError::Config(
                "rate_limiting.window_secs must be greater than zero".into(),
            ));
        }
        if rl.block_duration_secs == 0 {
            return Err(LoginGuardError::Config(
                "rate_limiting.block_duration_secs must be greater than zero".into(),
            ));
        }
        if rl.block_duration_secs < rl.window_secs {
            return Err(LoginGuardError::Config(format!(
                "rate_limiting.block_duration_secs ({}) must not be shorter than window_secs ({})",
                rl.block_duration_secs, rl.window_secs
            )));
        }
        if rl.sweep_interval_secs == 0 {
            return Err(LoginGuardError::Config(
                "rate_limiting.sweep_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
