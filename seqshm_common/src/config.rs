//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! for seqshm processes.
//!
//! # Usage
//!
//! ```rust,no_run
//! use seqshm_common::config::{ConfigLoader, IpcConfig, SharedConfig, ConfigError};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct MyAppConfig {
//!     shared: SharedConfig,
//!     #[serde(default)]
//!     ipc: IpcConfig,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = MyAppConfig::load(Path::new("config.toml"))?;
//!     config.ipc.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{DEFAULT_MAX_READ_ATTEMPTS, DEFAULT_SPIN_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields shared across seqshm processes.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "gps-publisher"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Transport tuning.
///
/// # TOML Example
///
/// ```toml
/// [ipc]
/// spin_limit = 64
/// max_read_attempts = 0      # 0 = retry forever
/// cleanup_on_start = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IpcConfig {
    /// Failed read attempts that busy-spin before the reader yields.
    pub spin_limit: u32,

    /// Read attempts before giving up. `0` disables the bound.
    pub max_read_attempts: u32,

    /// Unlink every prefixed segment when the process configures itself.
    pub cleanup_on_start: bool,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            spin_limit: DEFAULT_SPIN_LIMIT,
            max_read_attempts: DEFAULT_MAX_READ_ATTEMPTS,
            cleanup_on_start: false,
        }
    }
}

impl IpcConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if a bounded attempt count is
    /// not larger than the spin limit (the reader would never yield).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_read_attempts != 0 && self.max_read_attempts <= self.spin_limit {
            return Err(ConfigError::ValidationError(format!(
                "max_read_attempts ({}) must exceed spin_limit ({}) or be 0",
                self.max_read_attempts, self.spin_limit
            )));
        }
        Ok(())
    }

    /// Attempt bound, `None` when unbounded.
    pub fn read_attempt_limit(&self) -> Option<u32> {
        (self.max_read_attempts != 0).then_some(self.max_read_attempts)
    }
}

/// Trait for loading configuration from TOML files.
///
/// This trait provides a default implementation that works with any type
/// implementing `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
