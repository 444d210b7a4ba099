//! Device configuration file: sections, log level and the TOML loader.
//!
//! The engine compiles a [`DeviceConfig`] into tick-based settings; this
//! module only parses and checks the parts that need no pin context.
//!
//! # Usage
//!
//! ```rust,no_run
//! use safeio_common::config::{ConfigLoader, ConfigError, DeviceConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = DeviceConfig::load(Path::new("config/safeio.toml"))?;
//!     println!("{} inputs, {} outputs", config.inputs.len(), config.outputs.len());
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::diag::config::DiagConfig;
use crate::io::config::{InputConfig, OutputConfig};

/// Why a device configuration was rejected.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("device configuration file not found")]
    FileNotFound,

    /// TOML syntax or a field type is wrong.
    #[error("cannot parse device configuration: {0}")]
    ParseError(String),

    /// Values parse but describe an unsafe or inconsistent device.
    #[error("invalid device configuration: {0}")]
    ValidationError(String),
}

/// Verbosity seeding the log filter of the simulator (`log_level = "debug"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, per-step test tracing.
    Trace,
    /// Test starts and step progress.
    Debug,
    /// FSM transitions and reset acceptance.
    #[default]
    Info,
    /// Failed test verdicts.
    Warn,
    /// Confirmed faults only.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// `[shared]` section.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "safeio-sim-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Name the device logs under.
    pub service_name: String,
}

impl SharedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "[shared] service_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete device configuration file.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "safeio"
///
/// [diag]
/// cycle_time_us = 1000
/// level_cyclic_ms = 500
///
/// [[inputs]]
/// pin = 0
/// dual_channel = true
/// consistency_filter_ms = 3
///
/// [[inputs]]
/// pin = 1
/// dual_channel = true
/// consistency_filter_ms = 3
///
/// [[outputs]]
/// pin = 0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Common section.
    pub shared: SharedConfig,

    /// Diagnostic timing and error limits.
    #[serde(default)]
    pub diag: DiagConfig,

    /// Per-DI properties, one entry per pin, ids contiguous from 0.
    #[serde(default)]
    pub inputs: Vec<InputConfig>,

    /// Per-DO properties, one entry per pin, ids contiguous from 0.
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

/// TOML loading for any deserializable section or file.
///
/// A missing file is `FileNotFound`; unreadable content and syntax errors
/// are `ParseError`.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from an in-memory TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
