//! Configuration management for the NBA pipeline
//!
//! Supports loading configuration from:
//! - TOML files
//! - Environment variables (SUPPORT_NBA_ prefix, `__` section separator)
//! - Built-in defaults
//!
//! Precedence: env vars > file > defaults.

pub mod settings;

pub use settings::{
    load_settings, ArtifactConfig, CapabilityConfig, DecisionConfig, DecisionWeights,
    EvaluationConfig, RunnerConfig, Settings, TaggingConfig, ThreadingConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
