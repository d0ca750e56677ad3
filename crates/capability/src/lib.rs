//! Capability backends for the NBA pipeline
//!
//! Classification, reply generation and judging all go through the
//! `Capability` contract from `support-nba-core`. This crate provides the
//! HTTP backend for OpenAI-compatible chat endpoints, the prompt builders
//! the pipeline stages share, response parsing, and a scripted backend for
//! tests and offline runs.

pub mod backend;
pub mod parse;
pub mod prompt;
pub mod scripted;

pub use backend::HttpCapability;
pub use scripted::ScriptedCapability;

use thiserror::Error;

/// Errors from capability backends. Network and timeout failures are
/// transient and retried by the backend; the rest surface immediately.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CapabilityError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CapabilityError::Network(_) | CapabilityError::Timeout)
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CapabilityError::Timeout
        } else {
            CapabilityError::Network(err.to_string())
        }
    }
}

impl From<CapabilityError> for support_nba_core::Error {
    fn from(err: CapabilityError) -> Self {
        support_nba_core::Error::Capability(err.to_string())
    }
}
