//! Pipeline error taxonomy
//!
//! Quarantined records, structural anomalies, low-confidence tags and
//! not-actionable threads are data, not errors; only conditions that stop a
//! unit of work appear here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A whole input artifact was unusable (wrong shape, unreadable)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A capability call failed after retries; isolated per thread
    #[error("Capability error: {0}")]
    Capability(String),

    /// Every thread in the batch failed on capability errors; fatal to the run
    #[error("Capability layer unavailable: {failed} of {total} threads failed")]
    CapabilityOutage { failed: usize, total: usize },

    /// A stage artifact on disk did not match the expected schema
    #[error("Invalid artifact {path}: {message}")]
    InvalidArtifact { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
