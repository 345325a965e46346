//! Error types for the skillsprint roadmap system.

use crate::tree::Roadmap;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {table}/{key}")]
    NotFound { table: String, key: String },

    #[error("Invalid record key: {0}")]
    InvalidKey(String),

    #[error("Record serialization failed: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::Other,
            err.to_string(),
        ))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors surfaced by the codec, overlay store, scheduler and pipeline.
///
/// `RateLimited` is the only variant the scheduler recovers from (by checkpointing
/// and handing the job to the next hop). Everything else aborts the job.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Continuation exhausted after {hops} hops")]
    Exhausted { hops: u32, partial: Box<Roadmap> },

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Generator output could not be repaired: {message} (near: {excerpt:?})")]
    RepairFailure { message: String, excerpt: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited(_))
    }

    /// Stable short name used in job envelopes and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::NotFound(_) => "not_found",
            ApiError::RateLimited(_) => "rate_limited",
            ApiError::Exhausted { .. } => "exhausted",
            ApiError::Upstream(_) => "upstream",
            ApiError::RepairFailure { .. } => "repair_failure",
            ApiError::StorageError(_) => "storage",
            ApiError::ConfigError(_) => "config",
        }
    }

    /// HTTP status for the request-shaped surface.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::StorageError(StorageError::NotFound { .. }) => 404,
            ApiError::RateLimited(_) => 429,
            _ => 500,
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
