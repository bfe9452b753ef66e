//! Error types for the core event model.

use thiserror::Error;

/// Errors that can occur constructing or validating events.
#[derive(Debug, Error)]
pub enum EventError {
    /// Payload exceeds the wire size limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Event id could not be parsed.
    #[error("invalid event id: {0}")]
    InvalidId(#[from] hex::FromHexError),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, EventError>;
