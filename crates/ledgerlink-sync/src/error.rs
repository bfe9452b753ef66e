//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Frame could not be serialized or parsed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Event failed validation.
    #[error("event error: {0}")]
    Event(#[from] ledgerlink_core::EventError),

    /// The connection is not established.
    #[error("not connected")]
    NotConnected,

    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,

    /// Every reconnection attempt in the budget failed.
    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// A newer connect() or disconnect() took over the connection.
    #[error("cancelled")]
    Cancelled,
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
