//! Sync event model.
//!
//! A `SyncEvent` is a discrete notification of a domain mutation (ledger
//! entry, book, membership) propagated between connected clients of the
//! same book. Events are immutable once constructed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventError;
use crate::types::{BookId, EventId, UserId};

/// Size limits enforced on events.
pub mod limits {
    /// Max serialized payload size in bytes.
    pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024;
    /// Default bound for the outbound queue.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
}

/// Kinds of sync events, tagged `SCREAMING_SNAKE_CASE` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    LedgerCreated,
    LedgerUpdated,
    LedgerDeleted,
    BookCreated,
    BookUpdated,
    BookDeleted,
    MemberJoined,
    MemberLeft,
    MemberRoleChanged,
    /// Periodic liveness frame; carries no domain mutation.
    Heartbeat,
    /// Kinds this client does not know; preserved verbatim so they can
    /// be logged before being dropped.
    #[serde(untagged)]
    Unknown(String),
}

impl EventKind {
    /// Whether this is the liveness frame.
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, EventKind::Heartbeat)
    }

    /// Whether this kind carries a domain mutation subscribers care about.
    pub fn is_domain(&self) -> bool {
        !matches!(self, EventKind::Heartbeat | EventKind::Unknown(_))
    }
}

/// A single sync event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    /// Unique id, stable across redelivery.
    pub id: EventId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Opaque domain record (ledger entry, book, membership change).
    pub payload: Value,
    /// Creation time, Unix epoch milliseconds.
    pub timestamp: i64,
    /// The user whose action produced this event.
    pub origin_user_id: UserId,
    /// The book this event belongs to, when book-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_id: Option<BookId>,
}

impl SyncEvent {
    /// Create a new event with a fresh id and the current timestamp.
    pub fn new(kind: EventKind, origin_user_id: UserId, payload: Value) -> Self {
        Self {
            id: EventId::random(),
            kind,
            payload,
            timestamp: now_millis(),
            origin_user_id,
            book_id: None,
        }
    }

    /// Scope the event to a book.
    pub fn with_book(mut self, book_id: BookId) -> Self {
        self.book_id = Some(book_id);
        self
    }

    /// Create the periodic liveness frame.
    pub fn heartbeat(origin_user_id: UserId) -> Self {
        Self::new(EventKind::Heartbeat, origin_user_id, Value::Null)
    }

    /// Whether this event reflects `local_user`'s own action arriving back.
    pub fn is_echo_of(&self, local_user: UserId) -> bool {
        self.origin_user_id == local_user
    }

    /// Check that this event respects size limits.
    pub fn validate_limits(&self) -> Result<(), EventError> {
        let size = self.payload.to_string().len();
        if size > limits::MAX_PAYLOAD_BYTES {
            return Err(EventError::PayloadTooLarge {
                size,
                max: limits::MAX_PAYLOAD_BYTES,
            });
        }
        Ok(())
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
