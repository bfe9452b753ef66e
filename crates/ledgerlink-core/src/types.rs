//! Strong type definitions for ledgerlink.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Identifier of a user account on the sync server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a shared ledger book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub i64);

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BookId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A 16-byte event identifier, assigned when the event is constructed.
///
/// The id travels with the event on the wire and is the dedupe key for
/// at-least-once delivery: a redelivered event carries the same id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub [u8; 16]);

impl EventId {
    /// Create a new EventId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Generate a random event ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 16 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The zero event ID (used as a sentinel).
    pub const ZERO: Self = Self([0u8; 16]);
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.to_hex())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for EventId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 16]> for EventId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

// Ids are hex strings on the wire; the frames are JSON text.
impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_hex_roundtrip() {
        let id = EventId::from_bytes([0x42; 16]);
        let hex = id.to_hex();
        let recovered = EventId::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_event_id_rejects_short_hex() {
        assert!(EventId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_event_id_display() {
        let id = EventId::from_bytes([0xab; 16]);
        assert_eq!(format!("{}", id), "abababababababababababababababab");
    }

    #[test]
    fn test_event_id_json_is_hex_string() {
        let id = EventId::from_bytes([0x01; 16]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"01010101010101010101010101010101\"");

        let back: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_user_id_transparent() {
        let json = serde_json::to_string(&UserId(42)).unwrap();
        assert_eq!(json, "42");
    }

    proptest::proptest! {
        #[test]
        fn test_event_id_roundtrip_any(bytes in proptest::prelude::any::<[u8; 16]>()) {
            let id = EventId::from_bytes(bytes);
            proptest::prop_assert_eq!(EventId::from_hex(&id.to_hex()).unwrap(), id);
        }
    }
}
