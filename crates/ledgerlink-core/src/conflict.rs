//! Last-write-wins conflict resolution.
//!
//! When the same record was edited both locally and remotely, the copy
//! with the greater `updated_at` timestamp wins. Ties keep the local copy.
//! This can drop one side of a genuinely concurrent edit; the policy is
//! deliberate and matches the server's expectations.

use serde_json::Value;

/// Records that carry a modification timestamp.
pub trait Versioned {
    /// Unix ms of the last modification.
    fn updated_at(&self) -> i64;
}

/// Resolve a concurrent edit by last-write-wins.
///
/// Returns `remote` only if it is strictly newer than `local`.
pub fn resolve_conflict<T: Versioned>(local: T, remote: T) -> T {
    if remote.updated_at() > local.updated_at() {
        remote
    } else {
        local
    }
}

/// `Versioned` adapter over an opaque JSON record.
///
/// Reads the record's `updatedAt` field; records without one sort oldest.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedRecord(pub Value);

impl Versioned for VersionedRecord {
    fn updated_at(&self) -> i64 {
        self.0.get("updatedAt").and_then(Value::as_i64).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Stamped(i64);

    impl Versioned for Stamped {
        fn updated_at(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn test_newer_remote_wins() {
        let winner = resolve_conflict(Stamped(100), Stamped(200));
        assert_eq!(winner.updated_at(), 200);
    }

    #[test]
    fn test_newer_local_wins() {
        let winner = resolve_conflict(Stamped(300), Stamped(200));
        assert_eq!(winner.updated_at(), 300);
    }

    #[test]
    fn test_tie_keeps_local() {
        let local = VersionedRecord(json!({"updatedAt": 100, "side": "local"}));
        let remote = VersionedRecord(json!({"updatedAt": 100, "side": "remote"}));
        let winner = resolve_conflict(local, remote);
        assert_eq!(winner.0["side"], "local");
    }

    #[test]
    fn test_record_without_timestamp_loses() {
        let local = VersionedRecord(json!({"side": "local"}));
        let remote = VersionedRecord(json!({"updatedAt": 1, "side": "remote"}));
        let winner = resolve_conflict(local, remote);
        assert_eq!(winner.0["side"], "remote");
    }
}
