//! Observable connection status.

use serde::{Deserialize, Serialize};

/// Snapshot of the sync connection state.
///
/// The connection manager owns the authoritative copy and publishes a
/// fresh snapshot whenever any field changes; subscribers never poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Whether the transport is currently established.
    pub connected: bool,
    /// Unix ms of the last successful connect or inbound dispatch.
    pub last_sync_time: i64,
    /// Number of events waiting in the outbound queue.
    pub pending_change_count: usize,
}

impl SyncStatus {
    /// The status of a client that has never connected.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            last_sync_time: 0,
            pending_change_count: 0,
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status() {
        let status = SyncStatus::default();
        assert!(!status.connected);
        assert_eq!(status.pending_change_count, 0);
    }

    #[test]
    fn test_status_wire_shape() {
        let status = SyncStatus {
            connected: true,
            last_sync_time: 1_700_000_000_000,
            pending_change_count: 3,
        };
        let value = serde_json::to_value(status).unwrap();
        assert_eq!(value["connected"], true);
        assert_eq!(value["lastSyncTime"], 1_700_000_000_000i64);
        assert_eq!(value["pendingChangeCount"], 3);
    }
}
