//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use serde_json::json;

use ledgerlink_core::{BookId, EventKind, SyncEvent, UserId};
use ledgerlink_sync::{ClientConfig, MemoryHub, RecordingNotifier, SyncClient};

/// A sync client wired to an in-memory hub with a recording notifier.
pub struct TestFixture {
    pub hub: Arc<MemoryHub>,
    pub notifier: Arc<RecordingNotifier>,
    pub client: SyncClient,
}

impl TestFixture {
    /// Create a fixture with the default client configuration.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a fixture with an explicit client configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        let hub = MemoryHub::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let client = SyncClient::with_config(
            config,
            Arc::new(hub.connector()),
            Arc::clone(&notifier) as Arc<dyn ledgerlink_sync::Notifier>,
        );
        Self {
            hub,
            notifier,
            client,
        }
    }

    /// Connect as `user` on `book` with a fixed test token.
    pub async fn connect_as(&self, user: UserId, book: BookId) -> ledgerlink_sync::Result<()> {
        self.client.connect(user, book, "test-token").await
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a test tracing subscriber; repeat calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A ledger-entry creation event as the server would deliver it.
pub fn ledger_created(origin: UserId, book: BookId, amount: f64, description: &str) -> SyncEvent {
    SyncEvent::new(
        EventKind::LedgerCreated,
        origin,
        json!({
            "amount": amount,
            "description": description,
            "actorName": format!("user-{origin}"),
        }),
    )
    .with_book(book)
}

/// A membership event as the server would deliver it.
pub fn member_joined(origin: UserId, book: BookId, actor_name: &str) -> SyncEvent {
    SyncEvent::new(
        EventKind::MemberJoined,
        origin,
        json!({"actorName": actor_name}),
    )
    .with_book(book)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_connects() {
        let fixture = TestFixture::new();
        fixture.connect_as(UserId(1), BookId(100)).await.unwrap();
        assert!(fixture.client.status().await.connected);
    }

    #[test]
    fn test_ledger_created_payload() {
        let event = ledger_created(UserId(3), BookId(7), 12.5, "coffee");
        assert_eq!(event.book_id, Some(BookId(7)));
        assert_eq!(event.payload["description"], "coffee");
        assert_eq!(event.payload["actorName"], "user-3");
    }
}
