//! Local notification side-channel.
//!
//! Each delivered inbound event surfaces a human-readable local
//! notification. The delivery mechanism is host-specific and injected
//! as a trait object; failures are logged by the dispatcher, never fatal.

use async_trait::async_trait;
use serde_json::Value;

use ledgerlink_core::{EventKind, SyncEvent};

use crate::error::Result;

/// Shows local notifications on the host platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Surface a notification with the raw event payload attached.
    async fn show_local_notification(&self, title: &str, body: &str, data: &Value) -> Result<()>;
}

/// Notifier that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn show_local_notification(&self, _title: &str, _body: &str, _data: &Value) -> Result<()> {
        Ok(())
    }
}

/// Notifier that records calls, for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: std::sync::Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The (title, body) pairs shown so far.
    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().unwrap().clone()
    }

    /// Number of notifications shown.
    pub fn count(&self) -> usize {
        self.shown.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show_local_notification(&self, title: &str, body: &str, _data: &Value) -> Result<()> {
        self.shown
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

/// Build the (title, body) pair describing an inbound event.
///
/// The body pulls `actorName`, `description` and `amount` out of the
/// payload when present; missing fields degrade to generic wording.
pub fn describe(event: &SyncEvent) -> (String, String) {
    let payload = &event.payload;
    let actor = payload
        .get("actorName")
        .and_then(Value::as_str)
        .unwrap_or("Someone");
    let description = payload.get("description").and_then(Value::as_str);
    let amount = payload.get("amount").and_then(Value::as_f64);

    match &event.kind {
        EventKind::LedgerCreated => ("New ledger entry".into(), entry_line(actor, "added", description, amount)),
        EventKind::LedgerUpdated => ("Ledger entry updated".into(), entry_line(actor, "updated", description, amount)),
        EventKind::LedgerDeleted => ("Ledger entry removed".into(), format!("{actor} removed an entry")),
        EventKind::BookCreated => ("Book created".into(), format!("{actor} created a new book")),
        EventKind::BookUpdated => ("Book updated".into(), format!("{actor} updated the book settings")),
        EventKind::BookDeleted => ("Book deleted".into(), format!("{actor} deleted the book")),
        EventKind::MemberJoined => ("Member joined".into(), format!("{actor} joined the book")),
        EventKind::MemberLeft => ("Member left".into(), format!("{actor} left the book")),
        EventKind::MemberRoleChanged => ("Role changed".into(), format!("{actor}'s role changed")),
        EventKind::Heartbeat | EventKind::Unknown(_) => {
            ("Sync".into(), "Activity in your shared book".into())
        }
    }
}

fn entry_line(actor: &str, verb: &str, description: Option<&str>, amount: Option<f64>) -> String {
    match (description, amount) {
        (Some(desc), Some(amount)) => format!("{actor} {verb} \"{desc}\" ({amount:.2})"),
        (Some(desc), None) => format!("{actor} {verb} \"{desc}\""),
        (None, Some(amount)) => format!("{actor} {verb} an entry ({amount:.2})"),
        (None, None) => format!("{actor} {verb} an entry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlink_core::UserId;
    use serde_json::json;

    #[test]
    fn test_describe_ledger_created() {
        let event = SyncEvent::new(
            EventKind::LedgerCreated,
            UserId(2),
            json!({"actorName": "Mina", "description": "groceries", "amount": 42.5}),
        );
        let (title, body) = describe(&event);
        assert_eq!(title, "New ledger entry");
        assert_eq!(body, "Mina added \"groceries\" (42.50)");
    }

    #[test]
    fn test_describe_without_payload_fields() {
        let event = SyncEvent::new(EventKind::MemberJoined, UserId(2), json!({}));
        let (title, body) = describe(&event);
        assert_eq!(title, "Member joined");
        assert_eq!(body, "Someone joined the book");
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier
            .show_local_notification("t", "b", &json!({}))
            .await
            .unwrap();
        assert_eq!(notifier.count(), 1);
        assert_eq!(notifier.shown()[0].0, "t");
    }
}
