//! Inbound event dispatch.
//!
//! Classifies each inbound event and fans it out to subscribers and the
//! notification side-channel. Echoes of the local user's own actions and
//! redelivered duplicates are suppressed; the queue retransmits on
//! partial flushes, so consumers must never see the same event twice.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::broadcast;

use ledgerlink_core::{EventId, EventKind, SyncEvent, SyncStatus, UserId};

use crate::notify::{describe, Notifier};

/// How many delivered event ids the duplicate filter remembers.
const SEEN_WINDOW: usize = 256;

/// Events published to subscribers.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A remote domain mutation; subscribers route on `event.kind`.
    Sync(SyncEvent),
    /// The connection status changed.
    StatusChanged(SyncStatus),
}

/// Classification of one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Forwarded to subscribers and the notifier.
    Delivered,
    /// The local user's own action arriving back; suppressed.
    Echo,
    /// Seen recently under the same id; suppressed.
    Duplicate,
    /// Liveness frame; no domain content.
    Heartbeat,
    /// Unrecognized kind; logged and dropped.
    Ignored,
}

/// Routes inbound events to subscribers and side effects.
pub struct EventDispatcher {
    local_user: UserId,
    events: broadcast::Sender<ClientEvent>,
    notifier: Arc<dyn Notifier>,
    seen: VecDeque<EventId>,
    seen_index: HashSet<EventId>,
}

impl EventDispatcher {
    /// Create a dispatcher for the given local user.
    pub fn new(
        local_user: UserId,
        events: broadcast::Sender<ClientEvent>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            local_user,
            events,
            notifier,
            seen: VecDeque::new(),
            seen_index: HashSet::new(),
        }
    }

    /// Classify and route one inbound event.
    pub async fn dispatch(&mut self, event: SyncEvent) -> DispatchOutcome {
        if event.kind.is_heartbeat() {
            return DispatchOutcome::Heartbeat;
        }
        if event.is_echo_of(self.local_user) {
            tracing::debug!(id = %event.id, "suppressing echo of local action");
            return DispatchOutcome::Echo;
        }
        if let EventKind::Unknown(name) = &event.kind {
            tracing::warn!(kind = %name, "dropping event of unknown kind");
            return DispatchOutcome::Ignored;
        }
        if !self.remember(event.id) {
            tracing::debug!(id = %event.id, "suppressing redelivered duplicate");
            return DispatchOutcome::Duplicate;
        }

        let (title, body) = describe(&event);
        if let Err(err) = self
            .notifier
            .show_local_notification(&title, &body, &event.payload)
            .await
        {
            tracing::warn!(%err, "local notification failed");
        }

        // Subscribers may come and go; nobody listening is not an error.
        let _ = self.events.send(ClientEvent::Sync(event));
        DispatchOutcome::Delivered
    }

    /// Record an id in the duplicate window.
    ///
    /// Returns false if the id was already present.
    fn remember(&mut self, id: EventId) -> bool {
        if !self.seen_index.insert(id) {
            return false;
        }
        self.seen.push_back(id);
        if self.seen.len() > SEEN_WINDOW {
            if let Some(oldest) = self.seen.pop_front() {
                self.seen_index.remove(&oldest);
            }
        }
        true
    }
}
