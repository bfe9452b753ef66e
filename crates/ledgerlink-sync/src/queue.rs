//! Outbound event queue.
//!
//! Events created while disconnected are buffered here and flushed
//! head-to-tail once the connection returns. The queue is bounded; the
//! overflow policy decides what gives way when it fills up.

use std::collections::VecDeque;

use ledgerlink_core::SyncEvent;

/// What to do with a new event when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued event to make room.
    #[default]
    DropOldest,
    /// Refuse the new event.
    RejectNew,
}

/// Outcome of a push against a bounded queue.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// Event queued; nothing was displaced.
    Enqueued,
    /// Event queued; the oldest entry was evicted to make room.
    DroppedOldest(SyncEvent),
    /// Queue full and the policy refuses new entries.
    Rejected(SyncEvent),
}

/// FIFO buffer for events awaiting transmission.
#[derive(Debug)]
pub struct OutboundQueue {
    events: VecDeque<SyncEvent>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` events.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
            policy,
        }
    }

    /// Append an event at the tail, applying the overflow policy.
    pub fn push(&mut self, event: SyncEvent) -> PushOutcome {
        if self.events.len() < self.capacity {
            self.events.push_back(event);
            return PushOutcome::Enqueued;
        }
        match self.policy {
            OverflowPolicy::DropOldest => {
                let dropped = self.events.pop_front();
                self.events.push_back(event);
                match dropped {
                    Some(old) => PushOutcome::DroppedOldest(old),
                    None => PushOutcome::Enqueued,
                }
            }
            OverflowPolicy::RejectNew => PushOutcome::Rejected(event),
        }
    }

    /// Take the next event to transmit.
    pub fn pop_front(&mut self) -> Option<SyncEvent> {
        self.events.pop_front()
    }

    /// Put a failed transmission back at the head, preserving FIFO order.
    pub fn push_front(&mut self, event: SyncEvent) {
        self.events.push_front(event);
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of queued events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlink_core::{EventKind, UserId};
    use serde_json::json;

    fn event(n: i64) -> SyncEvent {
        SyncEvent::new(EventKind::LedgerCreated, UserId(1), json!({"n": n}))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = OutboundQueue::new(10, OverflowPolicy::DropOldest);
        let events: Vec<_> = (0..3).map(event).collect();
        for e in &events {
            queue.push(e.clone());
        }

        let drained: Vec<_> = std::iter::from_fn(|| queue.pop_front()).collect();
        assert_eq!(drained, events);
    }

    #[test]
    fn test_count_matches_pushes() {
        let mut queue = OutboundQueue::new(100, OverflowPolicy::DropOldest);
        for n in 0..7 {
            queue.push(event(n));
        }
        assert_eq!(queue.len(), 7);
    }

    #[test]
    fn test_drop_oldest_evicts_head() {
        let mut queue = OutboundQueue::new(2, OverflowPolicy::DropOldest);
        let first = event(0);
        queue.push(first.clone());
        queue.push(event(1));

        let outcome = queue.push(event(2));
        assert_eq!(outcome, PushOutcome::DroppedOldest(first));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_front().unwrap().payload["n"], 1);
    }

    #[test]
    fn test_reject_new_keeps_queue() {
        let mut queue = OutboundQueue::new(2, OverflowPolicy::RejectNew);
        queue.push(event(0));
        queue.push(event(1));

        let rejected = event(2);
        let outcome = queue.push(rejected.clone());
        assert_eq!(outcome, PushOutcome::Rejected(rejected));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_front().unwrap().payload["n"], 0);
    }

    #[test]
    fn test_push_front_restores_order() {
        let mut queue = OutboundQueue::new(10, OverflowPolicy::DropOldest);
        for n in 0..3 {
            queue.push(event(n));
        }

        // Simulate a failed transmission of the head.
        let head = queue.pop_front().unwrap();
        queue.push_front(head);

        let order: Vec<i64> = std::iter::from_fn(|| queue.pop_front())
            .map(|e| e.payload["n"].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
