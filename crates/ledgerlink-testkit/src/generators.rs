//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::json;

use ledgerlink_core::{BookId, EventId, EventKind, SyncEvent, UserId};

/// Generate a random EventId.
pub fn event_id() -> impl Strategy<Value = EventId> {
    any::<[u8; 16]>().prop_map(EventId::from_bytes)
}

/// Generate a plausible user id.
pub fn user_id() -> impl Strategy<Value = UserId> {
    (1i64..10_000).prop_map(UserId)
}

/// Generate a plausible book id.
pub fn book_id() -> impl Strategy<Value = BookId> {
    (1i64..10_000).prop_map(BookId)
}

/// Generate a domain event kind (never Heartbeat or Unknown).
pub fn domain_kind() -> impl Strategy<Value = EventKind> {
    prop_oneof![
        Just(EventKind::LedgerCreated),
        Just(EventKind::LedgerUpdated),
        Just(EventKind::LedgerDeleted),
        Just(EventKind::BookCreated),
        Just(EventKind::BookUpdated),
        Just(EventKind::BookDeleted),
        Just(EventKind::MemberJoined),
        Just(EventKind::MemberLeft),
        Just(EventKind::MemberRoleChanged),
    ]
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=1_700_000_000_000i64
}

/// Parameters for generating an event.
#[derive(Debug, Clone)]
pub struct EventParams {
    pub id: EventId,
    pub kind: EventKind,
    pub origin: UserId,
    pub book: BookId,
    pub amount: f64,
    pub description: String,
    pub timestamp: i64,
}

impl Arbitrary for EventParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 16]>(),
            domain_kind(),
            1i64..10_000,
            1i64..10_000,
            0.0f64..100_000.0,
            "[a-z ]{0,32}",
            timestamp(),
        )
            .prop_map(
                |(id, kind, origin, book, amount, description, timestamp)| EventParams {
                    id: EventId::from_bytes(id),
                    kind,
                    origin: UserId(origin),
                    book: BookId(book),
                    amount,
                    description,
                    timestamp,
                },
            )
            .boxed()
    }
}

/// Build an event from parameters.
pub fn event_from_params(params: &EventParams) -> SyncEvent {
    SyncEvent {
        id: params.id,
        kind: params.kind.clone(),
        payload: json!({
            "amount": params.amount,
            "description": params.description,
        }),
        timestamp: params.timestamp,
        origin_user_id: params.origin,
        book_id: Some(params.book),
    }
}
