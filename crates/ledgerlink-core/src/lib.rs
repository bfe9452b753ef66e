//! # Ledgerlink Core
//!
//! Core primitives for the ledgerlink sync layer: the event model,
//! identifiers, connection status, and conflict resolution.
//!
//! ## Overview
//!
//! Every mutation of a shared ledger book (entries, book settings,
//! membership) becomes a [`SyncEvent`] carrying an opaque domain payload.
//! Events are immutable, identified by a random [`EventId`], and tagged
//! with the [`UserId`] whose action produced them so that clients can
//! suppress echoes of their own actions.
//!
//! This crate is I/O-free; the transport and connection lifecycle live in
//! `ledgerlink-sync`.

pub mod conflict;
pub mod error;
pub mod event;
pub mod status;
pub mod types;

pub use conflict::{resolve_conflict, Versioned, VersionedRecord};
pub use error::{EventError, Result};
pub use event::{limits, EventKind, SyncEvent};
pub use status::SyncStatus;
pub use types::{BookId, EventId, UserId};
