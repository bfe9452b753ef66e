//! # Ledgerlink Sync
//!
//! Client-side real-time synchronization for shared ledger books.
//!
//! ## Overview
//!
//! A [`SyncClient`] owns one logical connection per (user, book, token)
//! triple. Locally generated events are transmitted immediately while
//! connected and buffered in a bounded FIFO queue while offline; the
//! queue flushes in order on the next (re)connect. Inbound events fan
//! out to subscribers and a local-notification side-channel, with echo
//! and duplicate suppression. Failed connections retry with bounded
//! exponential backoff.
//!
//! ## Key Properties
//!
//! - **No self-echo**: the local user's own actions are never re-applied
//! - **FIFO flush**: offline events transmit in creation order
//! - **At-least-once**: a partial flush retransmits; inbound dispatch
//!   dedupes by event id
//! - **Bounded retries**: backoff doubles per attempt and gives up after
//!   the budget, until the next explicit `connect()`
//!
//! ## Connection Lifecycle
//!
//! ```text
//! DISCONNECTED ──connect()──▶ CONNECTING ────ok────▶ CONNECTED
//!       ▲                      │     ▲                   │
//!       │ budget spent     fail│     │timer expiry       │transport lost
//!       └───────────── RECONNECT_WAIT                    ▼
//!                                                   CONNECTING
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ledgerlink_core::{BookId, UserId};
//! use ledgerlink_sync::{NoopNotifier, SyncClient, WsConnector};
//!
//! async fn example() {
//!     let client = SyncClient::new(Arc::new(WsConnector), Arc::new(NoopNotifier));
//!     let mut events = client.subscribe();
//!
//!     client.connect(UserId(1), BookId(100), "token").await.unwrap();
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! }
//! ```

pub mod backoff;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod notify;
pub mod queue;
pub mod transport;
pub mod ws;

pub use backoff::ReconnectPolicy;
pub use connection::{ClientConfig, ConnectionState, SyncClient};
pub use dispatch::{ClientEvent, DispatchOutcome, EventDispatcher};
pub use error::{Result, SyncError};
pub use notify::{describe, NoopNotifier, Notifier, RecordingNotifier};
pub use queue::{OutboundQueue, OverflowPolicy, PushOutcome};
pub use transport::{memory::MemoryHub, Connector, Endpoint, Transport};
pub use ws::{WsConnector, WsTransport};
