//! Transport abstraction for the sync connection.
//!
//! The transport layer handles frame serialization and delivery.
//! Implementations may use WebSockets or an in-memory channel pair.

use async_trait::async_trait;

use ledgerlink_core::{BookId, SyncEvent, UserId};

use crate::error::Result;

/// Connection parameters for one (user, book, token) session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server base URL, e.g. `ws://sync.example.net`.
    pub base_url: String,
    pub user_id: UserId,
    pub book_id: BookId,
    pub token: String,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(
        base_url: impl Into<String>,
        user_id: UserId,
        book_id: BookId,
        token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            user_id,
            book_id,
            token: token.into(),
        }
    }

    /// Render the WebSocket URL for this session.
    pub fn url(&self) -> String {
        format!(
            "{}/ws?token={}&userId={}&bookId={}",
            self.base_url.trim_end_matches('/'),
            self.token,
            self.user_id,
            self.book_id
        )
    }
}

/// A connected, message-oriented duplex channel to the sync server.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmit one event frame.
    async fn send(&self, event: &SyncEvent) -> Result<()>;

    /// Receive the next event frame.
    ///
    /// Blocks until a frame arrives. Returns `Ok(None)` when the peer
    /// closes the connection cleanly.
    async fn recv(&self) -> Result<Option<SyncEvent>>;

    /// Close the connection.
    async fn close(&self) -> Result<()>;
}

/// Dials transports; one call per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a transport to the given endpoint.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>>;
}

/// A simple in-memory transport for testing.
///
/// Uses channels to simulate the server side of the connection.
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    use crate::error::SyncError;

    /// Test double for the server side of the sync connection.
    ///
    /// Scripts connection failures, captures transmitted events, and
    /// injects inbound events into the live transport.
    pub struct MemoryHub {
        /// How many upcoming connect attempts should be refused.
        fail_next: AtomicU32,
        /// Connect attempts seen, successful or not.
        attempts: AtomicU32,
        /// When each attempt was dialed; for backoff timing assertions.
        attempt_times: Mutex<Vec<tokio::time::Instant>>,
        /// Whether `send` on the live transport should fail.
        refuse_sends: AtomicBool,
        /// Events the "server" received, in arrival order.
        received: Mutex<Vec<SyncEvent>>,
        /// Sender half for injecting inbound events.
        inbound: Mutex<Option<mpsc::Sender<SyncEvent>>>,
    }

    impl MemoryHub {
        /// Create a new hub.
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                fail_next: AtomicU32::new(0),
                attempts: AtomicU32::new(0),
                attempt_times: Mutex::new(Vec::new()),
                refuse_sends: AtomicBool::new(false),
                received: Mutex::new(Vec::new()),
                inbound: Mutex::new(None),
            })
        }

        /// Create a connector that dials this hub.
        pub fn connector(self: &Arc<Self>) -> MemoryConnector {
            MemoryConnector {
                hub: Arc::clone(self),
            }
        }

        /// Refuse the next `n` connect attempts.
        pub fn fail_next_connects(&self, n: u32) {
            self.fail_next.store(n, Ordering::SeqCst);
        }

        /// Total connect attempts dialed so far.
        pub fn connect_attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }

        /// When each connect attempt was dialed.
        pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
            self.attempt_times.lock().unwrap().clone()
        }

        /// Make `send` on the live transport fail until re-enabled.
        pub fn refuse_sends(&self, refuse: bool) {
            self.refuse_sends.store(refuse, Ordering::SeqCst);
        }

        /// Events the server has received, in arrival order.
        pub fn sent_events(&self) -> Vec<SyncEvent> {
            self.received.lock().unwrap().clone()
        }

        /// Inject an inbound event into the live transport.
        ///
        /// Returns false if no transport is live.
        pub async fn push_inbound(&self, event: SyncEvent) -> bool {
            let sender = self.inbound.lock().unwrap().clone();
            match sender {
                Some(tx) => tx.send(event).await.is_ok(),
                None => false,
            }
        }

        /// Close the live session from the server side.
        pub fn close_session(&self) {
            *self.inbound.lock().unwrap() = None;
        }
    }

    /// Connector half of [`MemoryHub`].
    pub struct MemoryConnector {
        hub: Arc<MemoryHub>,
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        async fn connect(&self, _endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
            self.hub.attempts.fetch_add(1, Ordering::SeqCst);
            self.hub
                .attempt_times
                .lock()
                .unwrap()
                .push(tokio::time::Instant::now());

            let scripted = self.hub.fail_next.load(Ordering::SeqCst);
            if scripted > 0 {
                self.hub.fail_next.store(scripted - 1, Ordering::SeqCst);
                return Err(SyncError::Transport("connection refused".into()));
            }

            let (tx, rx) = mpsc::channel(64);
            *self.hub.inbound.lock().unwrap() = Some(tx);

            Ok(Box::new(MemoryTransport {
                hub: Arc::clone(&self.hub),
                receiver: tokio::sync::Mutex::new(rx),
                closed: AtomicBool::new(false),
            }))
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        hub: Arc<MemoryHub>,
        receiver: tokio::sync::Mutex<mpsc::Receiver<SyncEvent>>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, event: &SyncEvent) -> Result<()> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(SyncError::Closed);
            }
            if self.hub.refuse_sends.load(Ordering::SeqCst) {
                return Err(SyncError::Transport("send refused".into()));
            }
            self.hub.received.lock().unwrap().push(event.clone());
            Ok(())
        }

        async fn recv(&self) -> Result<Option<SyncEvent>> {
            let mut rx = self.receiver.lock().await;
            Ok(rx.recv().await)
        }

        async fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            self.hub.close_session();
            Ok(())
        }
    }
}
