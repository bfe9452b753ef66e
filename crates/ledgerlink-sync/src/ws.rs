//! WebSocket transport.
//!
//! Frames are JSON text messages carrying one [`SyncEvent`] each.
//! Protocol-level ping/pong and binary frames are ignored; malformed
//! frames are logged and dropped without killing the connection.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use ledgerlink_core::SyncEvent;

use crate::error::{Result, SyncError};
use crate::transport::{Connector, Endpoint, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector that dials a real WebSocket endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        let (stream, _response) = connect_async(endpoint.url())
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let (sink, stream) = stream.split();
        Ok(Box::new(WsTransport {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }))
    }
}

/// WebSocket-backed transport.
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, event: &SyncEvent) -> Result<()> {
        event.validate_limits()?;
        let text = serde_json::to_string(event)?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text))
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))
    }

    async fn recv(&self) -> Result<Option<SyncEvent>> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                    Ok(event) => return Ok(Some(event)),
                    Err(err) => {
                        tracing::warn!(%err, "dropping malformed frame");
                        continue;
                    }
                },
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Ping/pong are answered by the library; binary is not
                // part of the protocol.
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(SyncError::Transport(err.to_string())),
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let mut sink = self.sink.lock().await;
        // Best-effort close frame; the peer may already be gone.
        let _ = sink.send(Message::Close(None)).await;
        sink.close()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))
    }
}
