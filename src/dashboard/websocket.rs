//! WebSocket Broadcaster
//!
//! Broadcasts exchange updates to all connected WebSocket clients.

use super::types::WsMessage;
use crate::exchange::Exchange;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Channel for broadcasting updates to WebSocket clients
#[derive(Debug, Clone)]
pub struct WebSocketBroadcaster {
    tx: broadcast::Sender<String>,
}

impl WebSocketBroadcaster {
    /// Create a new broadcaster with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to receive broadcast messages
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Broadcast a message to all connected clients
    pub fn broadcast(&self, msg: &WsMessage) {
        if let Ok(json) = serde_json::to_string(msg) {
            // Ignore send errors (no receivers is fine)
            let _ = self.tx.send(json);
        }
    }

    pub fn broadcast_heartbeat(&self) {
        self.broadcast(&WsMessage::Heartbeat(chrono::Utc::now().timestamp_millis()));
    }

    /// Relay exchange events to clients until the exchange goes away
    pub fn forward_events(&self, exchange: &Exchange) -> JoinHandle<()> {
        let mut rx = exchange.subscribe_events();
        let broadcaster = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => broadcaster.broadcast(&WsMessage::from(event)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "🖥️ Dashboard lagging behind exchange events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
