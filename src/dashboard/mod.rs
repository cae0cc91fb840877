//! Dashboard Module
//!
//! HTTP/WebSocket API for the G Coin browser client.
//! Only compiled when the `dashboard` feature is enabled.

mod api;
mod types;
mod websocket;

pub use api::{create_router, ApiError};
pub use types::*;
pub use websocket::WebSocketBroadcaster;

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::exchange::Exchange;

const BROADCAST_CAPACITY: usize = 256;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serve the dashboard until `shutdown` resolves
pub async fn serve<F>(exchange: Arc<Exchange>, bind_addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let broadcaster = WebSocketBroadcaster::new(BROADCAST_CAPACITY);
    let forwarder = broadcaster.forward_events(&exchange);

    let heartbeat = {
        let broadcaster = broadcaster.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                broadcaster.broadcast_heartbeat();
            }
        })
    };

    let router = create_router(exchange, broadcaster);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind dashboard on {bind_addr}"))?;

    tracing::info!(addr = %bind_addr, "🖥️ Dashboard listening");

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Dashboard server error");

    heartbeat.abort();
    forwarder.abort();
    result
}
