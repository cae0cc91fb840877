//! Dashboard API Types
//!
//! DTOs for HTTP/WebSocket communication with the browser client.

use serde::{Deserialize, Serialize};

use crate::exchange::{ExchangeEvent, ExchangeSnapshot};
use crate::settlement::SettlementBatch;
use crate::types::{Account, Direction, PayoutMethod, Position, PricePoint};

// ─────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionRequest {
    #[serde(alias = "amount")]
    pub stake: f64,
    #[serde(alias = "type")]
    pub direction: Direction,
    #[serde(alias = "duration")]
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepositRequest {
    /// Falls back to the configured demo deposit
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminLoginRequest {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayoutRequest {
    pub amount: f64,
    #[serde(default)]
    pub method: PayoutMethod,
}

// ─────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────

/// Position with its live countdown
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    #[serde(flatten)]
    pub position: Position,
    pub expires_at: i64,
    pub seconds_remaining: u64,
}

impl PositionResponse {
    pub fn new(position: Position, now_ms: i64) -> Self {
        Self {
            expires_at: position.expires_at(),
            seconds_remaining: position.seconds_remaining(now_ms),
            position,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub cash_balance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub active: bool,
    pub expires_at: Option<i64>,
}

// ─────────────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Full state (sent on connect)
    FullState(ExchangeSnapshot),
    PriceTick(PricePoint),
    PositionOpened(Position),
    PositionsSettled(SettlementBatch),
    AccountUpdated(Account),
    /// Expiry timestamp of the lapsed subscription
    SubscriptionExpired(i64),
    Heartbeat(i64),
}

impl From<ExchangeEvent> for WsMessage {
    fn from(event: ExchangeEvent) -> Self {
        match event {
            ExchangeEvent::PriceTick(point) => Self::PriceTick(point),
            ExchangeEvent::PositionOpened(position) => Self::PositionOpened(position),
            ExchangeEvent::PositionsSettled(batch) => Self::PositionsSettled(batch),
            ExchangeEvent::AccountUpdated(account) => Self::AccountUpdated(account),
            ExchangeEvent::SubscriptionExpired { expired_at } => {
                Self::SubscriptionExpired(expired_at)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// API Response wrapper
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
