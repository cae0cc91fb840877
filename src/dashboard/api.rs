//! Dashboard HTTP API
//!
//! REST endpoints for the browser client.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::types::*;
use super::{ApiResponse, WebSocketBroadcaster};
use crate::error::LedgerError;
use crate::exchange::{Exchange, ExchangeSnapshot};
use crate::types::{PayoutRecord, PricePoint, Treasury};

const ADMIN_KEY_HEADER: &str = "x-admin-key";

type AppState = (Arc<Exchange>, WebSocketBroadcaster);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Create the API router with all endpoints
pub fn create_router(exchange: Arc<Exchange>, broadcaster: WebSocketBroadcaster) -> Router {
    Router::new()
        // Market and account
        .route("/api/state", get(get_state))
        .route("/api/prices/history", get(get_price_history))
        .route("/api/positions", get(get_positions).post(open_position))
        // Mining
        .route("/api/mining/subscribe", post(subscribe))
        .route("/api/mining/cancel", post(cancel_subscription))
        // Wallet
        .route("/api/wallet/withdraw", post(withdraw))
        .route("/api/wallet/deposit", post(deposit))
        // Treasury admin
        .route("/api/admin/login", post(admin_login))
        .route("/api/admin/treasury", get(get_treasury))
        .route("/api/admin/payout", post(admin_payout))
        // WebSocket
        .route("/ws", get(websocket_handler))
        // State
        .with_state((exchange, broadcaster))
        // CORS for frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Rejection rendered as an error envelope
pub enum ApiError {
    Ledger(LedgerError),
    /// Body that does not parse as the expected request
    BadRequest(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Ledger(err) => {
                let status = match err {
                    LedgerError::Unauthorized => StatusCode::UNAUTHORIZED,
                    LedgerError::InsufficientFunds { .. }
                    | LedgerError::InsufficientTreasury { .. }
                    | LedgerError::NoActiveSubscription => StatusCode::CONFLICT,
                    LedgerError::InvalidAmount(_) | LedgerError::UnsupportedDuration(_) => {
                        StatusCode::BAD_REQUEST
                    }
                };
                (status, err.to_string())
            }
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

fn admin_key(headers: &HeaderMap) -> &str {
    headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /api/state - Account, stats, treasury totals and current price
async fn get_state(State((exchange, _)): State<AppState>) -> ApiResult<ExchangeSnapshot> {
    ok(exchange.snapshot())
}

/// GET /api/prices/history - Chart points, oldest first
async fn get_price_history(State((exchange, _)): State<AppState>) -> ApiResult<Vec<PricePoint>> {
    ok(exchange.price_history())
}

/// GET /api/positions - Newest first, with countdowns
async fn get_positions(State((exchange, _)): State<AppState>) -> ApiResult<Vec<PositionResponse>> {
    let now = exchange.now_ms();
    let positions = exchange
        .account()
        .positions
        .into_iter()
        .map(|p| PositionResponse::new(p, now))
        .collect();
    ok(positions)
}

/// POST /api/positions
async fn open_position(
    State((exchange, _)): State<AppState>,
    Json(req): Json<OpenPositionRequest>,
) -> ApiResult<PositionResponse> {
    let position = exchange.open_position(req.stake, req.direction, req.duration_seconds)?;
    let opened_at = position.opened_at;
    ok(PositionResponse::new(position, opened_at))
}

/// POST /api/mining/subscribe
async fn subscribe(State((exchange, _)): State<AppState>) -> ApiResult<SubscriptionResponse> {
    let expires_at = exchange.subscribe()?;
    ok(SubscriptionResponse {
        active: true,
        expires_at: Some(expires_at),
    })
}

/// POST /api/mining/cancel
async fn cancel_subscription(
    State((exchange, _)): State<AppState>,
) -> ApiResult<SubscriptionResponse> {
    exchange.cancel_subscription()?;
    ok(SubscriptionResponse {
        active: false,
        expires_at: exchange.account().subscription_expires_at,
    })
}

/// POST /api/wallet/withdraw
async fn withdraw(
    State((exchange, _)): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult<BalanceResponse> {
    let cash_balance = exchange.withdraw(req.amount)?;
    ok(BalanceResponse { cash_balance })
}

/// POST /api/wallet/deposit - Empty body or no amount means the demo deposit
async fn deposit(
    State((exchange, _)): State<AppState>,
    body: Bytes,
) -> ApiResult<BalanceResponse> {
    let amount = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let req: DepositRequest = serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid deposit request: {e}")))?;
        req.amount
    };
    let cash_balance = match amount {
        Some(amount) => exchange.deposit(amount)?,
        None => exchange.demo_deposit()?,
    };
    ok(BalanceResponse { cash_balance })
}

/// POST /api/admin/login
async fn admin_login(
    State((exchange, _)): State<AppState>,
    Json(req): Json<AdminLoginRequest>,
) -> ApiResult<bool> {
    exchange.verify_admin(&req.key)?;
    ok(true)
}

/// GET /api/admin/treasury
async fn get_treasury(
    State((exchange, _)): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Treasury> {
    ok(exchange.treasury(admin_key(&headers))?)
}

/// POST /api/admin/payout
async fn admin_payout(
    State((exchange, _)): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PayoutRequest>,
) -> ApiResult<PayoutRecord> {
    ok(exchange.admin_payout(admin_key(&headers), req.amount, req.method)?)
}

// ─────────────────────────────────────────────────────────────────
// WebSocket Handler
// ─────────────────────────────────────────────────────────────────

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};

/// WebSocket upgrade handler
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State((exchange, broadcaster)): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, exchange, broadcaster))
}

/// Outgoing message type for WebSocket
enum OutgoingMessage {
    Text(String),
    Pong(Vec<u8>),
}

/// Handle WebSocket connection
async fn handle_websocket(
    socket: WebSocket,
    exchange: Arc<Exchange>,
    broadcaster: WebSocketBroadcaster,
) {
    use futures_util::{SinkExt, StreamExt};

    tracing::info!("🖥️ New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();

    // Send initial state
    let msg = WsMessage::FullState(exchange.snapshot());
    if let Ok(json) = serde_json::to_string(&msg) {
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    let mut rx = broadcaster.subscribe();
    let (out_tx, mut out_rx) = tokio::sync::mpsc::channel::<OutgoingMessage>(32);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let result = match msg {
                OutgoingMessage::Text(text) => sender.send(Message::Text(text)).await,
                OutgoingMessage::Pong(data) => sender.send(Message::Pong(data)).await,
            };
            if result.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            broadcast_msg = rx.recv() => {
                if let Ok(msg) = broadcast_msg {
                    if out_tx.send(OutgoingMessage::Text(msg)).await.is_err() {
                        break;
                    }
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if out_tx.send(OutgoingMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received WebSocket message: {}", text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    send_task.abort();
    tracing::info!("🖥️ WebSocket connection closed");
}
