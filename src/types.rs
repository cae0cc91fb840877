//! Core types used throughout the G Coin exchange
//!
//! Defines the data model: price samples, positions, the user account and
//! the developer treasury. Field names serialize in camelCase; aliases accept
//! snapshots written by the browser client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One sample of the synthetic price feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Wall-clock label (HH:MM:SS)
    pub time: String,
    /// Timestamp in milliseconds
    #[serde(default)]
    pub ts: i64,
    /// Price rounded to cents
    pub price: f64,
}

impl PricePoint {
    pub fn new(ts: i64, price: f64) -> Self {
        let time = DateTime::<Utc>::from_timestamp_millis(ts)
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        Self {
            time,
            ts,
            price: round_cents(price),
        }
    }
}

/// Round to two decimal places
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Which side of the entry price a position bets on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[serde(alias = "higher", alias = "above")]
    Above,
    #[serde(alias = "lower", alias = "below")]
    Below,
}

impl Direction {
    /// Whether this side wins given the exit price.
    ///
    /// An exit exactly at the entry price loses for both sides.
    pub fn wins(&self, entry_price: f64, exit_price: f64) -> bool {
        let price_went_up = exit_price > entry_price;
        match self {
            Direction::Above => price_went_up,
            Direction::Below => !price_went_up && exit_price != entry_price,
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "above" | "higher" | "call" | "up" => Some(Direction::Above),
            "below" | "lower" | "put" | "down" => Some(Direction::Below),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Above => write!(f, "ABOVE"),
            Direction::Below => write!(f, "BELOW"),
        }
    }
}

/// Lifecycle of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    #[serde(alias = "open")]
    Open,
    #[serde(alias = "won")]
    Won,
    #[serde(alias = "lost")]
    Lost,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Open => write!(f, "OPEN"),
            PositionStatus::Won => write!(f, "WON"),
            PositionStatus::Lost => write!(f, "LOST"),
        }
    }
}

/// A fixed-stake, fixed-duration binary position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    /// Amount debited at open (USD)
    #[serde(alias = "amount")]
    pub stake: f64,
    pub entry_price: f64,
    #[serde(alias = "type")]
    pub direction: Direction,
    /// Open time in milliseconds
    #[serde(alias = "startTime")]
    pub opened_at: i64,
    #[serde(alias = "duration")]
    pub duration_seconds: u64,
    pub status: PositionStatus,
    /// Credited on WON, fixed at open
    pub payout: f64,
    #[serde(default, alias = "expiryPrice", skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
}

impl Position {
    /// Expiry time in milliseconds
    pub fn expires_at(&self) -> i64 {
        self.opened_at
            .saturating_add((self.duration_seconds as i64).saturating_mul(1000))
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Open and past its expiry at `now_ms`
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.is_open() && now_ms >= self.expires_at()
    }

    /// Seconds until expiry, zero once due
    pub fn seconds_remaining(&self, now_ms: i64) -> u64 {
        let remaining_ms = (self.expires_at() - now_ms).max(0);
        ((remaining_ms + 999) / 1000) as u64
    }

    /// Realized P&L; None while open
    pub fn realized_pnl(&self) -> Option<f64> {
        match self.status {
            PositionStatus::Open => None,
            PositionStatus::Won => Some(self.payout - self.stake),
            PositionStatus::Lost => Some(-self.stake),
        }
    }
}

/// The simulated user wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(alias = "usdBalance")]
    pub cash_balance: f64,
    #[serde(default, alias = "gCoinBalance")]
    pub token_balance: f64,
    #[serde(default, alias = "isSubscribed")]
    pub subscription_active: bool,
    #[serde(default, alias = "subscriptionExpiry")]
    pub subscription_expires_at: Option<i64>,
    #[serde(default, alias = "totalMined")]
    pub total_tokens_accrued: f64,
    /// Newest first
    #[serde(default, alias = "tradeHistory")]
    pub positions: Vec<Position>,
}

impl Account {
    pub fn with_cash(cash_balance: f64) -> Self {
        Self {
            cash_balance,
            token_balance: 0.0,
            subscription_active: false,
            subscription_expires_at: None,
            total_tokens_accrued: 0.0,
            positions: Vec::new(),
        }
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open())
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::with_cash(1000.0)
    }
}

/// Destination for an admin payout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PayoutMethod {
    #[serde(rename = "Mobile Money")]
    MobileMoney,
    #[default]
    #[serde(rename = "Bank Account")]
    BankAccount,
    #[serde(rename = "PayPal Admin")]
    PayPalAdmin,
    #[serde(rename = "Crypto Settlement")]
    CryptoSettlement,
}

impl fmt::Display for PayoutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayoutMethod::MobileMoney => write!(f, "Mobile Money"),
            PayoutMethod::BankAccount => write!(f, "Bank Account"),
            PayoutMethod::PayPalAdmin => write!(f, "PayPal Admin"),
            PayoutMethod::CryptoSettlement => write!(f, "Crypto Settlement"),
        }
    }
}

/// One entry of the treasury payout log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRecord {
    /// Timestamp in milliseconds
    #[serde(alias = "date", deserialize_with = "de::timestamp_or_label")]
    pub timestamp: i64,
    pub amount: f64,
    pub method: PayoutMethod,
}

/// Operator-side revenue ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treasury {
    #[serde(default)]
    pub total_revenue: f64,
    #[serde(default, alias = "subscriptionCount")]
    pub subscription_sale_count: u32,
    #[serde(default, alias = "sellFeeCount")]
    pub withdrawal_fee_count: u32,
    #[serde(default, alias = "withdrawalHistory")]
    pub payout_log: Vec<PayoutRecord>,
}

/// Summary of the position ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStats {
    pub open: u32,
    pub wins: u32,
    pub losses: u32,
    /// Percentage of settled positions that won
    pub win_rate: f64,
    pub realized_pnl: f64,
    pub staked_open: f64,
}

impl AccountStats {
    pub fn from_positions(positions: &[Position]) -> Self {
        let mut stats = AccountStats::default();
        for position in positions {
            match position.status {
                PositionStatus::Open => {
                    stats.open += 1;
                    stats.staked_open += position.stake;
                }
                PositionStatus::Won => stats.wins += 1,
                PositionStatus::Lost => stats.losses += 1,
            }
            stats.realized_pnl += position.realized_pnl().unwrap_or(0.0);
        }
        let settled = stats.wins + stats.losses;
        if settled > 0 {
            stats.win_rate = (stats.wins as f64 / settled as f64) * 100.0;
        }
        stats
    }
}

mod de {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Label(String),
    }

    /// Accepts epoch milliseconds or a date label. Unparseable labels map to 0.
    pub fn timestamp_or_label<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => ms,
            Raw::Label(label) => parse_label(&label).unwrap_or(0),
        })
    }

    fn parse_label(label: &str) -> Option<i64> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(label) {
            return Some(dt.with_timezone(&Utc).timestamp_millis());
        }
        ["%m/%d/%Y, %I:%M:%S %p", "%d/%m/%Y, %H:%M:%S", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(label, fmt).ok())
            .map(|naive| naive.and_utc().timestamp_millis())
    }
}
