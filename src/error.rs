//! Ledger operation outcomes
//!
//! Every rejection is recoverable: the operation made no partial progress.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("insufficient funds: need ${required:.2}, have ${available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient treasury funds: requested ${requested:.2}, revenue ${available:.2}")]
    InsufficientTreasury { requested: f64, available: f64 },

    #[error("amount must be a positive finite number, got {0}")]
    InvalidAmount(f64),

    #[error("unsupported duration {0}s")]
    UnsupportedDuration(u64),

    #[error("no active subscription")]
    NoActiveSubscription,

    #[error("invalid developer access key")]
    Unauthorized,
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Reject non-finite and non-positive amounts
pub(crate) fn ensure_positive(amount: f64) -> LedgerResult<f64> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(LedgerError::InvalidAmount(amount))
    }
}
