//! Account and treasury ledger operations
//!
//! Pure state transitions: each operation checks its preconditions first and
//! either applies all of its effects or returns an error with nothing changed.

mod account;
mod treasury;

/// Fixed terms applied by the ledger operations
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRules {
    pub payout_multiplier: f64,
    /// Allowed position durations in seconds
    pub durations_secs: Vec<u64>,
    pub max_positions: usize,
    pub subscription_price: f64,
    pub subscription_days: i64,
    pub rate_per_tick: f64,
    pub withdrawal_fee: f64,
}

impl LedgerRules {
    /// Saturates instead of overflowing on absurd terms
    pub fn subscription_period_ms(&self) -> i64 {
        self.subscription_days
            .max(0)
            .checked_mul(24 * 60 * 60 * 1000)
            .unwrap_or(i64::MAX)
    }

    pub fn is_supported_duration(&self, secs: u64) -> bool {
        secs > 0 && self.durations_secs.contains(&secs)
    }
}

impl Default for LedgerRules {
    fn default() -> Self {
        Self {
            payout_multiplier: 1.90,
            durations_secs: vec![5, 15, 30, 60, 120, 300],
            max_positions: 50,
            subscription_price: 29.99,
            subscription_days: 30,
            rate_per_tick: 0.0001,
            withdrawal_fee: 1.00,
        }
    }
}
