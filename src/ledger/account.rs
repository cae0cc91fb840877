use uuid::Uuid;

use super::LedgerRules;
use crate::error::{ensure_positive, LedgerError, LedgerResult};
use crate::settlement::{settle_due, SettlementBatch};
use crate::types::{Account, Direction, Position, PositionStatus};

impl Account {
    fn ensure_cash(&self, required: f64) -> LedgerResult<()> {
        if self.cash_balance >= required {
            Ok(())
        } else {
            Err(LedgerError::InsufficientFunds {
                required,
                available: self.cash_balance,
            })
        }
    }

    /// Debit `stake` and record a new OPEN position at `entry_price`.
    pub fn open_position(
        &mut self,
        rules: &LedgerRules,
        stake: f64,
        direction: Direction,
        duration_seconds: u64,
        entry_price: f64,
        now_ms: i64,
    ) -> LedgerResult<Position> {
        let stake = ensure_positive(stake)?;
        if !rules.is_supported_duration(duration_seconds) {
            return Err(LedgerError::UnsupportedDuration(duration_seconds));
        }
        self.ensure_cash(stake)?;

        let position = Position {
            id: Uuid::new_v4().to_string(),
            stake,
            entry_price,
            direction,
            opened_at: now_ms,
            duration_seconds,
            status: PositionStatus::Open,
            payout: stake * rules.payout_multiplier,
            exit_price: None,
        };

        self.cash_balance -= stake;
        self.positions.insert(0, position.clone());
        self.positions.truncate(rules.max_positions.max(1));
        Ok(position)
    }

    /// Settle due positions and credit winners in one step.
    pub fn settle(&mut self, current_price: f64, now_ms: i64) -> SettlementBatch {
        let batch = settle_due(&mut self.positions, current_price, now_ms);
        self.cash_balance += batch.credit;
        batch
    }

    /// Debit the subscription price and activate mining. Returns the amount charged.
    pub fn purchase_subscription(&mut self, rules: &LedgerRules, now_ms: i64) -> LedgerResult<f64> {
        let price = rules.subscription_price;
        self.ensure_cash(price)?;

        self.cash_balance -= price;
        self.subscription_active = true;
        self.subscription_expires_at =
            Some(now_ms.saturating_add(rules.subscription_period_ms()));
        Ok(price)
    }

    pub fn cancel_subscription(&mut self) -> LedgerResult<()> {
        if !self.subscription_active {
            return Err(LedgerError::NoActiveSubscription);
        }
        self.subscription_active = false;
        Ok(())
    }

    /// Whether a recorded expiry has passed
    pub fn subscription_expired(&self, now_ms: i64) -> bool {
        self.subscription_expires_at
            .map(|expires_at| now_ms >= expires_at)
            .unwrap_or(false)
    }

    /// Credit one tick of mining. Returns true if anything accrued.
    pub fn accrue(&mut self, rules: &LedgerRules) -> bool {
        if !self.subscription_active {
            return false;
        }
        self.token_balance += rules.rate_per_tick;
        self.total_tokens_accrued += rules.rate_per_tick;
        true
    }

    /// Debit `amount` plus the fixed fee. Returns the fee charged.
    pub fn withdraw(&mut self, rules: &LedgerRules, amount: f64) -> LedgerResult<f64> {
        let amount = ensure_positive(amount)?;
        let fee = rules.withdrawal_fee;
        self.ensure_cash(amount + fee)?;

        self.cash_balance -= amount + fee;
        Ok(fee)
    }

    pub fn deposit(&mut self, amount: f64) -> LedgerResult<f64> {
        let amount = ensure_positive(amount)?;
        self.cash_balance += amount;
        Ok(self.cash_balance)
    }
}
