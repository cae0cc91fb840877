use crate::error::{ensure_positive, LedgerError, LedgerResult};
use crate::types::{PayoutMethod, PayoutRecord, Treasury};

impl Treasury {
    pub fn record_subscription_sale(&mut self, price: f64) {
        self.total_revenue += price;
        self.subscription_sale_count += 1;
    }

    pub fn record_withdrawal_fee(&mut self, fee: f64) {
        self.total_revenue += fee;
        self.withdrawal_fee_count += 1;
    }

    /// Move `amount` of revenue out to the operator; revenue never goes negative.
    pub fn payout(
        &mut self,
        amount: f64,
        method: PayoutMethod,
        now_ms: i64,
    ) -> LedgerResult<PayoutRecord> {
        let amount = ensure_positive(amount)?;
        if self.total_revenue < amount {
            return Err(LedgerError::InsufficientTreasury {
                requested: amount,
                available: self.total_revenue,
            });
        }

        let record = PayoutRecord {
            timestamp: now_ms,
            amount,
            method,
        };
        self.total_revenue -= amount;
        self.payout_log.push(record.clone());
        Ok(record)
    }

    pub fn total_paid_out(&self) -> f64 {
        self.payout_log.iter().map(|r| r.amount).sum()
    }
}
