//! Settlement Engine
//!
//! Resolves expired positions against one price snapshot. The pass works on
//! the position list in place and returns the pending credit; the caller
//! applies that credit to the cash balance in the same critical section, so
//! no reader ever sees winners credited one at a time.

use serde::Serialize;

use crate::types::{Position, PositionStatus};

/// Result of one settlement pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementBatch {
    /// Price every position in this batch settled against
    pub exit_price: f64,
    /// Total payout owed to the cash balance
    pub credit: f64,
    pub settled: Vec<Position>,
}

impl SettlementBatch {
    pub fn is_empty(&self) -> bool {
        self.settled.is_empty()
    }

    pub fn wins(&self) -> usize {
        self.settled
            .iter()
            .filter(|p| p.status == PositionStatus::Won)
            .count()
    }

    pub fn losses(&self) -> usize {
        self.settled.len() - self.wins()
    }
}

/// Settle every open position whose expiry is at or before `now_ms`.
///
/// Positions already WON or LOST are never touched again.
pub fn settle_due(positions: &mut [Position], current_price: f64, now_ms: i64) -> SettlementBatch {
    let mut batch = SettlementBatch {
        exit_price: current_price,
        ..SettlementBatch::default()
    };

    for position in positions.iter_mut().filter(|p| p.is_due(now_ms)) {
        let won = position
            .direction
            .wins(position.entry_price, current_price);
        position.exit_price = Some(current_price);
        if won {
            position.status = PositionStatus::Won;
            batch.credit += position.payout;
        } else {
            position.status = PositionStatus::Lost;
        }
        batch.settled.push(position.clone());
    }

    batch
}
