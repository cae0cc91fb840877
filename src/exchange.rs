//! Exchange State Container
//!
//! Owns the account, the treasury and the market feed behind one mutex.
//! Every tick and every user operation takes the guard once, runs its whole
//! step (including the snapshot write) and releases it, so no caller can
//! observe a half-applied settlement or a balance debited without its
//! treasury credit.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::LedgerRules;
use crate::market::{PriceGenerator, PriceGeneratorConfig, PriceHistory};
use crate::persistence::{CsvJournal, SnapshotStore};
use crate::settlement::SettlementBatch;
use crate::types::{
    Account, AccountStats, Direction, PayoutMethod, PayoutRecord, Position, PricePoint, Treasury,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub rules: LedgerRules,
    pub market: PriceGeneratorConfig,
    pub history_capacity: usize,
    /// Fixed RNG seed for the price walk
    pub seed: Option<u64>,
    pub initial_cash: f64,
    pub admin_key: String,
    pub enforce_expiry: bool,
    pub demo_deposit: f64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rules: LedgerRules::default(),
            market: PriceGeneratorConfig::default(),
            history_capacity: 50,
            seed: None,
            initial_cash: 1000.0,
            admin_key: "admin123".to_string(),
            enforce_expiry: false,
            demo_deposit: 50.0,
        }
    }
}

impl From<&AppConfig> for ExchangeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            rules: config.ledger_rules(),
            market: config.price_generator(),
            history_capacity: config.market.history_capacity,
            seed: config.market.seed,
            initial_cash: config.wallet.initial_cash,
            admin_key: config.treasury.admin_key.clone(),
            enforce_expiry: config.mining.enforce_expiry,
            demo_deposit: config.wallet.demo_deposit,
        }
    }
}

/// Change notifications for live views
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ExchangeEvent {
    PriceTick(PricePoint),
    PositionOpened(Position),
    PositionsSettled(SettlementBatch),
    AccountUpdated(Account),
    SubscriptionExpired { expired_at: i64 },
}

/// Everything the user-facing views render
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeSnapshot {
    pub account: Account,
    pub stats: AccountStats,
    pub treasury: TreasurySummary,
    pub current_price: f64,
    pub payout_multiplier: f64,
    pub durations_secs: Vec<u64>,
    pub subscription_price: f64,
    pub withdrawal_fee: f64,
    pub timestamp: i64,
}

/// Treasury totals without the payout log
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasurySummary {
    pub total_revenue: f64,
    pub subscription_sale_count: u32,
    pub withdrawal_fee_count: u32,
    pub total_paid_out: f64,
}

impl From<&Treasury> for TreasurySummary {
    fn from(treasury: &Treasury) -> Self {
        Self {
            total_revenue: treasury.total_revenue,
            subscription_sale_count: treasury.subscription_sale_count,
            withdrawal_fee_count: treasury.withdrawal_fee_count,
            total_paid_out: treasury.total_paid_out(),
        }
    }
}

struct ExchangeState {
    account: Account,
    treasury: Treasury,
    generator: PriceGenerator,
    history: PriceHistory,
}

pub struct Exchange {
    config: ExchangeConfig,
    state: Mutex<ExchangeState>,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn SnapshotStore>>,
    journal: Option<Arc<CsvJournal>>,
    events: broadcast::Sender<ExchangeEvent>,
}

impl Exchange {
    pub fn new(config: ExchangeConfig) -> Self {
        let generator = match config.seed {
            Some(seed) => PriceGenerator::seeded(config.market, seed),
            None => PriceGenerator::new(config.market),
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            state: Mutex::new(ExchangeState {
                account: Account::with_cash(config.initial_cash),
                treasury: Treasury::default(),
                generator,
                history: PriceHistory::new(config.history_capacity),
            }),
            config,
            clock: Arc::new(SystemClock),
            store: None,
            journal: None,
            events,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach snapshot storage and restore any prior state from it
    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        {
            let state = self
                .state
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            match store.load_account() {
                Some(account) => {
                    info!(
                        cash = %format!("${:.2}", account.cash_balance),
                        tokens = account.token_balance,
                        positions = account.positions.len(),
                        subscribed = account.subscription_active,
                        "💾 Account restored"
                    );
                    state.account = account;
                }
                None => info!("💾 Fresh account"),
            }
            if let Some(treasury) = store.load_treasury() {
                info!(
                    revenue = %format!("${:.2}", treasury.total_revenue),
                    payouts = treasury.payout_log.len(),
                    "💾 Treasury restored"
                );
                state.treasury = treasury;
            }
        }
        self.store = Some(store);
        self
    }

    pub fn with_journal(mut self, journal: Arc<CsvJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ExchangeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish while the caller still holds the state guard, so receivers
    /// see events in the order the mutations were applied.
    fn emit(&self, _state: &ExchangeState, event: ExchangeEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn persist_account(&self, account: &Account) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_account(account) {
                error!(error = %e, "💾 Failed to save account snapshot");
            }
        }
    }

    fn persist_treasury(&self, treasury: &Treasury) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_treasury(treasury) {
                error!(error = %e, "💾 Failed to save treasury snapshot");
            }
        }
    }

    // ── Periodic processes ──────────────────────────────────────

    /// Advance the random walk one step and record the sample
    pub fn tick_price(&self) -> PricePoint {
        let now = self.clock.now_ms();
        let point = {
            let mut state = self.lock();
            let price = state.generator.next_price();
            let point = PricePoint::new(now, price);
            state.history.push(point.clone());
            self.emit(&state, ExchangeEvent::PriceTick(point.clone()));
            point
        };
        debug!(price = point.price, "📈 Price tick");
        point
    }

    /// Settle every due position against one price snapshot.
    ///
    /// Nothing is written when no position is due.
    pub fn settle(&self) -> SettlementBatch {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        let current_price = state.generator.price();
        let batch = state.account.settle(current_price, now);
        if batch.is_empty() {
            return batch;
        }

        self.persist_account(&state.account);
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_settlements(&batch.settled, now) {
                warn!(error = %e, "Failed to journal settlements");
            }
        }
        let account = state.account.clone();
        self.emit(&state, ExchangeEvent::PositionsSettled(batch.clone()));
        self.emit(&state, ExchangeEvent::AccountUpdated(account.clone()));
        drop(state);

        info!(
            settled = batch.settled.len(),
            wins = batch.wins(),
            losses = batch.losses(),
            exit_price = batch.exit_price,
            credit = %format!("${:.2}", batch.credit),
            cash = %format!("${:.2}", account.cash_balance),
            "⚖️ Positions settled"
        );
        batch
    }

    /// Credit one mining tick. Returns true if tokens accrued.
    pub fn accrue(&self) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.lock();

        if self.config.enforce_expiry
            && state.account.subscription_active
            && state.account.subscription_expired(now)
        {
            state.account.subscription_active = false;
            self.persist_account(&state.account);
            let expired_at = state.account.subscription_expires_at.unwrap_or(now);
            self.emit(&state, ExchangeEvent::SubscriptionExpired { expired_at });
            drop(state);
            info!(expired_at, "⛏️ Subscription expired, mining stopped");
            return false;
        }

        if !state.account.accrue(&self.config.rules) {
            return false;
        }
        self.persist_account(&state.account);
        let tokens = state.account.token_balance;
        self.emit(&state, ExchangeEvent::AccountUpdated(state.account.clone()));
        drop(state);

        debug!(tokens, "⛏️ Accrued");
        true
    }

    // ── User operations ─────────────────────────────────────────

    pub fn open_position(
        &self,
        stake: f64,
        direction: Direction,
        duration_seconds: u64,
    ) -> LedgerResult<Position> {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        let entry_price = state.generator.price();
        let position = state.account.open_position(
            &self.config.rules,
            stake,
            direction,
            duration_seconds,
            entry_price,
            now,
        )?;
        self.persist_account(&state.account);
        self.emit(&state, ExchangeEvent::PositionOpened(position.clone()));
        self.emit(&state, ExchangeEvent::AccountUpdated(state.account.clone()));
        drop(state);

        info!(
            id = %position.id,
            direction = %position.direction,
            stake = %format!("${:.2}", position.stake),
            entry = position.entry_price,
            duration_s = position.duration_seconds,
            "🎯 Position opened"
        );
        Ok(position)
    }

    /// Buy the mining subscription. Returns the recorded expiry.
    pub fn subscribe(&self) -> LedgerResult<i64> {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        let price = state
            .account
            .purchase_subscription(&self.config.rules, now)?;
        state.treasury.record_subscription_sale(price);
        self.persist_account(&state.account);
        self.persist_treasury(&state.treasury);
        let expires_at = state.account.subscription_expires_at.unwrap_or(now);
        self.emit(&state, ExchangeEvent::AccountUpdated(state.account.clone()));
        drop(state);

        info!(price = %format!("${:.2}", price), expires_at, "⛏️ Mining subscription purchased");
        Ok(expires_at)
    }

    pub fn cancel_subscription(&self) -> LedgerResult<()> {
        let mut state = self.lock();
        state.account.cancel_subscription()?;
        self.persist_account(&state.account);
        self.emit(&state, ExchangeEvent::AccountUpdated(state.account.clone()));
        drop(state);

        info!("⛏️ Mining subscription cancelled");
        Ok(())
    }

    /// Withdraw cash; the fixed fee goes to the treasury. Returns the new balance.
    pub fn withdraw(&self, amount: f64) -> LedgerResult<f64> {
        let mut state = self.lock();
        let fee = state.account.withdraw(&self.config.rules, amount)?;
        state.treasury.record_withdrawal_fee(fee);
        self.persist_account(&state.account);
        self.persist_treasury(&state.treasury);
        let balance = state.account.cash_balance;
        self.emit(&state, ExchangeEvent::AccountUpdated(state.account.clone()));
        drop(state);

        info!(
            amount = %format!("${:.2}", amount),
            fee = %format!("${:.2}", fee),
            cash = %format!("${:.2}", balance),
            "💸 Withdrawal"
        );
        Ok(balance)
    }

    /// Credit cash. Returns the new balance.
    pub fn deposit(&self, amount: f64) -> LedgerResult<f64> {
        let mut state = self.lock();
        let balance = state.account.deposit(amount)?;
        self.persist_account(&state.account);
        self.emit(&state, ExchangeEvent::AccountUpdated(state.account.clone()));
        drop(state);

        info!(amount = %format!("${:.2}", amount), cash = %format!("${:.2}", balance), "💰 Deposit");
        Ok(balance)
    }

    /// The fixed demo deposit offered by the wallet view
    pub fn demo_deposit(&self) -> LedgerResult<f64> {
        self.deposit(self.config.demo_deposit)
    }

    // ── Admin ───────────────────────────────────────────────────

    /// Plaintext comparison against the configured key. Cosmetic gate only.
    pub fn verify_admin(&self, key: &str) -> LedgerResult<()> {
        if key == self.config.admin_key {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized)
        }
    }

    pub fn admin_payout(
        &self,
        key: &str,
        amount: f64,
        method: PayoutMethod,
    ) -> LedgerResult<PayoutRecord> {
        self.verify_admin(key)?;
        let now = self.clock.now_ms();
        let mut state = self.lock();
        let record = state.treasury.payout(amount, method, now)?;
        self.persist_treasury(&state.treasury);
        let revenue_after = state.treasury.total_revenue;
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_payout(&record, revenue_after) {
                warn!(error = %e, "Failed to journal payout");
            }
        }
        drop(state);

        info!(
            amount = %format!("${:.2}", record.amount),
            method = %record.method,
            revenue = %format!("${:.2}", revenue_after),
            "🏦 Treasury payout"
        );
        Ok(record)
    }

    pub fn treasury(&self, key: &str) -> LedgerResult<Treasury> {
        self.verify_admin(key)?;
        Ok(self.lock().treasury.clone())
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn current_price(&self) -> f64 {
        self.lock().generator.price()
    }

    /// Operator hook: pin the walk to `price` (clamped to the floor; non-finite
    /// values are ignored). The next tick continues from it and open positions
    /// settle against it. Returns the price now in effect.
    pub fn override_price(&self, price: f64) -> f64 {
        let mut state = self.lock();
        state.generator.reset_to(price);
        let current = state.generator.price();
        drop(state);
        info!(requested = price, price = current, "📌 Price overridden");
        current
    }

    pub fn price_history(&self) -> Vec<PricePoint> {
        self.lock().history.to_vec()
    }

    pub fn account(&self) -> Account {
        self.lock().account.clone()
    }

    pub fn stats(&self) -> AccountStats {
        AccountStats::from_positions(&self.lock().account.positions)
    }

    pub fn snapshot(&self) -> ExchangeSnapshot {
        let state = self.lock();
        ExchangeSnapshot {
            stats: AccountStats::from_positions(&state.account.positions),
            account: state.account.clone(),
            treasury: TreasurySummary::from(&state.treasury),
            current_price: state.generator.price(),
            payout_multiplier: self.config.rules.payout_multiplier,
            durations_secs: self.config.rules.durations_secs.clone(),
            subscription_price: self.config.rules.subscription_price,
            withdrawal_fee: self.config.rules.withdrawal_fee,
            timestamp: self.clock.now_ms(),
        }
    }

    pub fn summary_string(&self) -> String {
        let state = self.lock();
        let stats = AccountStats::from_positions(&state.account.positions);
        format!(
            "🪙 G Coin ${:.2} | cash ${:.2} | {:.6} G{} | {}/{} won ({:.0}% WR) | P&L ${:+.2} | {} open | revenue ${:.2}",
            state.generator.price(),
            state.account.cash_balance,
            state.account.token_balance,
            if state.account.subscription_active { " ⛏️" } else { "" },
            stats.wins,
            stats.wins + stats.losses,
            stats.win_rate,
            stats.realized_pnl,
            stats.open,
            state.treasury.total_revenue
        )
    }
}
