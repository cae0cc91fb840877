//! Configuration management for the G Coin exchange
//!
//! Built-in defaults, then optional `config/default` and `config/local`
//! files, then `GCOIN__SECTION__KEY` environment variables (via .env).

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::ledger::LedgerRules;
use crate::market::PriceGeneratorConfig;

/// Longest subscription term accepted from configuration
pub const MAX_SUBSCRIPTION_DAYS: i64 = 3650;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub market: MarketConfig,
    pub trading: TradingConfig,
    pub mining: MiningConfig,
    pub wallet: WalletConfig,
    pub treasury: TreasuryConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Price the walk starts from on a fresh boot
    pub initial_price: f64,
    /// Relative perturbation scale per tick
    pub volatility: f64,
    /// Lowest price the feed can print
    pub price_floor: f64,
    /// Price tick interval in milliseconds
    pub tick_ms: u64,
    /// Chart history length
    pub history_capacity: usize,
    /// Fixed RNG seed (reproducible runs)
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Settlement tick interval in milliseconds
    pub settlement_tick_ms: u64,
    /// Payout as a multiple of stake
    pub payout_multiplier: f64,
    /// Duration menu in seconds
    pub durations_secs: Vec<u64>,
    /// Positions kept in the account history
    pub max_positions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiningConfig {
    pub subscription_price: f64,
    pub subscription_days: i64,
    /// Tokens credited per accrual tick
    pub rate_per_tick: f64,
    /// Accrual tick interval in milliseconds
    pub tick_ms: u64,
    /// Deactivate subscriptions past their recorded expiry
    pub enforce_expiry: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Cash balance of a fresh account
    pub initial_cash: f64,
    pub withdrawal_fee: f64,
    /// Amount credited by the demo deposit button
    pub demo_deposit: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreasuryConfig {
    /// Plaintext admin key. Cosmetic gate only, not a security boundary.
    pub admin_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory
    pub data_dir: String,
    /// Append settlements and payouts to CSV
    pub journal_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines
    pub json: bool,
    /// Status summary interval in seconds (0 disables)
    pub status_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub bind_addr: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::defaults_builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (GCOIN__*)
            .add_source(Environment::with_prefix("GCOIN").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        Self::finish(config)
    }

    /// Built-in defaults only
    pub fn defaults() -> Result<Self> {
        let config = Self::defaults_builder()?
            .build()
            .context("Failed to build configuration")?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self> {
        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn defaults_builder() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            // Market defaults
            .set_default("market.initial_price", 1.0)?
            .set_default("market.volatility", 0.008)?
            .set_default("market.price_floor", 0.1)?
            .set_default("market.tick_ms", 1000)?
            .set_default("market.history_capacity", 50)?
            // Trading defaults
            .set_default("trading.settlement_tick_ms", 500)?
            .set_default("trading.payout_multiplier", 1.90)?
            .set_default("trading.durations_secs", vec![5, 15, 30, 60, 120, 300])?
            .set_default("trading.max_positions", 50)?
            // Mining defaults
            .set_default("mining.subscription_price", 29.99)?
            .set_default("mining.subscription_days", 30)?
            .set_default("mining.rate_per_tick", 0.0001)?
            .set_default("mining.tick_ms", 1000)?
            .set_default("mining.enforce_expiry", false)?
            // Wallet defaults
            .set_default("wallet.initial_cash", 1000.0)?
            .set_default("wallet.withdrawal_fee", 1.0)?
            .set_default("wallet.demo_deposit", 50.0)?
            // Treasury defaults
            .set_default("treasury.admin_key", "admin123")?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.journal_enabled", true)?
            // Logging defaults
            .set_default("logging.json", false)?
            .set_default("logging.status_interval_secs", 30)?
            // Dashboard defaults
            .set_default("dashboard.enabled", true)?
            .set_default("dashboard.bind_addr", "127.0.0.1:3001")?;
        Ok(builder)
    }

    /// Reject settings the simulation cannot run with
    pub fn validate(&self) -> Result<()> {
        let market = &self.market;
        if !(market.price_floor.is_finite() && market.price_floor > 0.0) {
            bail!("market.price_floor must be positive");
        }
        if !(0.0..=1.0).contains(&market.volatility) {
            bail!("market.volatility must be within [0, 1]");
        }
        if market.history_capacity == 0 || self.trading.max_positions == 0 {
            bail!("history and position capacities must be positive");
        }
        if market.tick_ms == 0 || self.trading.settlement_tick_ms == 0 || self.mining.tick_ms == 0
        {
            bail!("tick intervals must be positive");
        }
        if self.trading.durations_secs.is_empty() || self.trading.durations_secs.contains(&0) {
            bail!("trading.durations_secs must be a non-empty list of positive durations");
        }
        if !(self.trading.payout_multiplier.is_finite() && self.trading.payout_multiplier > 0.0) {
            bail!("trading.payout_multiplier must be positive");
        }
        if self.mining.subscription_price < 0.0 || self.wallet.withdrawal_fee < 0.0 {
            bail!("prices and fees must not be negative");
        }
        if !(1..=MAX_SUBSCRIPTION_DAYS).contains(&self.mining.subscription_days) {
            bail!(
                "mining.subscription_days must be within 1..={}",
                MAX_SUBSCRIPTION_DAYS
            );
        }
        if !(self.mining.rate_per_tick.is_finite() && self.mining.rate_per_tick >= 0.0) {
            bail!("mining.rate_per_tick must be a non-negative number");
        }
        if !(self.wallet.demo_deposit.is_finite() && self.wallet.demo_deposit > 0.0) {
            bail!("wallet.demo_deposit must be positive");
        }
        if !(self.wallet.initial_cash.is_finite() && self.wallet.initial_cash >= 0.0) {
            bail!("wallet.initial_cash must not be negative");
        }
        Ok(())
    }

    pub fn ledger_rules(&self) -> LedgerRules {
        LedgerRules {
            payout_multiplier: self.trading.payout_multiplier,
            durations_secs: self.trading.durations_secs.clone(),
            max_positions: self.trading.max_positions,
            subscription_price: self.mining.subscription_price,
            subscription_days: self.mining.subscription_days,
            rate_per_tick: self.mining.rate_per_tick,
            withdrawal_fee: self.wallet.withdrawal_fee,
        }
    }

    pub fn price_generator(&self) -> PriceGeneratorConfig {
        PriceGeneratorConfig {
            initial_price: self.market.initial_price,
            volatility: self.market.volatility,
            floor: self.market.price_floor,
        }
    }

    /// Generate a digest of the config (without the admin key) for logging
    pub fn digest(&self) -> String {
        format!(
            "price={:.2} vol={} ticks={}ms/{}ms/{}ms payout={}x sub=${:.2} fee=${:.2} data_dir={}",
            self.market.initial_price,
            self.market.volatility,
            self.market.tick_ms,
            self.trading.settlement_tick_ms,
            self.mining.tick_ms,
            self.trading.payout_multiplier,
            self.mining.subscription_price,
            self.wallet.withdrawal_fee,
            self.persistence.data_dir
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
