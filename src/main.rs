//! G Coin exchange simulator
//!
//! Usage: cargo run --bin gcoin
//! Configure via config/local.yaml or GCOIN__SECTION__KEY env vars.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gcoin::config::AppConfig;
use gcoin::exchange::{Exchange, ExchangeConfig};
use gcoin::persistence::{CsvJournal, JsonFileStore};
use gcoin::scheduler::{Scheduler, SchedulerIntervals};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(config.logging.json);

    info!("🪙 G Coin exchange starting");
    info!(config = %config, "⚙️ Configuration loaded");

    let store = JsonFileStore::new(&config.persistence.data_dir)?;
    let mut exchange = Exchange::new(ExchangeConfig::from(&config)).with_store(Arc::new(store));
    if config.persistence.journal_enabled {
        let journal = CsvJournal::new(&config.persistence.data_dir)?;
        info!(dir = %journal.data_dir().display(), "📒 Journal enabled");
        exchange = exchange.with_journal(Arc::new(journal));
    }
    let exchange = Arc::new(exchange);
    info!("{}", exchange.summary_string());

    let scheduler = Scheduler::start(exchange.clone(), SchedulerIntervals::from(&config));

    run_until_shutdown(exchange.clone(), &config).await?;

    scheduler.shutdown().await;
    info!("{}", exchange.summary_string());
    info!("👋 G Coin exchange stopped");
    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown requested");
}

#[cfg(feature = "dashboard")]
async fn run_until_shutdown(exchange: Arc<Exchange>, config: &AppConfig) -> Result<()> {
    if config.dashboard.enabled {
        gcoin::dashboard::serve(exchange, &config.dashboard.bind_addr, shutdown_signal()).await
    } else {
        shutdown_signal().await;
        Ok(())
    }
}

#[cfg(not(feature = "dashboard"))]
async fn run_until_shutdown(_exchange: Arc<Exchange>, config: &AppConfig) -> Result<()> {
    if config.dashboard.enabled {
        warn!("Dashboard enabled in config but the `dashboard` feature is not compiled in");
    }
    shutdown_signal().await;
    Ok(())
}
