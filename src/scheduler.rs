//! Periodic Processes
//!
//! Drives the price walk, the settlement pass and mining accrual on their
//! own tokio intervals. Each tick is one synchronous call into the
//! [`Exchange`], so shutdown never interrupts a half-applied step.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::exchange::Exchange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerIntervals {
    pub price: Duration,
    pub settlement: Duration,
    pub accrual: Duration,
    /// Status summary log; `None` disables it
    pub status: Option<Duration>,
}

impl Default for SchedulerIntervals {
    fn default() -> Self {
        Self {
            price: Duration::from_millis(1000),
            settlement: Duration::from_millis(500),
            accrual: Duration::from_millis(1000),
            status: Some(Duration::from_secs(30)),
        }
    }
}

impl From<&AppConfig> for SchedulerIntervals {
    fn from(config: &AppConfig) -> Self {
        Self {
            price: Duration::from_millis(config.market.tick_ms),
            settlement: Duration::from_millis(config.trading.settlement_tick_ms),
            accrual: Duration::from_millis(config.mining.tick_ms),
            status: (config.logging.status_interval_secs > 0)
                .then(|| Duration::from_secs(config.logging.status_interval_secs)),
        }
    }
}

/// Handle to the running periodic tasks
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn all periodic tasks. Must be called inside a tokio runtime.
    pub fn start(exchange: Arc<Exchange>, intervals: SchedulerIntervals) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(4);

        let ex = exchange.clone();
        handles.push(spawn_ticker(
            "price",
            intervals.price,
            shutdown_rx.clone(),
            move || {
                ex.tick_price();
            },
        ));

        let ex = exchange.clone();
        handles.push(spawn_ticker(
            "settlement",
            intervals.settlement,
            shutdown_rx.clone(),
            move || {
                ex.settle();
            },
        ));

        let ex = exchange.clone();
        handles.push(spawn_ticker(
            "accrual",
            intervals.accrual,
            shutdown_rx.clone(),
            move || {
                ex.accrue();
            },
        ));

        if let Some(period) = intervals.status {
            let ex = exchange;
            handles.push(spawn_ticker("status", period, shutdown_rx, move || {
                info!("{}", ex.summary_string());
            }));
        }

        info!(
            price_ms = intervals.price.as_millis() as u64,
            settlement_ms = intervals.settlement.as_millis() as u64,
            accrual_ms = intervals.accrual.as_millis() as u64,
            "⏱️ Scheduler started"
        );

        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Signal every task to stop and wait for them to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("⏱️ Scheduler stopped");
    }
}

fn spawn_ticker<F>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => on_tick(),
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(task = name, "Ticker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::exchange::ExchangeConfig;
    use crate::market::PriceGeneratorConfig;
    use crate::types::{Direction, PositionStatus};
    use tokio::time::sleep;
    use tokio_test::assert_ok;

    const T0: i64 = 1_700_000_000_000;

    fn flat_exchange(clock: Arc<ManualClock>) -> Arc<Exchange> {
        let config = ExchangeConfig {
            market: PriceGeneratorConfig {
                initial_price: 50.0,
                volatility: 0.0,
                floor: 0.1,
            },
            seed: Some(1),
            ..ExchangeConfig::default()
        };
        Arc::new(Exchange::new(config).with_clock(clock))
    }

    fn quiet_intervals() -> SchedulerIntervals {
        SchedulerIntervals {
            status: None,
            ..SchedulerIntervals::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_drive_price_and_accrual() {
        let exchange = flat_exchange(Arc::new(ManualClock::new(T0)));
        assert_ok!(exchange.subscribe());

        let scheduler = Scheduler::start(exchange.clone(), quiet_intervals());
        sleep(Duration::from_millis(3_050)).await;

        assert_eq!(exchange.price_history().len(), 3);
        let tokens = exchange.account().token_balance;
        assert!((tokens - 0.0003).abs() < 1e-12, "tokens = {tokens}");

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn settlement_tick_resolves_expired_positions() {
        let clock = Arc::new(ManualClock::new(T0));
        let exchange = flat_exchange(clock.clone());
        assert_ok!(exchange.open_position(100.0, Direction::Above, 5));
        exchange.override_price(55.0);

        let scheduler = Scheduler::start(exchange.clone(), quiet_intervals());
        sleep(Duration::from_millis(600)).await;
        assert_eq!(exchange.account().positions[0].status, PositionStatus::Open);

        clock.advance_ms(5_000);
        sleep(Duration::from_millis(500)).await;

        let account = exchange.account();
        assert_eq!(account.positions[0].status, PositionStatus::Won);
        assert_eq!(account.cash_balance, 1090.0);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_all_ticks() {
        let exchange = flat_exchange(Arc::new(ManualClock::new(T0)));
        let scheduler = Scheduler::start(exchange.clone(), quiet_intervals());

        sleep(Duration::from_millis(2_050)).await;
        scheduler.shutdown().await;
        let before = exchange.price_history().len();

        sleep(Duration::from_secs(10)).await;
        assert_eq!(exchange.price_history().len(), before);
        assert_eq!(before, 2);
    }

    #[test]
    fn zero_status_interval_disables_status_log() {
        let mut config = AppConfig::defaults().unwrap();
        config.logging.status_interval_secs = 0;
        let intervals = SchedulerIntervals::from(&config);
        assert_eq!(intervals.status, None);
        assert_eq!(intervals.settlement, Duration::from_millis(500));
    }
}
