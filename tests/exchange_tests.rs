//! End-to-end exchange tests against on-disk snapshots

#[cfg(test)]
mod tests {
    use gcoin::clock::ManualClock;
    use gcoin::config::AppConfig;
    use gcoin::exchange::{Exchange, ExchangeConfig};
    use gcoin::market::PriceGeneratorConfig;
    use gcoin::persistence::{
        CsvJournal, JsonFileStore, SettlementJournalRecord, SnapshotStore,
    };
    use gcoin::types::{Direction, PayoutMethod, PositionStatus};
    use gcoin::LedgerError;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    const T0: i64 = 1_700_000_000_000;

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "gcoin_it_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    fn flat_config() -> ExchangeConfig {
        ExchangeConfig {
            market: PriceGeneratorConfig {
                initial_price: 50.0,
                volatility: 0.0,
                floor: 0.1,
            },
            ..ExchangeConfig::default()
        }
    }

    fn open_exchange(dir: &PathBuf, clock: Arc<ManualClock>) -> Exchange {
        let store = JsonFileStore::new(dir).unwrap();
        let journal = CsvJournal::new(dir).unwrap();
        Exchange::new(flat_config())
            .with_clock(clock)
            .with_store(Arc::new(store))
            .with_journal(Arc::new(journal))
    }

    // ============================================================================
    // Trading
    // ============================================================================

    #[test]
    fn test_win_and_loss_conserve_cash() {
        let clock = Arc::new(ManualClock::new(T0));
        let exchange = Exchange::new(flat_config()).with_clock(clock.clone());

        assert_ok!(exchange.open_position(100.0, Direction::Above, 5));
        assert_ok!(exchange.open_position(200.0, Direction::Below, 5));
        assert_ok!(exchange.open_position(50.0, Direction::Above, 15));
        assert_eq!(exchange.account().cash_balance, 650.0);

        exchange.override_price(55.0);
        clock.advance_ms(5_000);
        let batch = exchange.settle();
        assert_eq!(batch.settled.len(), 2);
        assert_eq!(batch.wins(), 1);
        assert_eq!(batch.losses(), 1);
        assert_eq!(batch.exit_price, 55.0);
        assert_eq!(exchange.account().cash_balance, 650.0 + 190.0);

        // A second pass does not touch settled positions
        assert!(exchange.settle().is_empty());

        let stats = exchange.stats();
        assert_eq!(stats.open, 1);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.realized_pnl, 90.0 - 200.0);
    }

    #[test]
    fn test_tie_loses_both_directions() {
        let clock = Arc::new(ManualClock::new(T0));
        let exchange = Exchange::new(flat_config()).with_clock(clock.clone());

        assert_ok!(exchange.open_position(10.0, Direction::Above, 5));
        assert_ok!(exchange.open_position(10.0, Direction::Below, 5));
        clock.advance_ms(5_000);
        let batch = exchange.settle();

        assert_eq!(batch.losses(), 2);
        assert_eq!(batch.credit, 0.0);
        assert_eq!(exchange.account().cash_balance, 980.0);
    }

    #[test]
    fn test_stake_equal_to_balance_and_over_balance() {
        let config = ExchangeConfig {
            initial_cash: 100.0,
            ..flat_config()
        };
        let exchange = Exchange::new(config);

        let err = assert_err!(exchange.open_position(100.01, Direction::Above, 5));
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_ok!(exchange.open_position(100.0, Direction::Above, 5));
        assert_eq!(exchange.account().cash_balance, 0.0);
    }

    #[test]
    fn test_history_keeps_fifty_newest_positions() {
        let config = ExchangeConfig {
            initial_cash: 10_000.0,
            ..flat_config()
        };
        let exchange = Exchange::new(config);
        let mut ids = Vec::new();
        for _ in 0..55 {
            ids.push(exchange.open_position(1.0, Direction::Below, 300).unwrap().id);
        }

        let account = exchange.account();
        assert_eq!(account.positions.len(), 50);
        assert_eq!(account.positions[0].id, ids[54]);
        assert_eq!(account.positions[49].id, ids[5]);
    }

    // ============================================================================
    // Persistence
    // ============================================================================

    #[test]
    fn test_state_survives_restart() {
        let dir = temp_data_dir("restart");
        let clock = Arc::new(ManualClock::new(T0));
        {
            let exchange = open_exchange(&dir, clock.clone());
            assert_ok!(exchange.subscribe());
            assert_ok!(exchange.open_position(100.0, Direction::Above, 30));
            assert!(exchange.accrue());
            assert_ok!(exchange.withdraw(10.0));
        }

        let exchange = open_exchange(&dir, clock);
        let account = exchange.account();
        assert!(account.subscription_active);
        assert_eq!(account.positions.len(), 1);
        assert_eq!(account.positions[0].status, PositionStatus::Open);
        assert!((account.cash_balance - (1000.0 - 29.99 - 100.0 - 11.0)).abs() < 1e-9);
        assert!((account.token_balance - 0.0001).abs() < 1e-12);

        let treasury = assert_ok!(exchange.treasury("admin123"));
        assert_eq!(treasury.subscription_sale_count, 1);
        assert_eq!(treasury.withdrawal_fee_count, 1);
        assert!((treasury.total_revenue - 30.99).abs() < 1e-9);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_restores_browser_client_snapshots() {
        let dir = temp_data_dir("client");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("g_coin_user.json"),
            r#"{
                "usdBalance": 640.0,
                "gCoinBalance": 0.25,
                "isSubscribed": false,
                "subscriptionExpiry": null,
                "totalMined": 0.25,
                "tradeHistory": [{
                    "id": "x1",
                    "amount": 10,
                    "entryPrice": 1.2,
                    "type": "lower",
                    "startTime": 1700000000000,
                    "duration": 60,
                    "status": "open",
                    "payout": 19
                }]
            }"#,
        )
        .unwrap();
        fs::write(
            dir.join("g_coin_treasury.json"),
            r#"{
                "totalRevenue": 58.98,
                "subscriptionCount": 2,
                "sellFeeCount": 0,
                "withdrawalHistory": [
                    {"date": "2024-01-02T03:04:05Z", "amount": 1.0, "method": "PayPal Admin"}
                ]
            }"#,
        )
        .unwrap();

        let clock = Arc::new(ManualClock::new(T0 + 60_000));
        let exchange = open_exchange(&dir, clock);
        let account = exchange.account();
        assert_eq!(account.cash_balance, 640.0);
        assert_eq!(account.positions[0].direction, Direction::Below);

        // Entry 1.2 vs flat 50.0 feed: BELOW loses
        let batch = exchange.settle();
        assert_eq!(batch.losses(), 1);

        let treasury = assert_ok!(exchange.treasury("admin123"));
        assert_eq!(treasury.subscription_sale_count, 2);
        assert_eq!(treasury.payout_log[0].method, PayoutMethod::PayPalAdmin);
        assert_eq!(treasury.payout_log[0].timestamp, 1_704_164_645_000);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_corrupt_snapshot_falls_back_to_defaults() {
        let dir = temp_data_dir("corrupt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("g_coin_user.json"), "not json at all").unwrap();

        let exchange = open_exchange(&dir, Arc::new(ManualClock::new(T0)));
        let account = exchange.account();
        assert_eq!(account.cash_balance, 1000.0);
        assert!(account.positions.is_empty());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_idle_settlement_leaves_snapshot_untouched() {
        let dir = temp_data_dir("idle");
        let exchange = open_exchange(&dir, Arc::new(ManualClock::new(T0)));
        assert!(exchange.settle().is_empty());
        assert!(!dir.join("g_coin_user.json").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_settlements_and_payouts_are_journaled() {
        let dir = temp_data_dir("journal");
        let clock = Arc::new(ManualClock::new(T0));
        let exchange = open_exchange(&dir, clock.clone());

        assert_ok!(exchange.open_position(100.0, Direction::Above, 5));
        exchange.override_price(60.0);
        clock.advance_ms(5_000);
        exchange.settle();
        assert_ok!(exchange.subscribe());
        assert_ok!(exchange.admin_payout("admin123", 9.99, PayoutMethod::CryptoSettlement));

        let mut reader = csv::Reader::from_path(dir.join("settlements.csv")).unwrap();
        let rows: Vec<SettlementJournalRecord> =
            reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "WON");
        assert_eq!(rows[0].exit_price, 60.0);
        assert_eq!(rows[0].settled_at, T0 + 5_000);

        let payouts = fs::read_to_string(dir.join("payouts.csv")).unwrap();
        assert!(payouts.contains("Crypto Settlement"));

        let store = JsonFileStore::new(&dir).unwrap();
        let treasury = store.load_treasury().unwrap();
        assert!((treasury.total_revenue - 20.0).abs() < 1e-9);

        let _ = fs::remove_dir_all(dir);
    }

    // ============================================================================
    // Configuration
    // ============================================================================

    #[test]
    fn test_exchange_config_follows_app_config() {
        let mut app = AppConfig::defaults().unwrap();
        app.wallet.initial_cash = 250.0;
        app.trading.durations_secs = vec![10];

        let exchange = Exchange::new(ExchangeConfig::from(&app));
        assert_eq!(exchange.account().cash_balance, 250.0);
        let err = assert_err!(exchange.open_position(1.0, Direction::Above, 5));
        assert_eq!(err, LedgerError::UnsupportedDuration(5));
        assert_ok!(exchange.open_position(1.0, Direction::Above, 10));
    }
}
