//! Persistence Module
//!
//! Account and treasury are stored as two independent JSON snapshots, read
//! once at startup and rewritten in full after every mutation. Settlements
//! and admin payouts are additionally appended to CSV journals.

mod journal;

pub use journal::{CsvJournal, PayoutJournalRecord, SettlementJournalRecord};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::{Account, Treasury};

pub const ACCOUNT_SNAPSHOT_FILE: &str = "g_coin_user.json";
pub const TREASURY_SNAPSHOT_FILE: &str = "g_coin_treasury.json";

/// Storage for the two state snapshots.
///
/// Loads return `None` when there is no usable prior state; callers fall
/// back to defaults.
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotStore: Send + Sync {
    fn load_account(&self) -> Option<Account>;
    fn load_treasury(&self) -> Option<Treasury>;
    fn save_account(&self, account: &Account) -> Result<()>;
    fn save_treasury(&self, treasury: &Treasury) -> Result<()>;
}

/// Snapshots as pretty JSON files in a data directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    account_path: PathBuf,
    treasury_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).context("Failed to create data directory")?;

        Ok(Self {
            account_path: data_dir.join(ACCOUNT_SNAPSHOT_FILE),
            treasury_path: data_dir.join(TREASURY_SNAPSHOT_FILE),
        })
    }

    pub fn account_path(&self) -> &Path {
        &self.account_path
    }

    pub fn treasury_path(&self) -> &Path {
        &self.treasury_path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load_account(&self) -> Option<Account> {
        read_snapshot(&self.account_path)
    }

    fn load_treasury(&self) -> Option<Treasury> {
        read_snapshot(&self.treasury_path)
    }

    fn save_account(&self, account: &Account) -> Result<()> {
        write_snapshot(&self.account_path, account)
    }

    fn save_treasury(&self, treasury: &Treasury) -> Result<()> {
        write_snapshot(&self.treasury_path, treasury)
    }
}

/// Missing and corrupt files both mean "no prior state".
fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "💾 No snapshot found, starting fresh");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "💾 Snapshot unreadable, using defaults");
            return None;
        }
    };

    match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "💾 Snapshot corrupt, using defaults");
            None
        }
    }
}

fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize snapshot")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .with_context(|| format!("Failed to write snapshot {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace snapshot {}", path.display()))?;
    debug!(path = %path.display(), "💾 Snapshot saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, PayoutMethod, PayoutRecord, Position, PositionStatus};

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "gcoin_persistence_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    #[test]
    fn missing_snapshots_load_as_none() {
        let dir = temp_data_dir("missing");
        let store = JsonFileStore::new(&dir).unwrap();

        assert!(store.load_account().is_none());
        assert!(store.load_treasury().is_none());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_snapshot_loads_as_none() {
        let dir = temp_data_dir("corrupt");
        let store = JsonFileStore::new(&dir).unwrap();
        fs::write(store.account_path(), "{ not json").unwrap();
        fs::write(store.treasury_path(), r#"{"totalRevenue": "lots"}"#).unwrap();

        assert!(store.load_account().is_none());
        assert!(store.load_treasury().is_none());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn snapshots_survive_a_save_load_cycle() {
        let dir = temp_data_dir("cycle");
        let store = JsonFileStore::new(&dir).unwrap();

        let mut account = Account::with_cash(512.25);
        account.subscription_active = true;
        account.subscription_expires_at = Some(1_700_000_000_000);
        account.positions.push(Position {
            id: "abc".to_string(),
            stake: 10.0,
            entry_price: 1.5,
            direction: Direction::Below,
            opened_at: 1_700_000_000_000,
            duration_seconds: 60,
            status: PositionStatus::Lost,
            payout: 19.0,
            exit_price: Some(1.6),
        });
        let treasury = Treasury {
            total_revenue: 30.99,
            subscription_sale_count: 1,
            withdrawal_fee_count: 1,
            payout_log: vec![PayoutRecord {
                timestamp: 1_700_000_000_000,
                amount: 5.0,
                method: PayoutMethod::CryptoSettlement,
            }],
        };

        store.save_account(&account).unwrap();
        store.save_treasury(&treasury).unwrap();

        assert_eq!(store.load_account(), Some(account));
        assert_eq!(store.load_treasury(), Some(treasury));
        assert!(!store.account_path().with_extension("json.tmp").exists());

        let raw = fs::read_to_string(store.account_path()).unwrap();
        assert!(raw.contains("\"cashBalance\""));
        assert!(raw.contains("\"BELOW\""));

        let _ = fs::remove_dir_all(dir);
    }
}
