use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::types::{PayoutRecord, Position};

/// Settled position row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementJournalRecord {
    pub settled_at: i64,
    pub position_id: String,
    pub direction: String,
    pub stake: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub duration_seconds: u64,
    pub status: String,
    pub pnl: f64,
}

impl SettlementJournalRecord {
    pub fn from_position(position: &Position, settled_at: i64) -> Self {
        Self {
            settled_at,
            position_id: position.id.clone(),
            direction: position.direction.to_string(),
            stake: position.stake,
            entry_price: position.entry_price,
            exit_price: position.exit_price.unwrap_or(0.0),
            duration_seconds: position.duration_seconds,
            status: position.status.to_string(),
            pnl: position.realized_pnl().unwrap_or(0.0),
        }
    }
}

/// Admin payout row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutJournalRecord {
    pub timestamp: i64,
    pub amount: f64,
    pub method: String,
    pub revenue_after: f64,
}

impl PayoutJournalRecord {
    pub fn from_record(record: &PayoutRecord, revenue_after: f64) -> Self {
        Self {
            timestamp: record.timestamp,
            amount: record.amount,
            method: record.method.to_string(),
            revenue_after,
        }
    }
}

/// Append-only CSV audit trail
pub struct CsvJournal {
    data_dir: PathBuf,
    settlement_writer: Mutex<csv::Writer<File>>,
    payout_writer: Mutex<csv::Writer<File>>,
}

impl CsvJournal {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        let settlement_writer = Self::create_writer(&data_dir, "settlements.csv")?;
        let payout_writer = Self::create_writer(&data_dir, "payouts.csv")?;

        Ok(Self {
            data_dir,
            settlement_writer: Mutex::new(settlement_writer),
            payout_writer: Mutex::new(payout_writer),
        })
    }

    fn create_writer(dir: &Path, filename: &str) -> Result<csv::Writer<File>> {
        let path = dir.join(filename);
        let file_has_data =
            path.exists() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open CSV file")?;

        Ok(WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn record_settlements(&self, positions: &[Position], settled_at: i64) -> Result<()> {
        let mut writer = self
            .settlement_writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for position in positions {
            writer
                .serialize(SettlementJournalRecord::from_position(position, settled_at))
                .context("Failed to write settlement record")?;
        }
        writer.flush().context("Failed to flush settlement writer")?;
        Ok(())
    }

    pub fn record_payout(&self, record: &PayoutRecord, revenue_after: f64) -> Result<()> {
        let mut writer = self
            .payout_writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writer
            .serialize(PayoutJournalRecord::from_record(record, revenue_after))
            .context("Failed to write payout record")?;
        writer.flush().context("Failed to flush payout writer")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, PayoutMethod, PositionStatus};

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "gcoin_journal_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    fn settled(id: &str, status: PositionStatus) -> Position {
        Position {
            id: id.to_string(),
            stake: 100.0,
            entry_price: 50.0,
            direction: Direction::Above,
            opened_at: 0,
            duration_seconds: 5,
            status,
            payout: 190.0,
            exit_price: Some(55.0),
        }
    }

    #[test]
    fn header_is_written_once_across_reopens() {
        let dir = temp_data_dir("reopen");
        {
            let journal = CsvJournal::new(&dir).unwrap();
            journal
                .record_settlements(&[settled("a", PositionStatus::Won)], 5_000)
                .unwrap();
        }
        {
            let journal = CsvJournal::new(&dir).unwrap();
            journal
                .record_settlements(&[settled("b", PositionStatus::Lost)], 6_000)
                .unwrap();
        }

        let mut reader = csv::Reader::from_path(dir.join("settlements.csv")).unwrap();
        let rows: Vec<SettlementJournalRecord> =
            reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, "WON");
        assert_eq!(rows[0].pnl, 90.0);
        assert_eq!(rows[1].status, "LOST");
        assert_eq!(rows[1].pnl, -100.0);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn payouts_record_method_label() {
        let dir = temp_data_dir("payout");
        let journal = CsvJournal::new(&dir).unwrap();
        let record = PayoutRecord {
            timestamp: 1,
            amount: 12.5,
            method: PayoutMethod::PayPalAdmin,
        };
        journal.record_payout(&record, 7.5).unwrap();

        let raw = fs::read_to_string(dir.join("payouts.csv")).unwrap();
        assert!(raw.starts_with("timestamp,amount,method,revenue_after"));
        assert!(raw.contains("PayPal Admin"));

        let _ = fs::remove_dir_all(dir);
    }
}
