use async_trait::async_trait;
use csv::WriterBuilder;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::models::{AllocationSnapshot, BalanceRow};
use crate::domain::repository::{RepoResult, SnapshotRepo};

const ALLOCATIONS_FILE: &str = "history_allocations.csv";
const BALANCES_FILE: &str = "history_balances.csv";

fn ensure_file_has_header(path: &Path, header: &[&str]) -> Result<(), Box<dyn Error + Send + Sync>> {
    if !path.exists() {
        let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;
        wtr.write_record(header)?;
        wtr.flush()?;
    }
    Ok(())
}

fn append_record(path: &Path, header: &[&str], record: &[&str]) -> Result<(), Box<dyn Error + Send + Sync>> {
    ensure_file_has_header(path, header)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
    wtr.write_record(record)?;
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct AllocationCsv {
    timestamp: String,
    account: String,
    allocation: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct BalanceCsv {
    account: String,
    balance_date: String,
    balance_amount: String,
}

/// Append-only CSV history, used when no database is configured. Readers
/// keep the last row per account (allocations) or per account and date
/// (balances).
pub struct CsvHistoryRepo {
    dir: PathBuf,
}

impl CsvHistoryRepo {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn allocations_path(&self) -> PathBuf {
        self.dir.join(ALLOCATIONS_FILE)
    }

    fn balances_path(&self) -> PathBuf {
        self.dir.join(BALANCES_FILE)
    }
}

#[async_trait]
impl SnapshotRepo for CsvHistoryRepo {
    async fn upsert_allocation(&self, snap: &AllocationSnapshot) -> RepoResult<()> {
        let allocation = serde_json::to_string(&snap.allocation)?;
        append_record(
            &self.allocations_path(),
            &["timestamp", "account", "allocation", "balance"],
            &[&snap.updated_at, &snap.account, &allocation, &snap.balance.to_string()],
        )
    }

    async fn record_balance(&self, row: &BalanceRow) -> RepoResult<()> {
        append_record(
            &self.balances_path(),
            &["account", "balance_date", "balance_amount"],
            &[&row.account, &row.balance_date, &row.balance_amount.to_string()],
        )
    }

    async fn fetch_allocations(&self) -> RepoResult<Vec<AllocationSnapshot>> {
        let path = self.allocations_path();
        if !path.exists() {
            return Ok(vec![]);
        }
        let mut rdr = csv::Reader::from_path(path)?;
        let mut latest: BTreeMap<String, AllocationSnapshot> = BTreeMap::new();
        for result in rdr.deserialize() {
            let rec: AllocationCsv = result?;
            latest.insert(
                rec.account.clone(),
                AllocationSnapshot {
                    account: rec.account,
                    allocation: serde_json::from_str(&rec.allocation)?,
                    balance: Decimal::from_str(rec.balance.trim())?,
                    updated_at: rec.timestamp,
                },
            );
        }
        Ok(latest.into_values().collect())
    }

    async fn fetch_balances(&self, account: Option<&str>) -> RepoResult<Vec<BalanceRow>> {
        let path = self.balances_path();
        if !path.exists() {
            return Ok(vec![]);
        }
        let mut rdr = csv::Reader::from_path(path)?;
        let mut latest: BTreeMap<(String, String), BalanceRow> = BTreeMap::new();
        for result in rdr.deserialize() {
            let rec: BalanceCsv = result?;
            if account.is_some_and(|a| a != rec.account) {
                continue;
            }
            latest.insert(
                (rec.balance_date.clone(), rec.account.clone()),
                BalanceRow {
                    balance_amount: Decimal::from_str(rec.balance_amount.trim())?,
                    account: rec.account,
                    balance_date: rec.balance_date,
                },
            );
        }
        Ok(latest.into_values().collect())
    }
}
