use crate::domain::models::{ActualAllocation, AllocationSnapshot, BalanceRow, NONE, to_money};
use crate::domain::repository::SnapshotRepo;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Rounds every bucket to cents; uninvested cash is folded into one `none`
/// entry and the balance is the rounded sum of the unrounded values.
pub fn decimalize(account: &str, actual: &ActualAllocation, ts: DateTime<Utc>) -> AllocationSnapshot {
    let mut allocation: BTreeMap<String, _> = actual
        .buckets()
        .map(|(category, value)| (category.to_string(), to_money(value)))
        .collect();
    allocation.insert(NONE.to_string(), to_money(actual.uninvested_total()));
    AllocationSnapshot {
        account: account.to_string(),
        allocation,
        balance: to_money(actual.total()),
        updated_at: ts.to_rfc3339(),
    }
}

pub struct SnapshotService {
    pub repo: Arc<dyn SnapshotRepo>,
}

impl SnapshotService {
    pub fn new(repo: Arc<dyn SnapshotRepo>) -> Self {
        Self { repo }
    }

    /// Writes the allocation row and today's balance point. A failure in
    /// either write is logged; nothing is rolled back.
    pub async fn persist(&self, account: &str, actual: &ActualAllocation, ts: DateTime<Utc>) -> bool {
        let snap = decimalize(account, actual, ts);
        let mut ok = true;
        if let Err(e) = self.repo.upsert_allocation(&snap).await {
            tracing::error!(error = %e, account, "Failed to store allocation snapshot");
            ok = false;
        }
        let row = BalanceRow {
            account: account.to_string(),
            balance_date: ts.date_naive().format("%Y-%m-%d").to_string(),
            balance_amount: snap.balance,
        };
        if let Err(e) = self.repo.record_balance(&row).await {
            tracing::error!(error = %e, account, "Failed to record balance");
            ok = false;
        }
        if ok {
            tracing::info!(account, balance = %snap.balance, "Stored allocation snapshot");
        }
        ok
    }
}
