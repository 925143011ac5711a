use crate::domain::models::{AllocationSnapshot, BalanceRow};
use async_trait::async_trait;

pub type RepoResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[async_trait]
pub trait SnapshotRepo: Send + Sync {
    // One row per account, replaced on every run
    async fn upsert_allocation(&self, snap: &AllocationSnapshot) -> RepoResult<()>;
    // Time series; a second write on the same date replaces the amount
    async fn record_balance(&self, row: &BalanceRow) -> RepoResult<()>;

    async fn fetch_allocations(&self) -> RepoResult<Vec<AllocationSnapshot>>;
    async fn fetch_balances(&self, account: Option<&str>) -> RepoResult<Vec<BalanceRow>>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Rejects allocation writes for one account and keeps everything else
    /// in memory.
    pub struct FailingRepo {
        pub fail_for: String,
        pub allocations: Mutex<Vec<AllocationSnapshot>>,
        pub balances: Mutex<Vec<BalanceRow>>,
    }

    impl FailingRepo {
        pub fn new(fail_for: &str) -> Self {
            Self {
                fail_for: fail_for.to_string(),
                allocations: Mutex::new(Vec::new()),
                balances: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SnapshotRepo for FailingRepo {
        async fn upsert_allocation(&self, snap: &AllocationSnapshot) -> RepoResult<()> {
            if snap.account == self.fail_for {
                return Err(format!("write rejected for {}", snap.account).into());
            }
            self.allocations.lock().unwrap().push(snap.clone());
            Ok(())
        }

        async fn record_balance(&self, row: &BalanceRow) -> RepoResult<()> {
            self.balances.lock().unwrap().push(row.clone());
            Ok(())
        }

        async fn fetch_allocations(&self) -> RepoResult<Vec<AllocationSnapshot>> {
            Ok(self.allocations.lock().unwrap().clone())
        }

        async fn fetch_balances(&self, account: Option<&str>) -> RepoResult<Vec<BalanceRow>> {
            Ok(self
                .balances
                .lock()
                .unwrap()
                .iter()
                .filter(|r| account.is_none_or(|a| a == r.account))
                .cloned()
                .collect())
        }
    }
}
