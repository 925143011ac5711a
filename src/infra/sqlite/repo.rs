use crate::domain::models::{AllocationRow, AllocationSnapshot, BalanceRow};
use crate::domain::repository::{RepoResult, SnapshotRepo};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, SqlitePool};
use std::str::FromStr;

pub struct SqliteRepo {
    pub pool: SqlitePool,
}

impl SqliteRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `url` and applies migrations.
    pub async fn connect(url: &str) -> RepoResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct BalanceDbRow {
    account: String,
    balance_date: String,
    balance_amount: String,
}

#[async_trait]
impl SnapshotRepo for SqliteRepo {
    async fn upsert_allocation(&self, snap: &AllocationSnapshot) -> RepoResult<()> {
        let allocation = serde_json::to_string(&snap.allocation)?;
        sqlx::query(
            r#"INSERT INTO account_allocations (account, allocation, balance, updated_at)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(account) DO UPDATE SET
                   allocation = excluded.allocation,
                   balance = excluded.balance,
                   updated_at = excluded.updated_at
            "#,
        )
        .bind(&snap.account)
        .bind(allocation)
        .bind(snap.balance.to_string())
        .bind(&snap.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_balance(&self, row: &BalanceRow) -> RepoResult<()> {
        sqlx::query(
            r#"INSERT INTO balances (account, balance_date, balance_amount) VALUES (?1, ?2, ?3)
               ON CONFLICT(account, balance_date) DO UPDATE SET balance_amount = excluded.balance_amount
            "#,
        )
        .bind(&row.account)
        .bind(&row.balance_date)
        .bind(row.balance_amount.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_allocations(&self) -> RepoResult<Vec<AllocationSnapshot>> {
        let rows = sqlx::query_as::<_, AllocationRow>(
            "SELECT account, allocation, balance, updated_at FROM account_allocations ORDER BY account ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(AllocationSnapshot {
                allocation: serde_json::from_str(&row.allocation)?,
                balance: Decimal::from_str(&row.balance)?,
                account: row.account,
                updated_at: row.updated_at,
            });
        }
        Ok(out)
    }

    async fn fetch_balances(&self, account: Option<&str>) -> RepoResult<Vec<BalanceRow>> {
        let mut qb = QueryBuilder::new("SELECT account, balance_date, balance_amount FROM balances");
        if let Some(a) = account {
            qb.push(" WHERE account = ");
            qb.push_bind(a);
        }
        qb.push(" ORDER BY balance_date ASC, account ASC");
        let rows = qb
            .build_query_as::<BalanceDbRow>()
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(BalanceRow {
                balance_amount: Decimal::from_str(&row.balance_amount)?,
                account: row.account,
                balance_date: row.balance_date,
            });
        }
        Ok(out)
    }
}
