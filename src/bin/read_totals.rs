use anyhow::{Result, anyhow};
use dotenv::dotenv;
use monarch_rebalance::csv_history::CsvHistoryRepo;
use monarch_rebalance::domain::repository::SnapshotRepo;
use monarch_rebalance::infra::sqlite::repo::SqliteRepo;
use std::env;

// Prints the stored allocation snapshots, and the balance series of one
// account when its name is given as the first argument.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv().ok();
    let repo: Box<dyn SnapshotRepo> = match env::var("DATABASE_URL") {
        Ok(url) => {
            println!("Reading {}", url);
            Box::new(SqliteRepo::connect(&url).await.map_err(|e| anyhow!(e))?)
        }
        Err(_) => {
            let dir = env::var("HISTORY_DIR").unwrap_or_else(|_| ".".to_string());
            println!("Reading CSV history in {}", dir);
            Box::new(CsvHistoryRepo::new(dir))
        }
    };

    let snapshots = repo.fetch_allocations().await.map_err(|e| anyhow!(e))?;
    for snap in &snapshots {
        println!("{} ({}): {:.2}", snap.account, snap.updated_at, snap.balance);
        for (category, amount) in &snap.allocation {
            println!("  {:<10} {:>12.2}", category, amount);
        }
    }
    println!("{} accounts", snapshots.len());

    if let Some(account) = env::args().nth(1) {
        let rows = repo
            .fetch_balances(Some(&account))
            .await
            .map_err(|e| anyhow!(e))?;
        for row in rows {
            println!("{} {:.2}", row.balance_date, row.balance_amount);
        }
    }
    Ok(())
}
