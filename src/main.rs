use anyhow::{Context, Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{Level, error, info};

use monarch_rebalance::api_client::MonarchProvider;
use monarch_rebalance::config::{Credentials, SymbolTable, load_accounts, load_settings};
use monarch_rebalance::csv_history::CsvHistoryRepo;
use monarch_rebalance::infra::sqlite::repo::SqliteRepo;
use monarch_rebalance::notify::{ConsoleNotifier, Notifier, WebhookNotifier};
use monarch_rebalance::overrides::HoldingOverrides;
use monarch_rebalance::usecases::run_service::{RunConfig, RunOptions, RunService};
use monarch_rebalance::usecases::snapshot_service::SnapshotService;

mod args;
use crate::args::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .init();

    let settings = load_settings(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    let accounts = load_accounts(&cli.accounts)
        .with_context(|| format!("reading {}", cli.accounts.display()))?;
    let symbols = SymbolTable::from_path(&cli.symbols)
        .with_context(|| format!("reading {}", cli.symbols.display()))?;
    info!(
        portfolios = accounts.portfolios.len(),
        symbols = symbols.len(),
        threshold = settings.threshold,
        "Loaded configuration"
    );

    let overrides = match &cli.overrides {
        Some(path) => Some(
            HoldingOverrides::from_path(path)
                .map_err(|e| anyhow!("reading {}: {e}", path.display()))?,
        ),
        None => None,
    };

    let notifier: Arc<dyn Notifier> = if cli.local {
        Arc::new(ConsoleNotifier)
    } else {
        let url = std::env::var("NOTIFY_WEBHOOK_URL").context("NOTIFY_WEBHOOK_URL must be set unless --local")?;
        Arc::new(WebhookNotifier::new(url))
    };

    let snapshots = if cli.local {
        None
    } else {
        match std::env::var("DATABASE_URL") {
            Ok(url) => match SqliteRepo::connect(&url).await {
                Ok(repo) => Some(SnapshotService::new(Arc::new(repo))),
                Err(e) => {
                    error!(error = %e, "Error connecting to database; snapshots will be skipped");
                    None
                }
            },
            Err(_) => Some(SnapshotService::new(Arc::new(CsvHistoryRepo::new(&cli.history_dir)))),
        }
    };

    let credentials = Credentials::from_env()?;
    let provider = MonarchProvider::login(&credentials).await?;

    let service = RunService::new(Arc::new(provider), notifier, snapshots);
    let cfg = RunConfig {
        accounts,
        settings,
        symbols,
    };
    let opts = RunOptions {
        local: cli.local,
        debug: cli.debug,
        account: cli.account,
        out_dir: cli.out_dir,
        overrides,
    };
    service.run(&cfg, &opts).await?;
    Ok(())
}
