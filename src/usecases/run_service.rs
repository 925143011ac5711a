use crate::api_client::{FetchedData, FinanceProvider, ProviderError};
use crate::config::{AccountsCfg, PortfolioCfg, Settings, SymbolTable};
use crate::domain::models::to_money;
use crate::notify::{Notifier, format_recommendation, format_sweep};
use crate::overrides::HoldingOverrides;
use crate::usecases::cash::{sweep_amount, vested_accounts};
use crate::usecases::evaluate::{Evaluation, Verdict, evaluate};
use crate::usecases::snapshot_service::SnapshotService;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("unknown portfolio {0}")]
    UnknownPortfolio(String),

    #[error("failed to write debug dump: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode debug dump: {0}")]
    Json(#[from] serde_json::Error),
}

/// Immutable inputs of one run.
pub struct RunConfig {
    pub accounts: AccountsCfg,
    pub settings: Settings,
    pub symbols: SymbolTable,
}

#[derive(Debug, Default)]
pub struct RunOptions {
    /// Print only: no notifications, no persistence.
    pub local: bool,
    /// Dump the raw API payloads into `out_dir`.
    pub debug: bool,
    pub account: Option<String>,
    pub out_dir: PathBuf,
    pub overrides: Option<HoldingOverrides>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub evaluations: Vec<Evaluation>,
    pub sweep: f64,
    pub vested: Vec<String>,
    pub persisted: usize,
}

pub struct RunService {
    pub provider: Arc<dyn FinanceProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub snapshots: Option<SnapshotService>,
}

impl RunService {
    pub fn new(
        provider: Arc<dyn FinanceProvider>,
        notifier: Arc<dyn Notifier>,
        snapshots: Option<SnapshotService>,
    ) -> Self {
        Self {
            provider,
            notifier,
            snapshots,
        }
    }

    pub async fn run(&self, cfg: &RunConfig, opts: &RunOptions) -> Result<RunSummary, RunError> {
        let selected = select_portfolios(&cfg.accounts, opts.account.as_deref())?;

        let mut data = self.provider.fetch().await?;
        if opts.debug {
            dump_raw(&data, &opts.out_dir)?;
        }
        if let Some(overrides) = &opts.overrides {
            data.holdings = overrides.apply(&data.holdings);
        }

        let mut summary = RunSummary::default();
        for portfolio in selected {
            let evaluation = evaluate(portfolio, &cfg.settings, &cfg.symbols, &data.accounts, &data.holdings);
            debug!(portfolio = %portfolio.name, actual = ?evaluation.actual, "Actual allocation");
            self.report(&evaluation, &cfg.settings, opts.local).await;

            if !opts.local {
                match &self.snapshots {
                    Some(snapshots) => {
                        if snapshots.persist(&portfolio.name, &evaluation.actual, Utc::now()).await {
                            summary.persisted += 1;
                        }
                    }
                    None => warn!(portfolio = %portfolio.name, "Persistence unavailable; skipping snapshot"),
                }
            }
            summary.evaluations.push(evaluation);
        }

        if let Some(main) = &cfg.settings.main {
            summary.sweep = sweep_amount(&data.accounts, main);
            if summary.sweep != 0.0 {
                let message = format_sweep(summary.sweep);
                println!("Main account needs sweep: {message}");
                if !opts.local {
                    self.deliver("Main account needs sweep", &message).await;
                }
            }
        }

        for account in vested_accounts(&data.accounts, &cfg.settings.vesting) {
            let subject = format!("Vested shares in {}", account.name);
            let message = format!("Sell {:.2} of vested shares in {}", to_money(account.balance), account.name);
            println!("{message}");
            if !opts.local {
                self.deliver(&subject, &message).await;
            }
            summary.vested.push(account.id.clone());
        }

        info!(
            portfolios = summary.evaluations.len(),
            persisted = summary.persisted,
            sweep = summary.sweep,
            "Run complete"
        );
        Ok(summary)
    }

    async fn report(&self, evaluation: &Evaluation, settings: &Settings, local: bool) {
        let (Some(subject), Some(rec)) = (evaluation.subject(), evaluation.recommendation()) else {
            println!("{}: OK\n", evaluation.name);
            return;
        };
        let mut message = format!("{subject}\n{}", format_recommendation(rec, &settings.preferred));
        if let Verdict::Rebalance { report, .. } = &evaluation.verdict {
            if let Some(worst) = report.worst() {
                message.push_str(&format!(
                    "Worst drift: {} {:.2} outside [{:.2}, {:.2}]\n",
                    worst.category,
                    to_money(worst.actual),
                    to_money(worst.low),
                    to_money(worst.high)
                ));
            }
        }
        println!("{message}");
        if !local {
            self.deliver(&subject, &message).await;
        }
    }

    async fn deliver(&self, subject: &str, message: &str) {
        if let Err(e) = self.notifier.notify(subject, message).await {
            error!(error = %e, subject, "Failed to send notification");
        }
    }
}

fn select_portfolios<'a>(accounts: &'a AccountsCfg, only: Option<&str>) -> Result<Vec<&'a PortfolioCfg>, RunError> {
    match only {
        Some(name) => accounts
            .portfolio(name)
            .map(|p| vec![p])
            .ok_or_else(|| RunError::UnknownPortfolio(name.to_string())),
        None => Ok(accounts.portfolios.iter().collect()),
    }
}

fn dump_raw(data: &FetchedData, out_dir: &Path) -> Result<(), RunError> {
    std::fs::create_dir_all(out_dir)?;
    std::fs::write(out_dir.join("accounts.json"), serde_json::to_string_pretty(&data.raw_accounts)?)?;
    std::fs::write(out_dir.join("holdings.json"), serde_json::to_string_pretty(&data.raw_holdings)?)?;
    info!(dir = %out_dir.display(), "Wrote raw API payloads");
    Ok(())
}
