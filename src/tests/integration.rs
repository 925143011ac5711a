use crate::api_client::MockFinanceProvider;
use crate::config::{AccountBinding, AccountsCfg, PortfolioCfg, PortfolioOptions, Settings, SweepCfg, SymbolTable};
use crate::domain::models::{AccountRecord, HoldingRecord, TargetAllocation};
use crate::domain::repository::SnapshotRepo;
use crate::domain::repository::testing::FailingRepo;
use crate::infra::sqlite::repo::SqliteRepo;
use crate::notify::testing::RecordingNotifier;
use crate::overrides::HoldingOverrides;
use crate::usecases::evaluate::Verdict;
use crate::usecases::run_service::{RunConfig, RunError, RunOptions, RunService};
use crate::usecases::snapshot_service::SnapshotService;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

fn account(id: &str, name: &str, balance: f64) -> AccountRecord {
    AccountRecord {
        id: id.to_string(),
        name: name.to_string(),
        balance,
        kind: String::new(),
    }
}

fn holding(account: &str, symbol: &str, value: f64) -> HoldingRecord {
    HoldingRecord {
        account_id: account.to_string(),
        symbol: Some(symbol.to_string()),
        value,
    }
}

fn portfolio(name: &str, bindings: &[(&str, &str)]) -> PortfolioCfg {
    PortfolioCfg {
        name: name.to_string(),
        accounts: bindings
            .iter()
            .map(|(id, kind)| AccountBinding {
                id: id.to_string(),
                kind: kind.to_string(),
            })
            .collect(),
        allocation: TargetAllocation::from_pairs(&[("stocks", 80.0), ("bonds", 20.0)]),
        options: PortfolioOptions { tax: true },
    }
}

fn run_config() -> RunConfig {
    RunConfig {
        accounts: AccountsCfg {
            portfolios: vec![
                portfolio("Brokerage", &[("10", "invest")]),
                portfolio("IRA", &[("20", "invest")]),
                portfolio("Roth", &[("30", "invest")]),
            ],
        },
        settings: Settings {
            main: Some(SweepCfg {
                account: "chk".to_string(),
                high: 5000.0,
                low: 2000.0,
            }),
            vesting: vec!["rsu".to_string()],
            ..Settings::default()
        },
        symbols: SymbolTable::from_pairs(&[("VTI", "stocks"), ("BND", "bonds"), ("SPAXX", "none")]),
    }
}

fn provider() -> MockFinanceProvider {
    MockFinanceProvider::new(
        vec![
            account("10", "Brokerage", 0.0),
            account("20", "IRA", 0.0),
            account("30", "Roth", 0.0),
            account("chk", "Checking", 6000.0),
            account("rsu", "RSU", 812.34),
        ],
        vec![
            // drifted: bonds at 30%
            holding("10", "VTI", 7000.0),
            holding("10", "BND", 3000.0),
            // balanced
            holding("20", "VTI", 8000.0),
            holding("20", "BND", 2000.0),
            // idle cash
            holding("30", "VTI", 400.0),
            holding("30", "BND", 100.0),
            holding("30", "SPAXX", 250.0),
        ],
    )
}

async fn memory_repo() -> Arc<SqliteRepo> {
    Arc::new(SqliteRepo::connect("sqlite::memory:").await.expect("in-memory db"))
}

#[tokio::test]
async fn full_run_notifies_and_persists_every_portfolio() {
    let repo = memory_repo().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let service = RunService::new(
        Arc::new(provider()),
        notifier.clone(),
        Some(SnapshotService::new(repo.clone())),
    );

    let summary = service.run(&run_config(), &RunOptions::default()).await.unwrap();

    assert_eq!(summary.evaluations.len(), 3);
    assert!(matches!(summary.evaluations[0].verdict, Verdict::Rebalance { .. }));
    assert_eq!(summary.evaluations[1].verdict, Verdict::Balanced);
    assert!(matches!(summary.evaluations[2].verdict, Verdict::InvestIdleCash(_)));
    assert_eq!(summary.persisted, 3);
    assert_eq!(summary.sweep, 2500.0);
    assert_eq!(summary.vested, vec!["rsu".to_string()]);

    let sent = notifier.sent.lock().unwrap().clone();
    let subjects: Vec<_> = sent.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(
        subjects,
        vec![
            "Brokerage needs rebalance!",
            "Found money in Roth",
            "Main account needs sweep",
            "Vested shares in RSU",
        ]
    );
    assert!(sent[0].1.contains("SELL:\n bonds: 1000.00\n"));
    assert!(sent[0].1.contains("Worst drift: bonds"));
    assert_eq!(sent[2].1, "Withdraw 2500.00 out of checking");

    let rows = repo.fetch_allocations().await.unwrap();
    assert_eq!(rows.len(), 3);
    let roth = rows.iter().find(|r| r.account == "Roth").unwrap();
    assert_eq!(roth.balance, Decimal::from_str("750.00").unwrap());
    assert_eq!(roth.allocation["none"], Decimal::from_str("250.00").unwrap());
    assert_eq!(repo.fetch_balances(Some("IRA")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_snapshot_is_skipped_and_run_continues() {
    let repo = Arc::new(FailingRepo::new("Brokerage"));
    let notifier = Arc::new(RecordingNotifier::default());
    let service = RunService::new(
        Arc::new(provider()),
        notifier.clone(),
        Some(SnapshotService::new(repo.clone())),
    );

    let summary = service.run(&run_config(), &RunOptions::default()).await.unwrap();

    assert_eq!(summary.evaluations.len(), 3);
    assert_eq!(summary.persisted, 2);
    let stored: Vec<_> = repo
        .fetch_allocations()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.account)
        .collect();
    assert_eq!(stored, vec!["IRA".to_string(), "Roth".to_string()]);

    let sent = notifier.sent.lock().unwrap().clone();
    let subjects: Vec<_> = sent.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(
        subjects,
        vec![
            "Brokerage needs rebalance!",
            "Found money in Roth",
            "Main account needs sweep",
            "Vested shares in RSU",
        ]
    );
}

#[tokio::test]
async fn local_run_sends_and_stores_nothing() {
    let repo = memory_repo().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let service = RunService::new(
        Arc::new(provider()),
        notifier.clone(),
        Some(SnapshotService::new(repo.clone())),
    );
    let opts = RunOptions {
        local: true,
        ..RunOptions::default()
    };

    let summary = service.run(&run_config(), &opts).await.unwrap();

    assert_eq!(summary.persisted, 0);
    assert!(notifier.sent.lock().unwrap().is_empty());
    assert!(repo.fetch_allocations().await.unwrap().is_empty());
}

#[tokio::test]
async fn single_account_and_overrides() {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = RunService::new(Arc::new(provider()), notifier.clone(), None);
    let mut overrides = HoldingOverrides::default();
    overrides.insert("10", "BND", 2000.0);
    overrides.insert("10", "VTI", 8000.0);
    let opts = RunOptions {
        account: Some("Brokerage".to_string()),
        overrides: Some(overrides),
        ..RunOptions::default()
    };

    let summary = service.run(&run_config(), &opts).await.unwrap();

    assert_eq!(summary.evaluations.len(), 1);
    assert_eq!(summary.evaluations[0].verdict, Verdict::Balanced);
    // no repository configured: the run still completes
    assert_eq!(summary.persisted, 0);
}

#[tokio::test]
async fn unknown_account_is_rejected_before_fetching() {
    let service = RunService::new(Arc::new(provider()), Arc::new(RecordingNotifier::default()), None);
    let opts = RunOptions {
        account: Some("Nope".to_string()),
        ..RunOptions::default()
    };
    let err = service.run(&run_config(), &opts).await.unwrap_err();
    assert!(matches!(err, RunError::UnknownPortfolio(name) if name == "Nope"));
}

#[tokio::test]
async fn debug_run_dumps_raw_payloads() {
    let dir = tempfile::tempdir().unwrap();
    let service = RunService::new(Arc::new(provider()), Arc::new(RecordingNotifier::default()), None);
    let opts = RunOptions {
        local: true,
        debug: true,
        out_dir: dir.path().join("out"),
        ..RunOptions::default()
    };
    service.run(&run_config(), &opts).await.unwrap();
    assert!(dir.path().join("out/accounts.json").exists());
    assert!(dir.path().join("out/holdings.json").exists());
}
