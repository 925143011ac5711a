use clap::Parser;
use std::path::PathBuf;

/// Fetch Monarch balances and holdings, then recommend rebalancing.
#[derive(Parser, Debug)]
#[command(name = "monarch-rebalance")]
#[command(about = "Get Monarch data and update recommendations", long_about = None)]
pub struct Cli {
    /// Print recommendations locally; skip notifications and persistence.
    #[arg(long)]
    pub local: bool,

    /// Log at debug level and dump the downloaded JSON.
    #[arg(long)]
    pub debug: bool,

    /// Only evaluate this portfolio.
    #[arg(long)]
    pub account: Option<String>,

    /// Portfolio targets and account bindings.
    #[arg(long, default_value = "accounts.yml")]
    pub accounts: PathBuf,

    /// Global thresholds.
    #[arg(long, default_value = "config.yml")]
    pub config: PathBuf,

    /// Ticker to category table (symbol,category).
    #[arg(long, default_value = "symbols.csv")]
    pub symbols: PathBuf,

    /// Manual holding values (account_id,symbol,value).
    #[arg(long)]
    pub overrides: Option<PathBuf>,

    /// Where `--debug` writes raw payloads.
    #[arg(long, default_value = "out")]
    pub out_dir: PathBuf,

    /// Directory for CSV history when DATABASE_URL is unset.
    #[arg(long, default_value = ".")]
    pub history_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_script_layout() {
        let cli = Cli::parse_from(["monarch-rebalance"]);
        assert!(!cli.local);
        assert_eq!(cli.accounts, PathBuf::from("accounts.yml"));
        assert_eq!(cli.account, None);
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from(["monarch-rebalance", "--local", "--debug", "--account", "IRA"]);
        assert!(cli.local && cli.debug);
        assert_eq!(cli.account.as_deref(), Some("IRA"));
    }
}
