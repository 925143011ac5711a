use config::{Config, File, FileFormat};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

use crate::domain::models::{AssetCategory, NONE, OTHER, TargetAllocation};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to read symbol table: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Global thresholds (`config.yml`).
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Drift tolerance, in percent of each target percentage.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Uninvested balances above this are considered idle cash.
    #[serde(default = "default_min_invest")]
    pub min_invest: f64,
    #[serde(default)]
    pub main: Option<SweepCfg>,
    #[serde(default)]
    pub vesting: Vec<String>,
    /// Preferred fund label per category, shown next to buy recommendations.
    /// Written as a list of `{category, label}` so category case survives
    /// loading (map keys come back lowercased).
    #[serde(default, deserialize_with = "preferred_from_list")]
    pub preferred: HashMap<AssetCategory, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            min_invest: default_min_invest(),
            main: None,
            vesting: Vec::new(),
            preferred: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PreferredFund {
    category: AssetCategory,
    label: String,
}

fn preferred_from_list<'de, D>(deserializer: D) -> Result<HashMap<AssetCategory, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let funds = Vec::<PreferredFund>::deserialize(deserializer)?;
    Ok(funds.into_iter().map(|f| (f.category, f.label)).collect())
}

fn default_threshold() -> f64 {
    5.0
}
fn default_min_invest() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SweepCfg {
    pub account: String,
    pub high: f64,
    pub low: f64,
}

/// Per-portfolio targets and account bindings (`accounts.yml`).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AccountsCfg {
    pub portfolios: Vec<PortfolioCfg>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortfolioCfg {
    pub name: String,
    pub accounts: Vec<AccountBinding>,
    pub allocation: TargetAllocation,
    #[serde(default)]
    pub options: PortfolioOptions,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountBinding {
    pub id: String,
    /// `invest` folds holdings; anything else is the category for the balance.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PortfolioOptions {
    /// Prefer selling a single over-weight category over a full rebalance.
    #[serde(default)]
    pub tax: bool,
}

impl AccountsCfg {
    pub fn portfolio(&self, name: &str) -> Option<&PortfolioCfg> {
        self.portfolios.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Deserialize)]
struct SymbolCsv {
    symbol: String,
    category: String,
}

/// Ticker to category lookup. Unknown tickers resolve to `other`.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    map: HashMap<String, AssetCategory>,
}

impl SymbolTable {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            map: pairs
                .iter()
                .map(|(s, c)| (s.to_string(), c.to_string()))
                .collect(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let mut map = HashMap::new();
        for result in rdr.deserialize() {
            let record: SymbolCsv = result?;
            map.insert(record.symbol, record.category);
        }
        Ok(Self { map })
    }

    pub fn category(&self, symbol: &str) -> &str {
        self.map.get(symbol).map(String::as_str).unwrap_or(OTHER)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Monarch login pulled from the environment (`.env` is honoured).
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        let username =
            std::env::var("MONARCH_USERNAME").map_err(|_| ConfigError::MissingEnv("MONARCH_USERNAME"))?;
        let password =
            std::env::var("MONARCH_PASSWORD").map_err(|_| ConfigError::MissingEnv("MONARCH_PASSWORD"))?;
        Ok(Self { username, password })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Loads `config.yml`; `REBALANCE__THRESHOLD=3` style variables override file values.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let settings: Settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .add_source(
            config::Environment::with_prefix("REBALANCE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    validate_settings(&settings)?;
    Ok(settings)
}

pub fn load_accounts(path: &Path) -> Result<AccountsCfg, ConfigError> {
    let accounts: AccountsCfg = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    validate_accounts(&accounts)?;
    Ok(accounts)
}

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.threshold < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "threshold must be non-negative, got {}",
            settings.threshold
        )));
    }
    if let Some(main) = &settings.main {
        if main.low > main.high {
            return Err(ConfigError::Invalid(format!(
                "main account low mark {} exceeds high mark {}",
                main.low, main.high
            )));
        }
    }
    Ok(())
}

pub fn validate_accounts(accounts: &AccountsCfg) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for p in &accounts.portfolios {
        if !seen.insert(p.name.as_str()) {
            return Err(ConfigError::Invalid(format!("duplicate portfolio {}", p.name)));
        }
        for (category, percent) in p.allocation.iter() {
            if category == NONE || category == OTHER {
                return Err(ConfigError::Invalid(format!(
                    "{}: {} is reserved and cannot be a target category",
                    p.name, category
                )));
            }
            if !(0.0..=100.0).contains(&percent) {
                return Err(ConfigError::Invalid(format!(
                    "{}: target for {} must be within 0..=100, got {}",
                    p.name, category, percent
                )));
            }
        }
    }
    Ok(())
}
