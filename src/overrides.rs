use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use tracing::info;

use crate::domain::models::HoldingRecord;

#[derive(Debug, Deserialize)]
struct OverrideCsv {
    account_id: String,
    symbol: String,
    value: f64,
}

/// Manually entered holding values, keyed by (account id, symbol).
#[derive(Debug, Default, Clone)]
pub struct HoldingOverrides {
    values: HashMap<(String, String), f64>,
}

impl HoldingOverrides {
    pub fn from_path(path: &Path) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let mut values = HashMap::new();
        for result in rdr.deserialize() {
            let record: OverrideCsv = result?;
            values.insert((record.account_id, record.symbol), record.value);
        }
        Ok(Self { values })
    }

    pub fn insert(&mut self, account_id: &str, symbol: &str, value: f64) {
        self.values
            .insert((account_id.to_string(), symbol.to_string()), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the holdings with matching values replaced. Holdings without a
    /// ticker are never overridden.
    pub fn apply(&self, holdings: &[HoldingRecord]) -> Vec<HoldingRecord> {
        holdings
            .iter()
            .map(|h| {
                let mut out = h.clone();
                if let Some(symbol) = &h.symbol {
                    let key = (h.account_id.clone(), symbol.clone());
                    if let Some(value) = self.values.get(&key) {
                        info!(account = %h.account_id, symbol = %symbol, old = h.value, new = *value, "Overriding holding value");
                        out.value = *value;
                    }
                }
                out
            })
            .collect()
    }
}
