use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Classification axis shared by targets, symbols and account types.
pub type AssetCategory = String;

/// Bucket for tickers missing from the symbol table.
pub const OTHER: &str = "other";
/// Bucket for uninvested / settlement cash inside investment accounts.
pub const NONE: &str = "none";

// Account as reported by the aggregation API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub name: String,
    pub balance: f64,
    pub kind: String,
}

// Single position inside an investment account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub account_id: String,
    pub symbol: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TargetSlot {
    pub category: AssetCategory,
    pub percent: f64,
}

/// Target percentages in configured order. Every scan over categories
/// iterates in this order.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct TargetAllocation(pub Vec<TargetSlot>);

impl TargetAllocation {
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(category, percent)| TargetSlot {
                    category: category.to_string(),
                    percent: *percent,
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|s| (s.category.as_str(), s.percent))
    }

    pub fn percent(&self, category: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|s| s.category == category)
            .map(|s| s.percent)
    }

    /// Sum of every percentage except the `other` bucket.
    pub fn weight_excluding_other(&self) -> f64 {
        self.iter()
            .filter(|(c, _)| *c != OTHER)
            .map(|(_, p)| p)
            .sum()
    }
}

/// Currency amount per category, folded from one run's accounts and holdings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActualAllocation {
    buckets: Vec<(AssetCategory, f64)>,
    // "none" keyed by owning account id
    uninvested: BTreeMap<String, f64>,
}

impl ActualAllocation {
    /// Seeds a zero bucket for every target category, in target order.
    pub fn seeded(target: &TargetAllocation) -> Self {
        let mut actual = Self::default();
        for (category, _) in target.iter() {
            if category != NONE && actual.position(category).is_none() {
                actual.buckets.push((category.to_string(), 0.0));
            }
        }
        actual
    }

    fn position(&self, category: &str) -> Option<usize> {
        self.buckets.iter().position(|(c, _)| c == category)
    }

    pub fn add(&mut self, category: &str, amount: f64) {
        if category == NONE {
            self.add_uninvested("", amount);
            return;
        }
        match self.position(category) {
            Some(i) => self.buckets[i].1 += amount,
            None => self.buckets.push((category.to_string(), amount)),
        }
    }

    pub fn add_uninvested(&mut self, account_id: &str, amount: f64) {
        *self
            .uninvested
            .entry(account_id.to_string())
            .or_insert(0.0) += amount;
    }

    pub fn get(&self, category: &str) -> f64 {
        if category == NONE {
            return self.uninvested_total();
        }
        self.position(category)
            .map(|i| self.buckets[i].1)
            .unwrap_or(0.0)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&str, f64)> {
        self.buckets.iter().map(|(c, v)| (c.as_str(), *v))
    }

    pub fn uninvested(&self) -> &BTreeMap<String, f64> {
        &self.uninvested
    }

    pub fn uninvested_total(&self) -> f64 {
        self.uninvested.values().sum()
    }

    pub fn total(&self) -> f64 {
        self.buckets.iter().map(|(_, v)| v).sum::<f64>() + self.uninvested_total()
    }

    pub fn total_excluding_other(&self) -> f64 {
        self.total() - self.get(OTHER)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub category: AssetCategory,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub sell: Vec<Trade>,
    pub buy: Vec<Trade>,
}

impl Recommendation {
    pub fn is_empty(&self) -> bool {
        self.sell.is_empty() && self.buy.is_empty()
    }
}

/// Currency value rounded to cents (banker's rounding).
pub fn to_money(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(2)
}

// Decimalized per-account allocation (account_allocations)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSnapshot {
    pub account: String,
    pub allocation: BTreeMap<AssetCategory, Decimal>,
    pub balance: Decimal,
    pub updated_at: String, // RFC3339
}

// Daily balance point (balances)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub account: String,
    pub balance_date: String, // YYYY-MM-DD
    pub balance_amount: Decimal,
}

// Raw sqlite row for account_allocations; decimals and the map are stored as text
#[derive(Debug, Clone, FromRow)]
pub struct AllocationRow {
    pub account: String,
    pub allocation: String,
    pub balance: String,
    pub updated_at: String,
}
