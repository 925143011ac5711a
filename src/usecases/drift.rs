use serde::Serialize;

use crate::domain::models::{ActualAllocation, OTHER, TargetAllocation};

/// Acceptance band of one target category, in currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandCheck {
    pub category: String,
    pub actual: f64,
    pub low: f64,
    pub high: f64,
}

impl BandCheck {
    /// Distance outside the band; 0 when inside (edges inclusive).
    pub fn overshoot(&self) -> f64 {
        if self.actual < self.low {
            self.low - self.actual
        } else if self.actual > self.high {
            self.actual - self.high
        } else {
            0.0
        }
    }

    pub fn in_band(&self) -> bool {
        self.actual >= self.low && self.actual <= self.high
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub total: f64,
    pub checks: Vec<BandCheck>,
}

impl DriftReport {
    pub fn needs_rebalance(&self) -> bool {
        self.checks.iter().any(|c| !c.in_band())
    }

    pub fn violations(&self) -> impl Iterator<Item = &BandCheck> {
        self.checks.iter().filter(|c| !c.in_band())
    }

    /// Largest violation by currency distance; ties keep configured order.
    pub fn worst(&self) -> Option<&BandCheck> {
        self.violations().fold(None, |worst: Option<&BandCheck>, c| match worst {
            Some(w) if w.overshoot() >= c.overshoot() => Some(w),
            _ => Some(c),
        })
    }
}

/// Checks every target category against `target% ± target%·tolerance/100`
/// of the total. `other` is exempt and zero-percent targets are never
/// reported as drifting.
pub fn detect_drift(actual: &ActualAllocation, target: &TargetAllocation, tolerance: f64) -> DriftReport {
    let total = actual.total();
    let checks = target
        .iter()
        .filter(|(category, _)| *category != OTHER)
        .map(|(category, pct)| {
            let value = actual.get(category);
            if pct <= 0.0 {
                return BandCheck {
                    category: category.to_string(),
                    actual: value,
                    low: f64::NEG_INFINITY,
                    high: f64::INFINITY,
                };
            }
            BandCheck {
                category: category.to_string(),
                actual: value,
                low: total * (pct - pct * tolerance / 100.0) / 100.0,
                high: total * (pct + pct * tolerance / 100.0) / 100.0,
            }
        })
        .collect();
    DriftReport { total, checks }
}
