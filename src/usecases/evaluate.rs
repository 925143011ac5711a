use crate::config::{PortfolioCfg, Settings, SymbolTable};
use crate::domain::models::{AccountRecord, ActualAllocation, HoldingRecord, Recommendation};
use crate::usecases::aggregate::aggregate;
use crate::usecases::drift::{DriftReport, detect_drift};
use crate::usecases::rebalance::{needs_invest, recommend_investment, recommend_rebalance};

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Uninvested cash above the minimum; takes precedence over drift.
    InvestIdleCash(Recommendation),
    Rebalance {
        report: DriftReport,
        recommendation: Recommendation,
    },
    Balanced,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub name: String,
    pub actual: ActualAllocation,
    pub verdict: Verdict,
}

impl Evaluation {
    /// Notification subject, `None` when nothing needs attention.
    pub fn subject(&self) -> Option<String> {
        match &self.verdict {
            Verdict::InvestIdleCash(_) => Some(format!("Found money in {}", self.name)),
            Verdict::Rebalance { .. } => Some(format!("{} needs rebalance!", self.name)),
            Verdict::Balanced => None,
        }
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        match &self.verdict {
            Verdict::InvestIdleCash(rec) => Some(rec),
            Verdict::Rebalance { recommendation, .. } => Some(recommendation),
            Verdict::Balanced => None,
        }
    }
}

pub fn evaluate(
    portfolio: &PortfolioCfg,
    settings: &Settings,
    symbols: &SymbolTable,
    accounts: &[AccountRecord],
    holdings: &[HoldingRecord],
) -> Evaluation {
    let actual = aggregate(portfolio, symbols, accounts, holdings);

    let verdict = if needs_invest(&actual, settings.min_invest) {
        Verdict::InvestIdleCash(recommend_investment(portfolio, &actual, settings))
    } else {
        let report = detect_drift(&actual, &portfolio.allocation, settings.threshold);
        if report.needs_rebalance() {
            Verdict::Rebalance {
                recommendation: recommend_rebalance(portfolio, &actual, settings),
                report,
            }
        } else {
            Verdict::Balanced
        }
    };

    Evaluation {
        name: portfolio.name.clone(),
        actual,
        verdict,
    }
}
