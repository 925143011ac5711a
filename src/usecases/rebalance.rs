use tracing::{debug, info};

use crate::config::{PortfolioCfg, Settings};
use crate::domain::models::{ActualAllocation, OTHER, Recommendation, TargetAllocation, Trade};

/// First category, in configured order, whose actual value exceeds its
/// target by more than `threshold` percent of the target. Categories whose
/// target amount is zero are skipped.
pub fn find_sell<'a>(target: &'a TargetAllocation, actual: &ActualAllocation, threshold: f64) -> Option<&'a str> {
    let total = actual.total();
    target
        .iter()
        .filter(|(category, _)| *category != OTHER)
        .find(|(category, pct)| {
            let goal = total * pct / 100.0;
            goal > 0.0 && (actual.get(category) - goal) / goal > threshold / 100.0
        })
        .map(|(category, _)| category)
}

/// Sum of the uninvested balances strictly above `min_invest`.
pub fn idle_cash(actual: &ActualAllocation, min_invest: f64) -> f64 {
    actual
        .uninvested()
        .values()
        .filter(|v| **v > min_invest)
        .sum()
}

pub fn needs_invest(actual: &ActualAllocation, min_invest: f64) -> bool {
    actual.uninvested().values().any(|v| *v > min_invest)
}

// Lowest actual value among unused target categories; ties keep configured order
fn find_min<'a>(actual: &ActualAllocation, target: &'a TargetAllocation, used: &[String]) -> Option<&'a str> {
    target
        .iter()
        .filter(|(category, _)| *category != OTHER && !used.iter().any(|u| u == category))
        .fold(None, |best: Option<(&str, f64)>, (category, _)| {
            let value = actual.get(category);
            match best {
                Some((_, v)) if v <= value => best,
                _ => Some((category, value)),
            }
        })
        .map(|(category, _)| category)
}

/// Greedy waterfill of `available` into the emptiest categories.
///
/// Each round picks the unused category with the lowest current value and
/// buys up to its gap to target, where the target is its share of the
/// non-`other` percentages applied to the total excluding `other`. A
/// category is used at most once, so rounding remainders can stay
/// unallocated. The buys never sum past `available` and are never negative.
pub fn waterfill(
    actual: &ActualAllocation,
    target: &TargetAllocation,
    mut available: f64,
    used: &mut Vec<String>,
) -> Vec<Trade> {
    let base = actual.total_excluding_other();
    let weight = target.weight_excluding_other();
    let mut buys = Vec::new();

    while available > 0.0 {
        let Some(category) = find_min(actual, target, used) else {
            break;
        };
        let pct = target.percent(category).unwrap_or(0.0);
        let gap = if weight > 0.0 {
            (base * pct / weight - actual.get(category)).max(0.0).round()
        } else {
            0.0
        };
        let amount = available.min(gap);
        if amount > 0.0 {
            buys.push(Trade {
                category: category.to_string(),
                amount,
            });
        }
        available -= amount;
        used.push(category.to_string());
    }

    if available > 0.0 {
        debug!(unallocated = available, "Waterfill left funds unallocated");
    }
    buys
}

/// Tax-aware rebalance: sell only the first over-weight category and spread
/// the proceeds, plus idle cash, over the rest.
///
/// The sell leg is the category's excess alone; idle cash only widens the
/// buy budget. Through `evaluate` idle cash is always zero here, since an
/// idle-cash verdict wins before drift is checked.
pub fn recommend_rebalance(portfolio: &PortfolioCfg, actual: &ActualAllocation, settings: &Settings) -> Recommendation {
    if !portfolio.options.tax {
        info!(portfolio = %portfolio.name, "Tax optimisation disabled; no trades suggested");
        return Recommendation::default();
    }
    let target = &portfolio.allocation;
    let Some(sell) = find_sell(target, actual, settings.threshold) else {
        return Recommendation::default();
    };

    let total = actual.total();
    let pct = target.percent(sell).unwrap_or(0.0);
    let excess = actual.get(sell) - total * pct / 100.0;
    let available = (excess + idle_cash(actual, settings.min_invest)).round();

    let mut used = vec![sell.to_string()];
    Recommendation {
        sell: vec![Trade {
            category: sell.to_string(),
            amount: excess.round(),
        }],
        buy: waterfill(actual, target, available, &mut used),
    }
}

/// Buy-only plan for idle cash sitting in investment accounts.
pub fn recommend_investment(portfolio: &PortfolioCfg, actual: &ActualAllocation, settings: &Settings) -> Recommendation {
    let available = idle_cash(actual, settings.min_invest);
    let mut used = Vec::new();
    Recommendation {
        sell: Vec::new(),
        buy: waterfill(actual, &portfolio.allocation, available, &mut used),
    }
}
