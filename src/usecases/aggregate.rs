use crate::config::{PortfolioCfg, SymbolTable};
use crate::domain::models::{AccountRecord, ActualAllocation, HoldingRecord, NONE};
use tracing::debug;

const INVEST: &str = "invest";

/// Folds the API records bound to `portfolio` into per-category amounts.
///
/// Investment accounts contribute their holdings, classified through the
/// symbol table (unknown tickers land in `other`, cash-like positions in the
/// per-account `none` map). Any other account type contributes its balance to
/// the category named by the type. Bindings whose account is absent from the
/// API response contribute nothing.
pub fn aggregate(
    portfolio: &PortfolioCfg,
    symbols: &SymbolTable,
    accounts: &[AccountRecord],
    holdings: &[HoldingRecord],
) -> ActualAllocation {
    let mut actual = ActualAllocation::seeded(&portfolio.allocation);

    for binding in &portfolio.accounts {
        for account in accounts.iter().filter(|a| a.id == binding.id) {
            debug!(
                account = %account.id,
                api_type = %account.kind,
                binding = %binding.kind,
                "Folding account"
            );
            if binding.kind == INVEST {
                for holding in holdings.iter().filter(|h| h.account_id == account.id) {
                    match holding.symbol.as_deref() {
                        None => actual.add_uninvested(&account.id, holding.value),
                        Some(symbol) => {
                            let category = symbols.category(symbol);
                            if category == NONE {
                                actual.add_uninvested(&account.id, holding.value);
                            } else {
                                actual.add(category, holding.value);
                            }
                        }
                    }
                }
            } else {
                actual.add(&binding.kind, account.balance);
            }
        }
    }

    debug!(portfolio = %portfolio.name, total = actual.total(), "Aggregated allocation");
    actual
}
