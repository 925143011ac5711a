use crate::config::SweepCfg;
use crate::domain::models::AccountRecord;

/// Balances at or below this are treated as empty.
pub const VESTING_EPSILON: f64 = 0.01;

/// Amount to move out of (positive) or into (negative) the main checking
/// account to bring it back to the middle of `[low, high]`. Zero inside the
/// range or when the account is not in the response.
pub fn sweep_amount(accounts: &[AccountRecord], main: &SweepCfg) -> f64 {
    let Some(account) = accounts.iter().find(|a| a.id == main.account) else {
        return 0.0;
    };
    let half = (main.high - main.low) / 2.0;
    if account.balance > main.high {
        account.balance - main.high + half
    } else if account.balance < main.low {
        account.balance - main.low - half
    } else {
        0.0
    }
}

/// Configured vesting accounts currently holding shares.
pub fn vested_accounts<'a>(accounts: &'a [AccountRecord], vesting_ids: &[String]) -> Vec<&'a AccountRecord> {
    accounts
        .iter()
        .filter(|a| vesting_ids.iter().any(|id| *id == a.id) && a.balance > VESTING_EPSILON)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, balance: f64) -> AccountRecord {
        AccountRecord {
            id: id.to_string(),
            name: id.to_string(),
            balance,
            kind: "depository".to_string(),
        }
    }

    fn main_cfg() -> SweepCfg {
        SweepCfg {
            account: "chk".to_string(),
            high: 5000.0,
            low: 2000.0,
        }
    }

    #[test]
    fn no_sweep_inside_range_including_edges() {
        for balance in [2000.0, 3500.0, 5000.0] {
            assert_eq!(sweep_amount(&[account("chk", balance)], &main_cfg()), 0.0);
        }
    }

    #[test]
    fn withdraws_down_to_midpoint_above_high() {
        // 6000 - 5000 + 1500
        assert_eq!(sweep_amount(&[account("chk", 6000.0)], &main_cfg()), 2500.0);
    }

    #[test]
    fn deposits_up_to_midpoint_below_low() {
        // 1000 - 2000 - 1500
        assert_eq!(sweep_amount(&[account("chk", 1000.0)], &main_cfg()), -2500.0);
    }

    #[test]
    fn missing_main_account_is_zero() {
        assert_eq!(sweep_amount(&[account("other", 99999.0)], &main_cfg()), 0.0);
    }

    #[test]
    fn vesting_ignores_dust_and_unconfigured_accounts() {
        let accounts = vec![account("v1", 0.01), account("v2", 12.0), account("x", 500.0)];
        let ids = vec!["v1".to_string(), "v2".to_string()];
        let vested = vested_accounts(&accounts, &ids);
        assert_eq!(vested.len(), 1);
        assert_eq!(vested[0].id, "v2");
        assert!(vested_accounts(&accounts, &[]).is_empty());
    }
}
