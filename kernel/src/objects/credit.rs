use serde::{Deserialize, Serialize};

use common::ChainTime;

use crate::amount::Amount;
use crate::ids::{AccountName, CreditCollateralId, CreditLoanId};

/// Collateral posted by `owner` against a single credit asset, shared
/// across every open loan denominated in that asset (§3.6, §4.7.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCollateral {
  pub id: CreditCollateralId,
  pub owner: AccountName,
  pub collateral: Amount,
  pub created: ChainTime,
}

/// An open borrow position against a credit pool (§3.6, §4.7.1). `is_flash`
/// loans waive the collateral requirement but always accrue exactly one
/// day of interest regardless of elapsed time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLoan {
  pub id: CreditLoanId,
  pub owner: AccountName,
  pub debt: Amount,
  pub collateral: Amount,
  pub is_flash: bool,
  pub liquidation_price_num: u64,
  pub liquidation_price_den: u64,
  pub last_interest_time: ChainTime,
  pub created: ChainTime,
}

impl CreditLoan {
  /// Interest accrued since `last_interest_time`, pro-rated over a
  /// 365-day year; flash loans are always charged exactly one day's worth
  /// (§4.7.1).
  pub fn accrued_interest(&self, now: ChainTime, annual_rate_bps: u64) -> u64 {
    let elapsed_seconds = if self.is_flash {
      common::SECONDS_PER_DAY
    } else {
      now.elapsed_since(self.last_interest_time)
    };
    let debt = self.debt.value.max(0) as u128;
    let numerator = debt * annual_rate_bps as u128 * elapsed_seconds as u128;
    let denominator = crate::config::PERCENT_100 as u128 * common::SECONDS_PER_YEAR as u128;
    (numerator / denominator) as u64
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ids::AssetSymbol;

  #[test]
  fn flash_loan_always_charges_one_day() {
    let loan = CreditLoan {
      id: CreditLoanId(1),
      owner: AccountName::new("alice").unwrap(),
      debt: Amount::new(1_000_000, AssetSymbol::new("COIN")),
      collateral: Amount::zero(AssetSymbol::new("COIN")),
      is_flash: true,
      liquidation_price_num: 1,
      liquidation_price_den: 1,
      last_interest_time: ChainTime::from_unix(0),
      created: ChainTime::from_unix(0),
    };
    let a = loan.accrued_interest(ChainTime::from_unix(1), 2_000);
    let b = loan.accrued_interest(ChainTime::from_unix(common::SECONDS_PER_YEAR), 2_000);
    assert_eq!(a, b);
  }

  #[test]
  fn regular_loan_prorates_by_elapsed_time() {
    let loan = CreditLoan {
      id: CreditLoanId(2),
      owner: AccountName::new("alice").unwrap(),
      debt: Amount::new(1_000_000, AssetSymbol::new("COIN")),
      collateral: Amount::zero(AssetSymbol::new("COIN")),
      is_flash: false,
      liquidation_price_num: 1,
      liquidation_price_den: 1,
      last_interest_time: ChainTime::from_unix(0),
      created: ChainTime::from_unix(0),
    };
    let full_year = loan.accrued_interest(ChainTime::from_unix(common::SECONDS_PER_YEAR), 2_000);
    assert_eq!(full_year, 1_000_000 * 2_000 / 10_000);
    let half_year = loan.accrued_interest(ChainTime::from_unix(common::SECONDS_PER_YEAR / 2), 2_000);
    assert!(half_year < full_year);
  }
}
