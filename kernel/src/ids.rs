use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::KernelError;

/// An account name: 3-16 lowercase alphanumerics plus `-` and `.` (§3.1).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountName(String);

impl AccountName {
  pub fn new(name: impl Into<String>) -> Result<Self, KernelError> {
    let name = name.into();
    let len = name.chars().count();
    if !(3..=16).contains(&len) {
      return Err(KernelError::invariant(format!(
        "account name '{name}' must be 3-16 characters"
      )));
    }
    if !name
      .chars()
      .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
      return Err(KernelError::invariant(format!(
        "account name '{name}' contains disallowed characters"
      )));
    }
    Ok(Self(name))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for AccountName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// An asset symbol (§3.2). Reserved prefixes mark derived asset kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetSymbol(String);

pub const LIQUIDITY_ASSET_PREFIX: &str = "POOL.";
pub const CREDIT_ASSET_PREFIX: &str = "CREDIT.";
pub const OPTION_ASSET_PREFIX: &str = "OPTION.";
pub const PREDICTION_ASSET_PREFIX: &str = "PREDICTION.";

impl AssetSymbol {
  pub fn new(symbol: impl Into<String>) -> Self {
    Self(symbol.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn liquidity_pool_symbol(a: &AssetSymbol, b: &AssetSymbol) -> AssetSymbol {
    AssetSymbol(format!("{LIQUIDITY_ASSET_PREFIX}{}.{}", a.as_str(), b.as_str()))
  }

  pub fn credit_pool_symbol(base: &AssetSymbol) -> AssetSymbol {
    AssetSymbol(format!("{CREDIT_ASSET_PREFIX}{}", base.as_str()))
  }
}

impl fmt::Display for AssetSymbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

macro_rules! object_id {
  ($name:ident) => {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct $name(pub u64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", stringify!($name), self.0)
      }
    }
  };
}

object_id!(AccountId);
object_id!(AssetId);
object_id!(LimitOrderId);
object_id!(MarginOrderId);
object_id!(CallOrderId);
object_id!(AuctionOrderId);
object_id!(OptionOrderId);
object_id!(LiquidityPoolId);
object_id!(CreditPoolId);
object_id!(OptionPoolId);
object_id!(PredictionPoolId);
object_id!(CreditCollateralId);
object_id!(CreditLoanId);
object_id!(CommentId);
object_id!(ProducerId);
object_id!(EscrowId);
object_id!(CollateralBidId);
object_id!(SavingsWithdrawId);
object_id!(AssetDelegationExpirationId);
object_id!(RecoveryRequestId);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn account_name_rejects_bad_length_and_charset() {
    assert!(AccountName::new("al").is_err());
    assert!(AccountName::new("alice_smith12345678901234").is_err());
    assert!(AccountName::new("Alice").is_err());
    assert!(AccountName::new("alice.smith-1").is_ok());
  }

  #[test]
  fn liquidity_pool_symbol_is_deterministic() {
    let a = AssetSymbol::new("COIN");
    let b = AssetSymbol::new("USD");
    assert_eq!(
      AssetSymbol::liquidity_pool_symbol(&a, &b).as_str(),
      "POOL.COIN.USD"
    );
  }
}
