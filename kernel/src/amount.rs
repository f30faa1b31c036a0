use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

use crate::error::KernelError;
use crate::ids::AssetSymbol;

/// Fixed-point precision shared by every asset on the chain (§6.5).
pub const PRECISION: u64 = 8;
pub const PRECISION_FACTOR: u64 = 100_000_000;

pub const PERCENT_100: u64 = 100_00; // two implied decimals: 10000 == 100.00%

/// A signed quantity of a named asset. Operation parameters and balance
/// deltas flow through this type; stored sub-balances are plain `u64` and
/// enforce non-negativity (§3.3) at the point they're adjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
  pub symbol: AssetSymbol,
  pub value: i128,
}

impl Amount {
  pub fn new(value: i128, symbol: AssetSymbol) -> Self {
    Self { symbol, value }
  }

  pub fn zero(symbol: AssetSymbol) -> Self {
    Self { symbol, value: 0 }
  }

  pub fn is_zero(&self) -> bool {
    self.value == 0
  }

  pub fn same_asset(&self, other: &Amount) -> bool {
    self.symbol == other.symbol
  }

  pub fn checked_add(&self, other: &Amount) -> Result<Amount, KernelError> {
    if !self.same_asset(other) {
      return Err(KernelError::invariant("cannot add amounts of different assets"));
    }
    let value = self
      .value
      .checked_add(other.value)
      .ok_or_else(|| KernelError::invariant("amount overflow"))?;
    Ok(Amount { symbol: self.symbol.clone(), value })
  }

  pub fn checked_sub(&self, other: &Amount) -> Result<Amount, KernelError> {
    self.checked_add(&other.clone().neg())
  }

  /// `self * numerator / denominator`, rounding down, computed in i128 to
  /// avoid overflow on fee and ratio math (mirrors the original's use of
  /// `uint128_t` in `pool_evaluator.cpp`).
  pub fn mul_div_floor(&self, numerator: u64, denominator: u64) -> Result<Amount, KernelError> {
    if denominator == 0 {
      return Err(KernelError::invariant("division by zero"));
    }
    let value = self
      .value
      .checked_mul(numerator as i128)
      .ok_or_else(|| KernelError::invariant("amount overflow"))?
      / denominator as i128;
    Ok(Amount { symbol: self.symbol.clone(), value })
  }

  pub fn percent(&self, basis_points: u64) -> Result<Amount, KernelError> {
    self.mul_div_floor(basis_points, PERCENT_100)
  }
}

impl Neg for Amount {
  type Output = Amount;
  fn neg(self) -> Amount {
    Amount { symbol: self.symbol, value: -self.value }
  }
}

impl Add for Amount {
  type Output = Result<Amount, KernelError>;
  fn add(self, rhs: Amount) -> Result<Amount, KernelError> {
    self.checked_add(&rhs)
  }
}

impl Sub for Amount {
  type Output = Result<Amount, KernelError>;
  fn sub(self, rhs: Amount) -> Result<Amount, KernelError> {
    self.checked_sub(&rhs)
  }
}

/// `u128` product-then-divide for curve math that must never lose precision
/// to intermediate overflow (constant-product exchange, interest accrual).
pub fn mul_div_u128(value: u64, numerator: u64, denominator: u64) -> Result<u64, KernelError> {
  if denominator == 0 {
    return Err(KernelError::invariant("division by zero"));
  }
  let product = (value as u128) * (numerator as u128);
  let result = product / denominator as u128;
  u64::try_from(result).map_err(|_| KernelError::invariant("mul_div_u128 overflow"))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sym() -> AssetSymbol {
    AssetSymbol::new("COIN")
  }

  #[test]
  fn checked_add_requires_matching_asset() {
    let a = Amount::new(100, sym());
    let b = Amount::new(1, AssetSymbol::new("USD"));
    assert!(a.checked_add(&b).is_err());
  }

  #[test]
  fn mul_div_floor_rounds_down() {
    let a = Amount::new(10_000, sym());
    let out = a.mul_div_floor(100, 10_100).unwrap();
    assert_eq!(out.value, 99); // 10000*100/10100 = 99.0099... -> 99
  }

  #[test]
  fn mul_div_u128_handles_large_products() {
    let out = mul_div_u128(u64::MAX / 2, 3, 4).unwrap();
    assert_eq!(out, ((u64::MAX as u128 / 2) * 3 / 4) as u64);
  }
}
