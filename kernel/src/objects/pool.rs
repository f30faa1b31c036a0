use serde::{Deserialize, Serialize};

use common::{ChainTime, RingBuffer};

use crate::ids::{AssetSymbol, CreditPoolId, LiquidityPoolId, OptionPoolId, PredictionPoolId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
  pub price_num: u64,
  pub price_den: u64,
  pub at: ChainTime,
}

/// A constant-product AMM pool over an ordered asset pair, plus rolling
/// hour/day price history used as the oracle median for credit and margin
/// pricing (§3.5, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
  pub id: LiquidityPoolId,
  pub symbol_a: AssetSymbol,
  pub symbol_b: AssetSymbol,
  pub balance_a: u64,
  pub balance_b: u64,
  pub share_asset: AssetSymbol,
  pub share_supply: u64,
  pub fee_basis_points: u64,
  #[serde(skip, default)]
  pub hour_history: RingBuffer<PriceSample>,
  #[serde(skip, default)]
  pub day_history: RingBuffer<PriceSample>,
  pub hour_median_num: u64,
  pub hour_median_den: u64,
  pub day_median_num: u64,
  pub day_median_den: u64,
  pub created: ChainTime,
}

impl LiquidityPool {
  /// Current spot price of `symbol_a` in terms of `symbol_b`, as a
  /// cross-multiplied fraction to avoid float division.
  pub fn spot_price(&self) -> (u64, u64) {
    (self.balance_b, self.balance_a)
  }

  /// Record a fresh sample and recompute the hour/day medians (§4.6:
  /// "median of the ring buffer's samples", cross-multiplied comparison).
  pub fn record_sample(&mut self, now: ChainTime) {
    let (num, den) = self.spot_price();
    let sample = PriceSample { price_num: num, price_den: den, at: now };
    self.hour_history.push(sample);
    self.day_history.push(sample);
    let (hn, hd) = median_price(self.hour_history.snapshot());
    self.hour_median_num = hn;
    self.hour_median_den = hd;
    let (dn, dd) = median_price(self.day_history.snapshot());
    self.day_median_num = dn;
    self.day_median_den = dd;
  }
}

fn median_price(mut samples: Vec<PriceSample>) -> (u64, u64) {
  if samples.is_empty() {
    return (1, 1);
  }
  samples.sort_by(|a, b| {
    let l = a.price_num as u128 * b.price_den as u128;
    let r = b.price_num as u128 * a.price_den as u128;
    l.cmp(&r)
  });
  let mid = samples.len() / 2;
  (samples[mid].price_num, samples[mid].price_den)
}

/// A single-asset lending pool: suppliers deposit `base_balance` and
/// receive satellite shares; borrowers post collateral in a different
/// asset and draw down `base_balance` (§3.5, §4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPool {
  pub id: CreditPoolId,
  pub base_asset: AssetSymbol,
  pub share_asset: AssetSymbol,
  pub base_balance: u64,
  pub borrowed_balance: u64,
  pub share_supply: u64,
  pub last_price_num: u64,
  pub last_price_den: u64,
  pub min_interest_rate: u64,
  pub variable_interest_rate: u64,
  pub created: ChainTime,
}

impl CreditPool {
  /// Utilization in basis points: `borrowed / (base + borrowed)`.
  pub fn utilization(&self) -> u64 {
    let total = self.base_balance + self.borrowed_balance;
    if total == 0 {
      return 0;
    }
    (self.borrowed_balance as u128 * crate::config::PERCENT_100 as u128 / total as u128) as u64
  }

  /// Interest rate at the current utilization: `min + variable *
  /// utilization / 100%` (§4.7.1).
  pub fn interest_rate(&self) -> u64 {
    self.min_interest_rate
      + (self.variable_interest_rate as u128 * self.utilization() as u128 / crate::config::PERCENT_100 as u128) as u64
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionStyle {
  Call,
  Put,
}

/// A pool backing European-style option tokens over an underlying/strike
/// pair (§3.5, §4.10).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionPool {
  pub id: OptionPoolId,
  pub underlying: AssetSymbol,
  pub strike_asset: AssetSymbol,
  pub style: OptionStyle,
  pub strike_price_num: u64,
  pub strike_price_den: u64,
  pub expiration: ChainTime,
  pub long_asset: AssetSymbol,
  pub short_asset: AssetSymbol,
  pub collateral_pool: u64,
  pub is_settled: bool,
  pub created: ChainTime,
}

/// A winner-take-all prediction market over a fixed outcome set plus the
/// implicit `INVALID` outcome (§3.5, §4.10.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionPool {
  pub id: PredictionPoolId,
  pub collateral_asset: AssetSymbol,
  pub outcome_assets: Vec<AssetSymbol>,
  pub invalid_asset: AssetSymbol,
  pub collateral_pool: u64,
  pub bond_pool: u64,
  pub outcome_time: ChainTime,
  pub resolution_time: ChainTime,
  pub staked_votes: Vec<(AssetSymbol, u64)>,
  pub resolved_outcome: Option<AssetSymbol>,
  pub created: ChainTime,
}

impl PredictionPool {
  pub fn is_resolved(&self) -> bool {
    self.resolved_outcome.is_some()
  }

  pub fn leading_outcome(&self) -> Option<&AssetSymbol> {
    self
      .staked_votes
      .iter()
      .max_by_key(|(_, stake)| *stake)
      .map(|(symbol, _)| symbol)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sym(s: &str) -> AssetSymbol {
    AssetSymbol::new(s)
  }

  #[test]
  fn utilization_and_interest_rate() {
    let pool = CreditPool {
      id: CreditPoolId(1),
      base_asset: sym("COIN"),
      share_asset: sym("CREDIT.COIN"),
      base_balance: 500,
      borrowed_balance: 500,
      share_supply: 1000,
      last_price_num: 1,
      last_price_den: 1,
      min_interest_rate: 200,
      variable_interest_rate: 2_000,
      created: ChainTime::from_unix(0),
    };
    assert_eq!(pool.utilization(), 5_000); // 50%
    assert_eq!(pool.interest_rate(), 200 + 1_000); // 200 + 2000*0.5
  }

  #[test]
  fn leading_outcome_picks_highest_stake() {
    let pool = PredictionPool {
      id: PredictionPoolId(1),
      collateral_asset: sym("COIN"),
      outcome_assets: vec![sym("PREDICTION.YES"), sym("PREDICTION.NO")],
      invalid_asset: sym("PREDICTION.INVALID"),
      collateral_pool: 0,
      bond_pool: 0,
      outcome_time: ChainTime::from_unix(0),
      resolution_time: ChainTime::from_unix(0),
      staked_votes: vec![(sym("PREDICTION.YES"), 10), (sym("PREDICTION.NO"), 30)],
      resolved_outcome: None,
      created: ChainTime::from_unix(0),
    };
    assert_eq!(pool.leading_outcome(), Some(&sym("PREDICTION.NO")));
  }
}
