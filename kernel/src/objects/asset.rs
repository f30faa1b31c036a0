use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use common::ChainTime;

use crate::ids::{AccountName, AssetId, AssetSymbol, CollateralBidId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
  Currency,
  Standard,
  Equity,
  Credit,
  Bitasset,
  LiquidityPool,
  CreditPool,
  Option,
  Prediction,
  Gateway,
  Unique,
  Stimulus,
  Distribution,
}

/// Plain bit flags over `Asset::flags`, checked with `&` rather than pulling
/// in a dedicated crate for five constants.
pub struct AssetPermissions;
impl AssetPermissions {
  pub const STAKE_ENABLED: u32 = 1 << 0;
  pub const CREDIT_ENABLED: u32 = 1 << 1;
  pub const LIQUID_ENABLED: u32 = 1 << 2;
  pub const MARKET_ENABLED: u32 = 1 << 3;
  pub const ISSUER_TRANSFER_RESTRICTED: u32 = 1 << 4;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
  pub id: AssetId,
  pub symbol: AssetSymbol,
  pub kind: AssetKind,
  /// `None` for the chain's native currency asset.
  pub issuer: Option<AccountName>,
  pub max_supply: u64,
  pub stake_intervals: u32,
  pub unstake_intervals: u32,
  pub market_fee_percent: u64,
  pub permissions: u32,
  pub flags: u32,
  pub created: ChainTime,
}

impl Asset {
  pub fn is_enabled(&self, flag: u32) -> bool {
    self.flags & flag == flag
  }

  pub fn is_liquid_enabled(&self) -> bool {
    self.is_enabled(AssetPermissions::LIQUID_ENABLED)
  }

  pub fn is_credit_enabled(&self) -> bool {
    self.is_enabled(AssetPermissions::CREDIT_ENABLED)
  }

  pub fn is_market_enabled(&self) -> bool {
    self.is_enabled(AssetPermissions::MARKET_ENABLED)
  }
}

/// The eight supply accumulators that must sum to `total_supply` (§3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AssetDynamicData {
  pub total_supply: u64,
  pub liquid_supply: u64,
  pub staked_supply: u64,
  pub reward_supply: u64,
  pub savings_supply: u64,
  pub pending_supply: u64,
  pub confidential_supply: u64,
  pub accumulated_fees: u64,
  pub fee_pool: u64,
}

impl AssetDynamicData {
  /// Invariant check used by tests and by maintenance (§8 Universal
  /// Invariant 1): `total == liquid + staked + reward + savings + pending + confidential`.
  pub fn is_balanced(&self) -> bool {
    self.total_supply
      == self.liquid_supply
        + self.staked_supply
        + self.reward_supply
        + self.savings_supply
        + self.pending_supply
        + self.confidential_supply
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeed {
  pub settlement_price_num: u64,
  pub settlement_price_den: u64,
  pub maintenance_collateral_ratio: u64,
  pub published: ChainTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitassetData {
  pub symbol: AssetSymbol,
  pub backing_asset: AssetSymbol,
  pub feeds: BTreeMap<AccountName, PriceFeed>,
  pub current_feed: Option<PriceFeed>,
  pub feed_producers: Vec<AccountName>,
  pub settlement_price_num: Option<u64>,
  pub settlement_price_den: Option<u64>,
  pub settlement_fund: u64,
  pub is_globally_settled: bool,
  pub force_settlement_delay_seconds: u64,
}

impl BitassetData {
  pub fn new(symbol: AssetSymbol, backing_asset: AssetSymbol, feed_producers: Vec<AccountName>) -> Self {
    Self {
      symbol,
      backing_asset,
      feeds: BTreeMap::new(),
      current_feed: None,
      feed_producers,
      settlement_price_num: None,
      settlement_price_den: None,
      settlement_fund: 0,
      is_globally_settled: false,
      force_settlement_delay_seconds: crate::config::FORCE_SETTLEMENT_DELAY_SECONDS,
    }
  }

  /// Recompute `current_feed` as the median of feeds published within
  /// `max_age` of `now` (§4.8). Even sample counts average the two
  /// middle settlement prices (cross-multiplied to avoid fractions).
  pub fn recompute_median(&mut self, now: ChainTime, max_age_seconds: u64) {
    let mut live: Vec<&PriceFeed> = self
      .feeds
      .values()
      .filter(|f| now.elapsed_since(f.published) <= max_age_seconds)
      .collect();
    if live.is_empty() {
      self.current_feed = None;
      return;
    }
    live.sort_by(|a, b| {
      let a_price = a.settlement_price_num as u128 * b.settlement_price_den as u128;
      let b_price = b.settlement_price_num as u128 * a.settlement_price_den as u128;
      a_price.cmp(&b_price)
    });
    let mid = live.len() / 2;
    self.current_feed = Some(live[mid].clone());
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityData {
  pub dividend_asset: AssetSymbol,
  pub dividend_pool: u64,
  pub revenue_share_percent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditData {
  pub buyback_asset: AssetSymbol,
  pub buyback_pool: u64,
}

/// A bid to recollateralize a globally-settled bitasset (§4.8,
/// "Collateral bids"). Bids accumulate while the asset stays settled; once
/// their combined collateral clears `bitasset_mcr` against outstanding
/// debt, maintenance revives the asset and builds a fresh call-order ladder
/// from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralBid {
  pub id: CollateralBidId,
  pub bidder: AccountName,
  pub collateral: u64,
  pub debt_covered: u64,
  pub created: ChainTime,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dynamic_data_balance_invariant() {
    let d = AssetDynamicData {
      total_supply: 100,
      liquid_supply: 60,
      staked_supply: 40,
      ..Default::default()
    };
    assert!(d.is_balanced());
    let unbalanced = AssetDynamicData { total_supply: 101, ..d };
    assert!(!unbalanced.is_balanced());
  }

  #[test]
  fn median_feed_excludes_stale_entries() {
    let mut b = BitassetData::new(
      AssetSymbol::new("BITUSD"),
      AssetSymbol::new("COIN"),
      vec![],
    );
    b.feeds.insert(
      AccountName::new("producer1").unwrap(),
      PriceFeed { settlement_price_num: 1, settlement_price_den: 1, maintenance_collateral_ratio: 17_500, published: ChainTime::from_unix(0) },
    );
    b.feeds.insert(
      AccountName::new("producer2").unwrap(),
      PriceFeed { settlement_price_num: 2, settlement_price_den: 1, maintenance_collateral_ratio: 17_500, published: ChainTime::from_unix(100) },
    );
    b.recompute_median(ChainTime::from_unix(1_000_000), crate::config::FEED_MAX_AGE_SECONDS);
    assert!(b.current_feed.is_none());
    b.recompute_median(ChainTime::from_unix(100), crate::config::FEED_MAX_AGE_SECONDS);
    assert!(b.current_feed.is_some());
  }
}
