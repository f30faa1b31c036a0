use serde::{Deserialize, Serialize};

use common::ChainTime;

use crate::amount::Amount;
use crate::ids::{AccountName, AuctionOrderId, CallOrderId, LimitOrderId, MarginOrderId, OptionOrderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
  Buy,
  Sell,
}

/// A standing order in the central limit order book (§3.4, §4.5). The
/// `for_sale` quantity decreases as the order fills; `min_to_receive`
/// implies the order's limit price (`min_to_receive / for_sale`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrder {
  pub id: LimitOrderId,
  pub owner: AccountName,
  pub order_id: u32,
  pub for_sale: Amount,
  pub min_to_receive: Amount,
  pub created: ChainTime,
  pub expiration: Option<ChainTime>,
  pub fill_or_kill: bool,
}

impl LimitOrder {
  /// Price as `receive per unit sold`, cross-multiplied to avoid float
  /// division: `self.price_num / self.price_den` in the asset pair's terms.
  pub fn price_num_den(&self) -> (u64, u64) {
    (self.min_to_receive.value as u64, self.for_sale.value as u64)
  }

  pub fn is_expired(&self, now: ChainTime) -> bool {
    self.expiration.map(|exp| exp.is_past(now)).unwrap_or(false)
  }
}

/// A leveraged limit order backed by borrowed funds from a credit pool,
/// unwound automatically if the backing collateral ratio breaches
/// `margin_open_ratio` (§3.4, §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginOrder {
  pub id: MarginOrderId,
  pub owner: AccountName,
  pub order_id: u32,
  pub for_sale: Amount,
  pub min_to_receive: Amount,
  pub collateral: Amount,
  pub debt: Amount,
  pub created: ChainTime,
  pub expiration: Option<ChainTime>,
}

/// A bitasset short position: collateral backing `debt` units of a
/// bitasset, liquidated when `collateral / debt` falls below the feed's
/// maintenance collateral ratio (§3.4, §4.8).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOrder {
  pub id: CallOrderId,
  pub owner: AccountName,
  pub collateral: Amount,
  pub debt: Amount,
  /// Optional self-imposed higher collateralization target used to order
  /// calls for partial liquidation preference (target collateral ratio).
  pub target_collateral_ratio: Option<u64>,
  pub created: ChainTime,
}

impl CallOrder {
  /// Collateralization ratio in basis points: `collateral / debt *
  /// PERCENT_100`, valued at the current feed price (caller passes the
  /// already price-converted debt value to keep this type feed-agnostic).
  pub fn collateral_ratio(&self, debt_value_in_collateral: u64) -> Option<u64> {
    if debt_value_in_collateral == 0 {
      return None;
    }
    Some((self.collateral.value as u64) * crate::config::PERCENT_100 / debt_value_in_collateral)
  }
}

/// A recurring daily auction-matched order used for bitasset settlement
/// smoothing (§3.4, GLOSSARY "Auction order").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionOrder {
  pub id: AuctionOrderId,
  pub owner: AccountName,
  pub for_sale: Amount,
  pub min_to_receive: Amount,
  pub created: ChainTime,
  pub expiration: ChainTime,
}

/// Issues long/short option-contract tokens against deposited collateral,
/// drawn from an `OptionPool`'s strike ladder (§3.4, §4.10).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionOrder {
  pub id: OptionOrderId,
  pub owner: AccountName,
  pub collateral: Amount,
  pub long_asset_issued: Amount,
  pub short_asset_issued: Amount,
  pub created: ChainTime,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ids::AssetSymbol;

  fn amt(v: i128, s: &str) -> Amount {
    Amount::new(v, AssetSymbol::new(s))
  }

  #[test]
  fn limit_order_expiration() {
    let order = LimitOrder {
      id: LimitOrderId(1),
      owner: AccountName::new("alice").unwrap(),
      order_id: 1,
      for_sale: amt(100, "COIN"),
      min_to_receive: amt(50, "USD"),
      created: ChainTime::from_unix(0),
      expiration: Some(ChainTime::from_unix(100)),
      fill_or_kill: false,
    };
    assert!(!order.is_expired(ChainTime::from_unix(99)));
    assert!(order.is_expired(ChainTime::from_unix(100)));
  }

  #[test]
  fn call_order_ratio_none_at_zero_debt() {
    let call = CallOrder {
      id: CallOrderId(1),
      owner: AccountName::new("alice").unwrap(),
      collateral: amt(1000, "COIN"),
      debt: amt(0, "BITUSD"),
      target_collateral_ratio: None,
      created: ChainTime::from_unix(0),
    };
    assert_eq!(call.collateral_ratio(0), None);
    assert_eq!(call.collateral_ratio(500), Some(2000));
  }
}
