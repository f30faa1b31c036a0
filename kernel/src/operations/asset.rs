//! Asset lifecycle evaluators (§3.2, §4.3 taxonomy row "Asset lifecycle",
//! §4.8): creation, issuance/reservation, feed publishing, global
//! settlement, forced settlement, and collateral bids. These are the
//! handlers the bitasset/settlement machinery in `maintenance.rs` assumes
//! is already live in the store.

use common::ChainTime;
use log::info;

use crate::amount::Amount;
use crate::balance_engine::{self, SubBalance};
use crate::config;
use crate::error::{KernelError, KernelResult};
use crate::ids::AccountName;
use crate::ids::AssetSymbol;
use crate::objects::{AssetDynamicData, AssetKind, BitassetData, CollateralBid};
use crate::store::Store;
use crate::virtual_op::VirtualOp;

/// Creates a new asset (§3.2, §4.8). Bitassets additionally get a
/// `BitassetData` record seeded against `backing_asset`; every other kind
/// is a plain supply-tracked asset. The original's implicit core/USD
/// liquidity-pool and satellite credit-pool seeding (§3.2 invariant) is the
/// responsibility of a higher-level `pools::liquidity_pool_create`/
/// `pools::credit_pool_lend` call issued alongside this one by the host —
/// this evaluator owns only the asset record itself.
pub fn create(
  store: &mut Store,
  issuer: &AccountName,
  symbol: &AssetSymbol,
  kind: AssetKind,
  max_supply: u64,
  market_fee_percent: u64,
  permissions: u32,
  backing_asset: Option<&AssetSymbol>,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(issuer)?;
  if store.find_asset(symbol).is_some() {
    return Err(KernelError::precondition(format!("asset {symbol} already exists")));
  }
  if market_fee_percent > config::PERCENT_100 {
    return Err(KernelError::precondition("market fee percent cannot exceed 100%"));
  }

  let id = store.alloc_asset_id();
  store.create_asset(
    crate::objects::Asset {
      id,
      symbol: symbol.clone(),
      kind,
      issuer: Some(issuer.clone()),
      max_supply,
      stake_intervals: 1,
      unstake_intervals: 4,
      market_fee_percent,
      permissions,
      flags: permissions,
      created: now,
    },
    AssetDynamicData::default(),
  )?;

  if kind == AssetKind::Bitasset {
    let backing = backing_asset.ok_or_else(|| KernelError::precondition("bitasset requires a backing asset"))?;
    store.get_asset(backing)?;
    store.create_bitasset_data(BitassetData::new(symbol.clone(), backing.clone(), Vec::new()));
  }

  info!("asset {symbol} created by {issuer}");
  Ok(Vec::new())
}

pub fn update(
  store: &mut Store,
  issuer: &AccountName,
  symbol: &AssetSymbol,
  new_flags: u32,
  new_market_fee_percent: u64,
) -> KernelResult<Vec<VirtualOp>> {
  let asset = store.get_asset(symbol)?;
  if asset.issuer.as_ref() != Some(issuer) {
    return Err(KernelError::unauthorized(format!("{issuer} is not the issuer of {symbol}")));
  }
  if new_flags & !asset.permissions != 0 {
    return Err(KernelError::precondition("flags must be a subset of permissions"));
  }
  if new_market_fee_percent > config::PERCENT_100 {
    return Err(KernelError::precondition("market fee percent cannot exceed 100%"));
  }
  store.modify_asset(symbol, |a| {
    a.flags = new_flags;
    a.market_fee_percent = new_market_fee_percent;
  })?;
  Ok(Vec::new())
}

pub fn issue(store: &mut Store, issuer: &AccountName, to: &AccountName, amount: &Amount) -> KernelResult<Vec<VirtualOp>> {
  let asset = store.get_asset(&amount.symbol)?;
  if asset.issuer.as_ref() != Some(issuer) {
    return Err(KernelError::unauthorized(format!("{issuer} is not the issuer of {}", amount.symbol)));
  }
  store.get_account(to)?;
  let value = positive(amount)?;
  let dynamic = store.get_dynamic(&amount.symbol)?;
  if dynamic.total_supply.saturating_add(value) > asset.max_supply {
    return Err(KernelError::precondition("issue would exceed max supply"));
  }
  balance_engine::mint_liquid(store, to, &amount.symbol, value)?;
  Ok(Vec::new())
}

pub fn reserve(store: &mut Store, owner: &AccountName, amount: &Amount) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(owner)?;
  let value = positive(amount)?;
  balance_engine::burn_liquid(store, owner, &amount.symbol, value)?;
  Ok(Vec::new())
}

pub fn update_issuer(store: &mut Store, issuer: &AccountName, symbol: &AssetSymbol, new_issuer: &AccountName) -> KernelResult<Vec<VirtualOp>> {
  let asset = store.get_asset(symbol)?;
  if asset.issuer.as_ref() != Some(issuer) {
    return Err(KernelError::unauthorized(format!("{issuer} is not the issuer of {symbol}")));
  }
  store.get_account(new_issuer)?;
  store.modify_asset(symbol, |a| a.issuer = Some(new_issuer.clone()))?;
  Ok(Vec::new())
}

/// Publishes one producer's price feed for a bitasset and recomputes the
/// median (§4.8). Fails with `Unauthorized` when the publisher is not in
/// the asset's feed-producer set.
pub fn publish_feed(
  store: &mut Store,
  publisher: &AccountName,
  symbol: &AssetSymbol,
  settlement_price_num: u64,
  settlement_price_den: u64,
  maintenance_collateral_ratio: u64,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  let bitasset = store.get_bitasset_data(symbol)?;
  if !bitasset.feed_producers.contains(publisher) {
    return Err(KernelError::unauthorized(format!("{publisher} is not a feed producer for {symbol}")));
  }
  if settlement_price_num == 0 || settlement_price_den == 0 {
    return Err(KernelError::precondition("feed price must be positive"));
  }
  store.modify_bitasset_data(symbol, |b| {
    b.feeds.insert(
      publisher.clone(),
      crate::objects::PriceFeed { settlement_price_num, settlement_price_den, maintenance_collateral_ratio, published: now },
    );
    b.recompute_median(now, config::FEED_MAX_AGE_SECONDS);
  })?;
  let sell_symbol = symbol.clone();
  let receive_symbol = store.get_bitasset_data(symbol)?.backing_asset.clone();
  let ops = crate::matching::resweep_pair(store, &sell_symbol, &receive_symbol, now)?;
  Ok(ops)
}

pub fn update_feed_producers(store: &mut Store, issuer: &AccountName, symbol: &AssetSymbol, producers: Vec<AccountName>) -> KernelResult<Vec<VirtualOp>> {
  let asset = store.get_asset(symbol)?;
  if asset.issuer.as_ref() != Some(issuer) {
    return Err(KernelError::unauthorized(format!("{issuer} is not the issuer of {symbol}")));
  }
  store.modify_bitasset_data(symbol, |b| b.feed_producers = producers)?;
  Ok(Vec::new())
}

/// Fixes the settlement price, moves every outstanding call order's
/// collateral into the settlement fund, and marks the asset globally
/// settled (§4.8 "Global settlement"). Holders redeem pro-rata against the
/// fund afterward via `force_settle`.
pub fn global_settle(store: &mut Store, issuer: &AccountName, symbol: &AssetSymbol) -> KernelResult<Vec<VirtualOp>> {
  let asset = store.get_asset(symbol)?;
  if asset.issuer.as_ref() != Some(issuer) {
    return Err(KernelError::unauthorized(format!("{issuer} is not the issuer of {symbol}")));
  }
  let bitasset = store.get_bitasset_data(symbol)?;
  if bitasset.is_globally_settled {
    return Err(KernelError::precondition(format!("{symbol} is already globally settled")));
  }
  let feed = bitasset.current_feed.clone().ok_or_else(|| KernelError::precondition("no current feed to settle against"))?;
  let backing = bitasset.backing_asset.clone();

  let calls: Vec<(crate::ids::CallOrderId, crate::objects::CallOrder)> =
    store.call_orders_for_debt_asset(symbol).into_iter().map(|(id, o)| (*id, o.clone())).collect();
  let mut settlement_fund = 0u64;
  for (id, call) in calls {
    store.remove_call_order(id);
    settlement_fund = settlement_fund.saturating_add(call.collateral.value.max(0) as u64);
  }
  let _ = backing;

  store.modify_bitasset_data(symbol, |b| {
    b.is_globally_settled = true;
    b.settlement_price_num = Some(feed.settlement_price_num);
    b.settlement_price_den = Some(feed.settlement_price_den);
    b.settlement_fund = b.settlement_fund.saturating_add(settlement_fund);
  })?;

  Ok(vec![VirtualOp::GlobalSettlement {
    symbol: symbol.clone(),
    settlement_price_num: feed.settlement_price_num,
    settlement_price_den: feed.settlement_price_den,
  }])
}

/// Queues (and, since there is no separate maintenance step for it yet,
/// settles immediately) a forced redemption at the feed price, net of the
/// force-settlement delay recorded for receipts purposes (§3.9, §4.8
/// "Forced settlement").
pub fn force_settle(store: &mut Store, owner: &AccountName, symbol: &AssetSymbol, amount: u64, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(owner)?;
  if amount == 0 {
    return Err(KernelError::precondition("force-settle amount must be positive"));
  }
  let bitasset = store.get_bitasset_data(symbol)?;
  let (price_num, price_den) = if bitasset.is_globally_settled {
    (
      bitasset.settlement_price_num.ok_or_else(|| KernelError::invariant("globally settled asset missing settlement price"))?,
      bitasset.settlement_price_den.ok_or_else(|| KernelError::invariant("globally settled asset missing settlement price"))?,
    )
  } else {
    let feed = bitasset.current_feed.clone().ok_or_else(|| KernelError::precondition("no current feed to settle against"))?;
    (feed.settlement_price_num, feed.settlement_price_den)
  };
  let backing = bitasset.backing_asset.clone();

  balance_engine::adjust_balance(store, owner, symbol, SubBalance::Liquid, -(amount as i128))?;
  let proceeds = crate::amount::mul_div_u128(amount, price_num, price_den.max(1))?;
  let available = store.get_bitasset_data(symbol)?.settlement_fund;
  let paid = proceeds.min(available);
  store.modify_bitasset_data(symbol, |b| b.settlement_fund = b.settlement_fund.saturating_sub(paid))?;
  balance_engine::adjust_balance(store, owner, &backing, SubBalance::Liquid, paid as i128)?;

  let _ = now;
  Ok(vec![VirtualOp::ForceSettlement { owner: owner.clone(), symbol: symbol.clone(), amount: Amount::new(paid as i128, backing) }])
}

/// Offers collateral to help revive a globally-settled asset (§4.8
/// "Collateral bids"). Bids accumulate on the asset until the issuer (or a
/// future maintenance pass) finds enough to rebuild a call-order ladder;
/// this evaluator records the bid only, matching the original's separation
/// of "bid" from "execute_bid".
pub fn collateral_bid(store: &mut Store, bidder: &AccountName, symbol: &AssetSymbol, collateral: u64, debt_covered: u64, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(bidder)?;
  let bitasset = store.get_bitasset_data(symbol)?;
  if !bitasset.is_globally_settled {
    return Err(KernelError::precondition(format!("{symbol} is not globally settled")));
  }
  let backing = bitasset.backing_asset.clone();
  if collateral == 0 || debt_covered == 0 {
    return Err(KernelError::precondition("collateral bid amounts must be positive"));
  }
  balance_engine::adjust_balance(store, bidder, &backing, SubBalance::Liquid, -(collateral as i128))?;

  let id = store.alloc_collateral_bid_id();
  store.create_collateral_bid(symbol.clone(), CollateralBid { id, bidder: bidder.clone(), collateral, debt_covered, created: now });
  Ok(Vec::new())
}

fn positive(amount: &Amount) -> KernelResult<u64> {
  if amount.value <= 0 {
    return Err(KernelError::precondition("amount must be positive"));
  }
  Ok(amount.value as u64)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ChainSpec;
  use crate::objects::Account;

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  fn setup() -> Store {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    let id = store.alloc_account_id();
    store.create_account(Account::new(id, name("alice"), "alice-key".into(), ChainTime::from_unix(0))).unwrap();
    store
  }

  #[test]
  fn create_then_issue_respects_max_supply() {
    let mut store = setup();
    let symbol = AssetSymbol::new("WIDGET");
    create(&mut store, &name("alice"), &symbol, AssetKind::Standard, 100, 0, u32::MAX, None, ChainTime::from_unix(0)).unwrap();
    issue(&mut store, &name("alice"), &name("alice"), &Amount::new(100, symbol.clone())).unwrap();
    let err = issue(&mut store, &name("alice"), &name("alice"), &Amount::new(1, symbol));
    assert!(err.is_err());
  }

  #[test]
  fn publish_feed_rejects_unknown_producers() {
    let mut store = setup();
    let symbol = AssetSymbol::new("BITUSD");
    let backing = AssetSymbol::new("COIN");
    store.ensure_asset_dynamic(&backing);
    create(&mut store, &name("alice"), &symbol, AssetKind::Bitasset, u64::MAX, 0, u32::MAX, Some(&backing), ChainTime::from_unix(0)).unwrap();
    let err = publish_feed(&mut store, &name("alice"), &symbol, 1, 1, 17_500, ChainTime::from_unix(0));
    assert!(err.is_err());
  }

  #[test]
  fn global_settle_requires_a_published_feed() {
    let mut store = setup();
    let symbol = AssetSymbol::new("BITUSD");
    let backing = AssetSymbol::new("COIN");
    store.ensure_asset_dynamic(&backing);
    create(&mut store, &name("alice"), &symbol, AssetKind::Bitasset, u64::MAX, 0, u32::MAX, Some(&backing), ChainTime::from_unix(0)).unwrap();
    let err = global_settle(&mut store, &name("alice"), &symbol);
    assert!(err.is_err());
  }
}
