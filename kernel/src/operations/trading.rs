//! Order-book and derivatives evaluators (§3.4, §4.5/§4.8/§4.10 taxonomy
//! row "Trading"). Placing an order parks its committed funds in the
//! traded asset's `pending_supply` accumulator (§3.2) rather than leaving
//! them in the owner's liquid balance, mirroring the escrow/marketplace
//! hold pattern; [`matching::match_taker`] draws down that reserve as fills
//! happen.

use common::ChainTime;

use crate::amount::{mul_div_u128, Amount};
use crate::balance_engine::{self, SubBalance};
use crate::config;
use crate::error::{KernelError, KernelResult};
use crate::ids::{AccountName, AssetSymbol, LimitOrderId, MarginOrderId, OptionPoolId, OPTION_ASSET_PREFIX};
use crate::matching;
use crate::objects::{AuctionOrder, CallOrder, LimitOrder, MarginOrder, OptionOrder, OptionPool, OptionStyle};
use crate::store::Store;
use crate::virtual_op::VirtualOp;

fn park(store: &mut Store, owner: &AccountName, amount: &Amount) -> KernelResult<()> {
  balance_engine::adjust_balance(store, owner, &amount.symbol, SubBalance::Liquid, -amount.value)?;
  store.modify_dynamic(&amount.symbol, |d| d.pending_supply = d.pending_supply.saturating_add(amount.value as u64))?;
  Ok(())
}

fn unpark(store: &mut Store, owner: &AccountName, amount: &Amount) -> KernelResult<()> {
  store.modify_dynamic(&amount.symbol, |d| d.pending_supply = d.pending_supply.saturating_sub(amount.value as u64))?;
  balance_engine::adjust_balance(store, owner, &amount.symbol, SubBalance::Liquid, amount.value)?;
  Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn limit_order_create(
  store: &mut Store,
  owner: &AccountName,
  order_id: u32,
  for_sale: &Amount,
  min_to_receive: &Amount,
  expiration: Option<ChainTime>,
  fill_or_kill: bool,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(owner)?;
  matching::validate_nonzero(for_sale, "for_sale")?;
  matching::validate_nonzero(min_to_receive, "min_to_receive")?;
  if for_sale.symbol == min_to_receive.symbol {
    return Err(KernelError::precondition("for_sale and min_to_receive must be different assets"));
  }

  park(store, owner, for_sale)?;
  let outcome = match matching::match_taker(store, owner, for_sale.clone(), min_to_receive.clone(), fill_or_kill, now) {
    Ok(o) => o,
    Err(e) => {
      unpark(store, owner, for_sale)?;
      return Err(e);
    }
  };

  let mut ops = outcome.virtual_ops;
  if outcome.remaining_for_sale.value > 0 {
    let remaining_min_to_receive = mul_div_u128(
      outcome.remaining_for_sale.value as u64,
      min_to_receive.value as u64,
      for_sale.value as u64,
    )?;
    let id = store.alloc_limit_order_id();
    store.create_limit_order(LimitOrder {
      id,
      owner: owner.clone(),
      order_id,
      for_sale: outcome.remaining_for_sale,
      min_to_receive: Amount::new(remaining_min_to_receive as i128, min_to_receive.symbol.clone()),
      created: now,
      expiration,
      fill_or_kill,
    });
  }
  Ok(ops)
}

pub fn limit_order_cancel(store: &mut Store, owner: &AccountName, order_id: LimitOrderId) -> KernelResult<Vec<VirtualOp>> {
  let order = store.find_limit_order(order_id).cloned().ok_or_else(|| KernelError::not_found("limit_order", order_id.to_string()))?;
  if order.owner != *owner {
    return Err(KernelError::unauthorized("only the order's owner may cancel it"));
  }
  unpark(store, owner, &order.for_sale)?;
  store.remove_limit_order(order_id);
  Ok(vec![VirtualOp::LimitOrderCancelled { owner: owner.clone(), order_id, returned: order.for_sale }])
}

/// Opens a leveraged position: `collateral` is parked, `debt` is minted
/// against it (§4.5 "Margin orders"; no credit pool is drawn down — the
/// debt asset is issued directly the way a bitasset call order issues debt,
/// §3.4 Non-goals around a separate lending venue for margin). `sell` must
/// be denominated in the debt asset; whatever doesn't fill immediately
/// rests as an ordinary limit order.
#[allow(clippy::too_many_arguments)]
pub fn margin_order_create(
  store: &mut Store,
  owner: &AccountName,
  order_id: u32,
  collateral: &Amount,
  debt: &Amount,
  sell: &Amount,
  receive: &Amount,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(owner)?;
  matching::validate_nonzero(collateral, "collateral")?;
  matching::validate_nonzero(debt, "debt")?;
  matching::validate_nonzero(sell, "sell")?;
  matching::validate_nonzero(receive, "receive")?;
  if sell.symbol != debt.symbol {
    return Err(KernelError::precondition("a margin order can only sell the borrowed (debt) asset"));
  }
  if sell.value > debt.value {
    return Err(KernelError::precondition("cannot sell more than the amount borrowed"));
  }

  park(store, owner, collateral)?;
  balance_engine::mint_liquid(store, owner, &debt.symbol, debt.value as u64)?;

  let outcome = matching::match_taker(store, owner, sell.clone(), receive.clone(), false, now)?;
  let mut ops = outcome.virtual_ops;
  if outcome.remaining_for_sale.value > 0 {
    let remaining_receive = mul_div_u128(outcome.remaining_for_sale.value as u64, receive.value as u64, sell.value as u64)?;
    let limit_id = store.alloc_limit_order_id();
    store.create_limit_order(LimitOrder {
      id: limit_id,
      owner: owner.clone(),
      order_id,
      for_sale: outcome.remaining_for_sale,
      min_to_receive: Amount::new(remaining_receive as i128, receive.symbol.clone()),
      created: now,
      expiration: None,
      fill_or_kill: false,
    });
  }

  let id = store.alloc_margin_order_id();
  store.create_margin_order(MarginOrder {
    id,
    owner: owner.clone(),
    order_id,
    for_sale: sell.clone(),
    min_to_receive: receive.clone(),
    collateral: collateral.clone(),
    debt: debt.clone(),
    created: now,
    expiration: None,
  });
  Ok(ops)
}

/// Unwinds a margin position: returns parked collateral, burns the
/// outstanding debt from the owner's liquid balance. A position can only
/// be closed while solvent; liquidation of an underwater position is a
/// maintenance-time concern this evaluator does not perform.
pub fn margin_order_close(store: &mut Store, owner: &AccountName, order_id: MarginOrderId, _now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  let order = store.find_margin_order(order_id).cloned().ok_or_else(|| KernelError::not_found("margin_order", order_id.to_string()))?;
  if order.owner != *owner {
    return Err(KernelError::unauthorized("only the position's owner may close it"));
  }
  balance_engine::burn_liquid(store, owner, &order.debt.symbol, order.debt.value as u64)?;
  unpark(store, owner, &order.collateral)?;
  store.remove_margin_order(order_id);
  Ok(Vec::new())
}

/// Opens, tops up, reduces, or closes a bitasset short position (§3.4,
/// §4.8). `debt_delta.symbol` identifies the bitasset; `collateral_delta`
/// is denominated in its backing asset. A zero resulting debt closes the
/// position and refunds whatever collateral remains.
pub fn call_order_update(
  store: &mut Store,
  owner: &AccountName,
  collateral_delta: &Amount,
  debt_delta: &Amount,
  target_collateral_ratio: Option<u64>,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(owner)?;
  let bitasset = store.get_bitasset_data(&debt_delta.symbol)?.clone();
  if collateral_delta.symbol != bitasset.backing_asset {
    return Err(KernelError::precondition("collateral must be denominated in the bitasset's backing asset"));
  }

  let existing = store.find_call_order_by_owner(owner, &debt_delta.symbol).map(|(id, o)| (*id, o.clone()));
  let (prior_collateral, prior_debt) = existing.as_ref().map(|(_, o)| (o.collateral.value, o.debt.value)).unwrap_or((0, 0));
  let new_collateral = prior_collateral + collateral_delta.value;
  let new_debt = prior_debt + debt_delta.value;
  if new_collateral < 0 || new_debt < 0 {
    return Err(KernelError::precondition("collateral and debt may not go negative"));
  }
  if new_debt > 0 && new_collateral == 0 {
    return Err(KernelError::precondition("an open debt position requires positive collateral"));
  }
  if new_debt > 0 {
    if let Some(feed) = &bitasset.current_feed {
      let debt_value_in_collateral = mul_div_u128(new_debt as u64, feed.settlement_price_num, feed.settlement_price_den.max(1))?;
      let ratio = (new_collateral as u64) * config::PERCENT_100 / debt_value_in_collateral.max(1);
      if ratio < feed.maintenance_collateral_ratio {
        return Err(KernelError::precondition("resulting collateral ratio is below the maintenance requirement"));
      }
    }
  }

  // Move the delta first, reflecting actual fund movement regardless of
  // whether this closes the position outright.
  if collateral_delta.value > 0 {
    park(store, owner, collateral_delta)?;
  } else if collateral_delta.value < 0 {
    unpark(store, owner, &Amount::new(-collateral_delta.value, collateral_delta.symbol.clone()))?;
  }
  if debt_delta.value > 0 {
    balance_engine::mint_liquid(store, owner, &debt_delta.symbol, debt_delta.value as u64)?;
  } else if debt_delta.value < 0 {
    balance_engine::burn_liquid(store, owner, &debt_delta.symbol, (-debt_delta.value) as u64)?;
  }

  if new_debt == 0 {
    if new_collateral > 0 {
      unpark(store, owner, &Amount::new(new_collateral, collateral_delta.symbol.clone()))?;
    }
    if let Some((id, _)) = existing {
      store.remove_call_order(id);
    }
    return Ok(Vec::new());
  }

  match existing {
    Some((id, _)) => {
      store.modify_call_order(id, |o| {
        o.collateral.value = new_collateral;
        o.debt.value = new_debt;
        o.target_collateral_ratio = target_collateral_ratio;
      });
    }
    None => {
      let id = store.alloc_call_order_id();
      store.create_call_order(CallOrder {
        id,
        owner: owner.clone(),
        collateral: Amount::new(new_collateral, collateral_delta.symbol.clone()),
        debt: Amount::new(new_debt, debt_delta.symbol.clone()),
        target_collateral_ratio,
        created: now,
      });
    }
  }
  Ok(Vec::new())
}

/// Lists `for_sale` into the daily settlement auction (§4.8.1) rather than
/// the continuous book; maintenance sweeps and clears these once a day.
pub fn auction_order_create(store: &mut Store, owner: &AccountName, for_sale: &Amount, min_to_receive: &Amount, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(owner)?;
  matching::validate_nonzero(for_sale, "for_sale")?;
  matching::validate_nonzero(min_to_receive, "min_to_receive")?;
  park(store, owner, for_sale)?;
  let id = store.alloc_auction_order_id();
  store.create_auction_order(AuctionOrder {
    id,
    owner: owner.clone(),
    for_sale: for_sale.clone(),
    min_to_receive: min_to_receive.clone(),
    created: now,
    expiration: now.saturating_add_secs(config::AUCTION_ORDER_INTERVAL_SECONDS),
  });
  Ok(Vec::new())
}

fn option_symbols(pool_id: OptionPoolId) -> (AssetSymbol, AssetSymbol) {
  (
    AssetSymbol::new(format!("{OPTION_ASSET_PREFIX}{}.LONG", pool_id.0)),
    AssetSymbol::new(format!("{OPTION_ASSET_PREFIX}{}.SHORT", pool_id.0)),
  )
}

/// Mints a matched pair of long/short option tokens against fully-backed
/// `collateral` (§3.5, §4.10: "covered writing" only — naked/undercollateralized
/// writing is out of scope). Opens a fresh `OptionPool` for the
/// underlying/strike pair the first time it is referenced; price discovery
/// for the strike itself is left to the market the long/short tokens trade
/// on, not modeled here.
pub fn option_order_create(
  store: &mut Store,
  owner: &AccountName,
  pool_underlying: &AssetSymbol,
  pool_strike: &AssetSymbol,
  collateral: &Amount,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(owner)?;
  matching::validate_nonzero(collateral, "collateral")?;
  if collateral.symbol != *pool_strike {
    return Err(KernelError::precondition("collateral must be posted in the pool's strike asset"));
  }

  let pool_id = match store
    .all_option_pools()
    .find(|(_, p)| &p.underlying == pool_underlying && &p.strike_asset == pool_strike)
    .map(|(id, _)| *id)
  {
    Some(id) => id,
    None => {
      let id = store.alloc_option_pool_id();
      let (long_asset, short_asset) = option_symbols(id);
      store.ensure_asset_dynamic(&long_asset);
      store.ensure_asset_dynamic(&short_asset);
      store.create_option_pool(OptionPool {
        id,
        underlying: pool_underlying.clone(),
        strike_asset: pool_strike.clone(),
        style: OptionStyle::Call,
        strike_price_num: 1,
        strike_price_den: 1,
        expiration: now.saturating_add_secs(config::OPTION_POOL_DEFAULT_DURATION_SECONDS),
        long_asset,
        short_asset,
        collateral_pool: 0,
        is_settled: false,
        created: now,
      });
      id
    }
  };
  let pool = store.find_option_pool(pool_id).cloned().ok_or_else(|| KernelError::not_found("option_pool", pool_id.to_string()))?;
  if pool.expiration.is_past(now) {
    return Err(KernelError::precondition("option pool has already expired"));
  }

  park(store, owner, collateral)?;
  store.modify_option_pool(pool_id, |p| p.collateral_pool = p.collateral_pool.saturating_add(collateral.value as u64));
  balance_engine::mint_liquid(store, owner, &pool.long_asset, collateral.value as u64)?;
  balance_engine::mint_liquid(store, owner, &pool.short_asset, collateral.value as u64)?;

  let id = store.alloc_option_order_id();
  store.create_option_order(OptionOrder {
    id,
    owner: owner.clone(),
    collateral: collateral.clone(),
    long_asset_issued: Amount::new(collateral.value, pool.long_asset.clone()),
    short_asset_issued: Amount::new(collateral.value, pool.short_asset.clone()),
    created: now,
  });
  Ok(Vec::new())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ChainSpec;
  use crate::objects::{Account, BitassetData};

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  fn setup() -> Store {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    for sym in ["A", "B", "COIN", "BITUSD"] {
      store.ensure_asset_dynamic(&AssetSymbol::new(sym));
    }
    for n in ["alice", "bob"] {
      let id = store.alloc_account_id();
      store.create_account(Account::new(id, name(n), format!("{n}-key"), ChainTime::from_unix(0))).unwrap();
    }
    store
  }

  #[test]
  fn limit_order_parks_funds_and_rests_unfilled() {
    let mut store = setup();
    balance_engine::mint_liquid(&mut store, &name("alice"), &AssetSymbol::new("A"), 100).unwrap();
    limit_order_create(
      &mut store,
      &name("alice"),
      1,
      &Amount::new(100, AssetSymbol::new("A")),
      &Amount::new(50, AssetSymbol::new("B")),
      None,
      false,
      ChainTime::from_unix(0),
    )
    .unwrap();
    assert_eq!(store.find_balance(&name("alice"), &AssetSymbol::new("A")).unwrap().liquid, 0);
    assert_eq!(store.get_dynamic(&AssetSymbol::new("A")).unwrap().pending_supply, 100);
    assert_eq!(store.all_limit_orders().count(), 1);
  }

  #[test]
  fn limit_order_cancel_returns_parked_funds() {
    let mut store = setup();
    balance_engine::mint_liquid(&mut store, &name("alice"), &AssetSymbol::new("A"), 100).unwrap();
    limit_order_create(&mut store, &name("alice"), 1, &Amount::new(100, AssetSymbol::new("A")), &Amount::new(50, AssetSymbol::new("B")), None, false, ChainTime::from_unix(0)).unwrap();
    let id = store.all_limit_orders().next().unwrap().0.clone();
    limit_order_cancel(&mut store, &name("alice"), id).unwrap();
    assert_eq!(store.find_balance(&name("alice"), &AssetSymbol::new("A")).unwrap().liquid, 100);
    assert_eq!(store.get_dynamic(&AssetSymbol::new("A")).unwrap().pending_supply, 0);
  }

  #[test]
  fn call_order_update_opens_and_closes_a_position() {
    let mut store = setup();
    balance_engine::mint_liquid(&mut store, &name("alice"), &AssetSymbol::new("COIN"), 1000).unwrap();
    store.create_bitasset_data(BitassetData::new(AssetSymbol::new("BITUSD"), AssetSymbol::new("COIN"), vec![]));
    call_order_update(
      &mut store,
      &name("alice"),
      &Amount::new(1000, AssetSymbol::new("COIN")),
      &Amount::new(100, AssetSymbol::new("BITUSD")),
      None,
      ChainTime::from_unix(0),
    )
    .unwrap();
    assert_eq!(store.find_balance(&name("alice"), &AssetSymbol::new("BITUSD")).unwrap().liquid, 100);
    assert_eq!(store.get_dynamic(&AssetSymbol::new("COIN")).unwrap().pending_supply, 1000);

    call_order_update(
      &mut store,
      &name("alice"),
      &Amount::new(-1000, AssetSymbol::new("COIN")),
      &Amount::new(-100, AssetSymbol::new("BITUSD")),
      None,
      ChainTime::from_unix(10),
    )
    .unwrap();
    assert_eq!(store.find_balance(&name("alice"), &AssetSymbol::new("COIN")).unwrap().liquid, 1000);
    assert!(store.find_call_order_by_owner(&name("alice"), &AssetSymbol::new("BITUSD")).is_none());
  }

  #[test]
  fn option_order_create_opens_a_pool_and_mints_both_legs() {
    let mut store = setup();
    balance_engine::mint_liquid(&mut store, &name("alice"), &AssetSymbol::new("COIN"), 500).unwrap();
    option_order_create(
      &mut store,
      &name("alice"),
      &AssetSymbol::new("BITUSD"),
      &AssetSymbol::new("COIN"),
      &Amount::new(500, AssetSymbol::new("COIN")),
      ChainTime::from_unix(0),
    )
    .unwrap();
    let pool = store.all_option_pools().next().unwrap().1;
    assert_eq!(store.find_balance(&name("alice"), &pool.long_asset).unwrap().liquid, 500);
    assert_eq!(store.find_balance(&name("alice"), &pool.short_asset).unwrap().liquid, 500);
  }
}
