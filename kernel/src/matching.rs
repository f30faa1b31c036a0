//! The order matching engine (§4.5). One logical book per ordered asset
//! pair; orders are matched price-time priority with the maker's exchange
//! rate always prevailing for the fill price (§4.5 step 2).
//!
//! There is no persistent sorted book structure here: `LimitOrder` records
//! are queried and sorted on demand from the store's `(id -> order)` table,
//! filtered to the relevant pair. This keeps the store's indexing honest
//! (§4.1 "iteration order is solely a function of the indexed keys") at the
//! cost of an O(n) scan per match, acceptable at the kernel's scale.

use common::ChainTime;

use crate::amount::{mul_div_u128, Amount};
use crate::error::{KernelError, KernelResult, MatchError};
use crate::ids::{AccountName, AssetSymbol, LimitOrderId};
use crate::store::Store;
use crate::virtual_op::VirtualOp;

/// A candidate maker, materialized from the book for comparison and
/// ordered by `(price ascending for the taker's ask, sequence)`.
struct Candidate {
  id: LimitOrderId,
  owner: AccountName,
  /// Remaining amount the maker is selling (the asset the taker wants).
  for_sale: u64,
  /// Remaining amount the maker wants in return (the asset the taker is selling).
  min_to_receive: u64,
}

/// Collects live (non-expired) makers selling `receive_symbol` for
/// `sell_symbol`, cheapest-for-the-taker first: ascending `min_to_receive /
/// for_sale`, ties broken by lower order id (older wins, §4.5 tie-break).
fn live_makers(
  store: &Store,
  sell_symbol: &AssetSymbol,
  receive_symbol: &AssetSymbol,
  now: ChainTime,
) -> Vec<Candidate> {
  let mut out: Vec<Candidate> = store
    .all_limit_orders()
    .filter(|(_, o)| {
      &o.for_sale.symbol == receive_symbol
        && &o.min_to_receive.symbol == sell_symbol
        && !o.is_expired(now)
        && o.for_sale.value > 0
    })
    .map(|(id, o)| Candidate {
      id: *id,
      owner: o.owner.clone(),
      for_sale: o.for_sale.value as u64,
      min_to_receive: o.min_to_receive.value as u64,
    })
    .collect();
  out.sort_by(|a, b| {
    let a_price = a.min_to_receive as u128 * b.for_sale as u128;
    let b_price = b.min_to_receive as u128 * a.for_sale as u128;
    a_price.cmp(&b_price).then_with(|| a.id.0.cmp(&b.id.0))
  });
  out
}

/// Result of attempting to cross a would-be taker position against the
/// book. `remaining` is what the taker still has on offer after every
/// possible fill; empty once fully filled.
pub struct MatchOutcome {
  pub remaining_for_sale: Amount,
  pub received: Amount,
  pub virtual_ops: Vec<VirtualOp>,
}

/// Matches a taker who is selling `for_sale` and wants at least the rate
/// implied by `min_to_receive` (§4.5 steps 1-4). Credits fills directly to
/// both sides' liquid balances and mutates/removes maker orders in place;
/// the caller is responsible for crediting the taker's *own* unfilled
/// remainder back to liquid if it places no resting order, or for leaving
/// it on the book otherwise.
pub fn match_taker(
  store: &mut Store,
  taker_owner: &AccountName,
  for_sale: Amount,
  min_to_receive: Amount,
  fill_or_kill: bool,
  now: ChainTime,
) -> KernelResult<MatchOutcome> {
  let sell_symbol = for_sale.symbol.clone();
  let receive_symbol = min_to_receive.symbol.clone();
  let mut remaining_sell = for_sale.value as u64;
  let taker_limit_num = min_to_receive.value as u64;
  let taker_limit_den = for_sale.value as u64;
  let mut received_total: u64 = 0;
  let mut ops = Vec::new();

  loop {
    if remaining_sell == 0 {
      break;
    }
    let makers = live_makers(store, &sell_symbol, &receive_symbol, now);
    let Some(best) = makers.into_iter().next() else { break };

    // Taker requires at least `taker_limit_num / taker_limit_den` of
    // receive_symbol per unit sold. The maker offers
    // `best.min_to_receive / best.for_sale` of sell_symbol per unit of
    // receive_symbol it gives up, i.e. the taker receives at rate
    // `best.for_sale / best.min_to_receive`. Cross only if that meets the
    // taker's floor: best.for_sale * taker_limit_den >= taker_limit_num * best.min_to_receive
    // is the wrong direction when min_to_receive (taker) is zero (market order);
    // a zero taker_limit_num always crosses.
    if taker_limit_num > 0 {
      let taker_needs = taker_limit_num as u128 * best.min_to_receive as u128;
      let maker_gives = best.for_sale as u128 * taker_limit_den as u128;
      if maker_gives < taker_needs {
        break; // best maker's price is worse than the taker will accept
      }
    }

    // Fill quantity, bounded by the maker's remaining inventory and the
    // taker's remaining sell amount, at the maker's price.
    let max_receive_from_remaining_sell =
      mul_div_u128(remaining_sell, best.for_sale, best.min_to_receive.max(1))?;
    let fill_receive = max_receive_from_remaining_sell.min(best.for_sale);
    if fill_receive == 0 {
      break;
    }
    let fill_pay = mul_div_u128(fill_receive, best.min_to_receive, best.for_sale.max(1))?.min(remaining_sell);

    // Credit both sides, drawing down the reserve each side parked in
    // `pending_supply` when its order was placed (§3.2; resting orders hold
    // their committed funds there rather than in any account's balance).
    crate::balance_engine::adjust_balance(
      store,
      taker_owner,
      &receive_symbol,
      crate::balance_engine::SubBalance::Liquid,
      fill_receive as i128,
    )?;
    store.modify_dynamic(&receive_symbol, |d| d.pending_supply = d.pending_supply.saturating_sub(fill_receive))?;
    crate::balance_engine::adjust_balance(
      store,
      &best.owner,
      &sell_symbol,
      crate::balance_engine::SubBalance::Liquid,
      fill_pay as i128,
    )?;
    store.modify_dynamic(&sell_symbol, |d| d.pending_supply = d.pending_supply.saturating_sub(fill_pay))?;

    remaining_sell -= fill_pay;
    received_total += fill_receive;

    let maker_remaining_for_sale = best.for_sale - fill_receive;
    let maker_remaining_min_to_receive = best.min_to_receive.saturating_sub(fill_pay);
    if maker_remaining_for_sale == 0 {
      store.remove_limit_order(best.id);
    } else {
      store.modify_limit_order(best.id, |o| {
        o.for_sale.value = maker_remaining_for_sale as i128;
        o.min_to_receive.value = maker_remaining_min_to_receive as i128;
      });
    }

    ops.push(VirtualOp::FillOrder {
      taker: taker_owner.clone(),
      maker: best.owner.clone(),
      maker_order_id: Some(best.id),
      taker_paid: Amount::new(fill_pay as i128, sell_symbol.clone()),
      taker_received: Amount::new(fill_receive as i128, receive_symbol.clone()),
    });
  }

  if fill_or_kill && remaining_sell > 0 {
    return Err(MatchError::FillOrKillUnfilled.into());
  }

  Ok(MatchOutcome {
    remaining_for_sale: Amount::new(remaining_sell as i128, sell_symbol),
    received: Amount::new(received_total as i128, receive_symbol),
    virtual_ops: ops,
  })
}

/// Re-runs matching for every resting order on `sell_symbol -> receive_symbol`
/// that is now marketable (used after a bitasset feed update makes a call
/// order callable, or after a pool price shift; §4.5 "invoked when ... a
/// feed update makes a call order callable"). Walks oldest-first so
/// earlier orders keep time priority.
pub fn resweep_pair(
  store: &mut Store,
  sell_symbol: &AssetSymbol,
  receive_symbol: &AssetSymbol,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  let mut ops = Vec::new();
  let mut ids: Vec<LimitOrderId> = store
    .all_limit_orders()
    .filter(|(_, o)| &o.for_sale.symbol == sell_symbol && &o.min_to_receive.symbol == receive_symbol)
    .map(|(id, _)| *id)
    .collect();
  ids.sort_by_key(|id| id.0);
  for id in ids {
    let Some(order) = store.find_limit_order(id).cloned() else { continue };
    if order.for_sale.value <= 0 {
      continue;
    }
    let outcome = match_taker(
      store,
      &order.owner,
      order.for_sale.clone(),
      order.min_to_receive.clone(),
      false,
      now,
    )?;
    ops.extend(outcome.virtual_ops);
    if outcome.remaining_for_sale.value == 0 {
      store.remove_limit_order(id);
    } else {
      store.modify_limit_order(id, |o| o.for_sale = outcome.remaining_for_sale.clone());
    }
  }
  Ok(ops)
}

pub fn validate_nonzero(amount: &Amount, what: &'static str) -> KernelResult<()> {
  if amount.value <= 0 {
    return Err(KernelError::precondition(format!("{what} must be positive")));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ChainSpec;
  use crate::ids::AssetSymbol;
  use crate::objects::LimitOrder;

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  fn setup() -> Store {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    store.ensure_asset_dynamic(&AssetSymbol::new("A"));
    store.ensure_asset_dynamic(&AssetSymbol::new("B"));
    store
  }

  #[test]
  fn full_cross_fills_both_sides() {
    let mut store = setup();
    crate::balance_engine::mint_liquid(&mut store, &name("bob"), &AssetSymbol::new("B"), 200).unwrap();
    let id = store.alloc_limit_order_id();
    store.create_limit_order(LimitOrder {
      id,
      owner: name("bob"),
      order_id: 1,
      for_sale: Amount::new(200, AssetSymbol::new("B")), // bob sells 200 B
      min_to_receive: Amount::new(100, AssetSymbol::new("A")), // wants 100 A -> price 0.5 A/B
      created: ChainTime::from_unix(0),
      expiration: None,
      fill_or_kill: false,
    });

    crate::balance_engine::mint_liquid(&mut store, &name("alice"), &AssetSymbol::new("A"), 100).unwrap();
    crate::balance_engine::adjust_balance(
      &mut store,
      &name("alice"),
      &AssetSymbol::new("A"),
      crate::balance_engine::SubBalance::Liquid,
      -100,
    )
    .unwrap();
    let outcome = match_taker(
      &mut store,
      &name("alice"),
      Amount::new(100, AssetSymbol::new("A")),
      Amount::new(200, AssetSymbol::new("B")),
      false,
      ChainTime::from_unix(0),
    )
    .unwrap();
    assert_eq!(outcome.remaining_for_sale.value, 0);
    assert_eq!(outcome.received.value, 200);
    assert_eq!(store.find_balance(&name("bob"), &AssetSymbol::new("A")).unwrap().liquid, 100);
    assert_eq!(store.find_balance(&name("alice"), &AssetSymbol::new("B")).unwrap().liquid, 200);
    assert!(store.find_limit_order(id).is_none());
  }

  #[test]
  fn price_outside_limit_does_not_cross() {
    let mut store = setup();
    crate::balance_engine::mint_liquid(&mut store, &name("bob"), &AssetSymbol::new("B"), 100).unwrap();
    store.create_limit_order(LimitOrder {
      id: store.alloc_limit_order_id(),
      owner: name("bob"),
      order_id: 1,
      for_sale: Amount::new(100, AssetSymbol::new("B")),
      min_to_receive: Amount::new(100, AssetSymbol::new("A")), // price 1 A/B
      created: ChainTime::from_unix(0),
      expiration: None,
      fill_or_kill: false,
    });
    let outcome = match_taker(
      &mut store,
      &name("alice"),
      Amount::new(10, AssetSymbol::new("A")),
      Amount::new(100, AssetSymbol::new("B")), // wants 10 A/B, worse than bob's ask isn't right direction
      false,
      ChainTime::from_unix(0),
    )
    .unwrap();
    // alice wants 100 B for 10 A (price 10 B/A); bob wants 1 A/B = 1 A per B,
    // i.e. alice would need to pay 100 A for 100 B -- alice's 10 A is insufficient price, no cross.
    assert_eq!(outcome.received.value, 0);
  }
}
