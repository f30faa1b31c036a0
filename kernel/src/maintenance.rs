//! The scheduled maintenance pass (§5), run at the close of the block that
//! crosses each maintenance interval. Order is fixed and load-bearing:
//! later steps may depend on state the earlier ones just settled (e.g. a
//! fresh feed median can make a call order liquidatable before loans are
//! swept).
//!
//! 1. feed medians
//! 2. expired orders
//! 3. matured loans
//! 4. cashouts
//! 5. delegations / unstakes / savings
//! 6. producer schedule refresh
//! 7. AMM pool price sampling

use common::ChainTime;

use crate::amount::{mul_div_u128, Amount};
use crate::balance_engine::{self, SubBalance};
use crate::config;
use crate::error::KernelResult;
use crate::ids::AssetSymbol;
use crate::matching;
use crate::operations::pools;
use crate::reward;
use crate::store::Store;
use crate::virtual_op::VirtualOp;

/// Runs every step in order and returns the concatenated virtual-op log.
pub fn run_maintenance(store: &mut Store, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  let mut ops = Vec::new();
  ops.extend(refresh_feed_medians(store, now)?);
  ops.extend(expire_orders(store, now));
  ops.extend(sweep_loans(store, now)?);
  reward::accrue_content_reward_fund(store, now);
  ops.extend(reward::run_cashouts(store, now)?);
  balance_engine::run_unstake_maintenance(store, now);
  balance_engine::run_delegation_maintenance(store, now);
  ops.extend(release_savings(store, now));
  refresh_producer_schedule(store);
  sample_pool_prices(store, now);
  Ok(ops)
}

/// Step 7: records a fresh spot-price sample into every liquidity pool's
/// hour/day oracle history (§4.6 "every maintenance tick records the spot
/// price into a ring buffer").
fn sample_pool_prices(store: &mut Store, now: ChainTime) {
  let pairs: Vec<(AssetSymbol, AssetSymbol)> = store.liquidity_pools_range().map(|(k, _)| k.clone()).collect();
  for (a, b) in pairs {
    let _ = store.modify_liquidity_pool(&a, &b, |p| p.record_sample(now));
  }
}

/// Step 1: recompute each bitasset's median feed, then liquidate any call
/// order whose collateral ratio has fallen below the maintenance
/// collateral ratio at the new price (§4.8, §4.5 "a feed update makes a
/// call order callable").
fn refresh_feed_medians(store: &mut Store, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  let mcr = store.median_props().bitasset_mcr;
  let symbols: Vec<AssetSymbol> = store.assets_range().map(|(s, _)| s.clone()).collect();
  let mut ops = Vec::new();
  for symbol in symbols {
    let Some(bitasset) = store.find_bitasset_data(&symbol) else { continue };
    if bitasset.is_globally_settled {
      continue;
    }
    let backing = bitasset.backing_asset.clone();
    store.modify_bitasset_data(&symbol, |b| b.recompute_median(now, config::FEED_MAX_AGE_SECONDS))?;
    let Some(feed) = store.find_bitasset_data(&symbol).and_then(|b| b.current_feed.clone()) else { continue };

    let calls: Vec<(crate::ids::CallOrderId, crate::objects::CallOrder)> =
      store.call_orders_for_debt_asset(&symbol).into_iter().map(|(id, o)| (*id, o.clone())).collect();
    for (id, call) in calls {
      let debt_value_in_collateral =
        mul_div_u128(call.debt.value.max(0) as u64, feed.settlement_price_num, feed.settlement_price_den.max(1))?;
      let ratio = call.collateral_ratio(debt_value_in_collateral);
      let below_mcr = ratio.map(|r| r < mcr).unwrap_or(false);
      if !below_mcr {
        continue;
      }
      ops.extend(liquidate_call_order(store, &symbol, &backing, id, call, now)?);
    }
  }
  Ok(ops)
}

fn liquidate_call_order(
  store: &mut Store,
  debt_symbol: &AssetSymbol,
  backing_symbol: &AssetSymbol,
  id: crate::ids::CallOrderId,
  call: crate::objects::CallOrder,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.remove_call_order(id);

  let outcome = matching::match_taker(
    store,
    &call.owner,
    call.collateral.clone(),
    Amount::zero(debt_symbol.clone()),
    false,
    now,
  )?;
  let mut ops = outcome.virtual_ops;
  let recovered_debt = (call.collateral.value.max(0) as u64).saturating_sub(outcome.remaining_for_sale.value.max(0) as u64);
  let closed = recovered_debt.min(call.debt.value.max(0) as u64).min(outcome.received.value.max(0) as u64);
  if closed > 0 {
    balance_engine::adjust_balance(store, &call.owner, debt_symbol, SubBalance::Liquid, -(closed as i128))?;
  }
  if outcome.remaining_for_sale.value > 0 {
    balance_engine::adjust_balance(
      store,
      &call.owner,
      backing_symbol,
      SubBalance::Liquid,
      outcome.remaining_for_sale.value,
    )?;
  }
  ops.push(VirtualOp::CallOrderLiquidated {
    owner: call.owner,
    order_id: id,
    collateral_returned: outcome.remaining_for_sale,
    debt_closed: Amount::new(closed as i128, debt_symbol.clone()),
  });
  Ok(ops)
}

/// Step 2: returns every expired limit, margin, and auction order's
/// remaining funds to its owner (§3.4 "expiration").
fn expire_orders(store: &mut Store, now: ChainTime) -> Vec<VirtualOp> {
  let mut ops = Vec::new();

  let expired_limits: Vec<_> = store
    .all_limit_orders()
    .filter(|(_, o)| o.is_expired(now))
    .map(|(id, o)| (*id, o.owner.clone(), o.for_sale.clone()))
    .collect();
  for (id, owner, for_sale) in expired_limits {
    store.remove_limit_order(id);
    let _ = balance_engine::adjust_balance(store, &owner, &for_sale.symbol, SubBalance::Liquid, for_sale.value);
    ops.push(VirtualOp::LimitOrderCancelled { owner, order_id: id, returned: for_sale });
  }

  let expired_auctions: Vec<_> = store
    .all_auction_orders()
    .filter(|(_, o)| o.expiration.is_past(now))
    .map(|(id, o)| (*id, o.owner.clone(), o.for_sale.clone()))
    .collect();
  for (id, owner, for_sale) in expired_auctions {
    store.remove_auction_order(id);
    let _ = balance_engine::adjust_balance(store, &owner, &for_sale.symbol, SubBalance::Liquid, for_sale.value);
  }

  ops
}

/// Step 3: accrues interest on every open credit loan and liquidates any
/// whose collateral has fallen below the pool's liquidation ratio,
/// valuing collateral at the pool's own rolling oracle price (§4.7.1).
fn sweep_loans(store: &mut Store, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  let liquidation_ratio = store.median_props().credit_liquidation_ratio;
  let loan_ids: Vec<crate::ids::CreditLoanId> = store.all_credit_loans().map(|(id, _)| *id).collect();
  let mut ops = Vec::new();

  for id in loan_ids {
    let Some(loan) = store.find_credit_loan(id).cloned() else { continue };
    let debt_symbol = loan.debt.symbol.clone();
    let Some(pool) = store.find_credit_pool(&debt_symbol).cloned() else { continue };

    let interest = loan.accrued_interest(now, pool.interest_rate());
    if interest > 0 {
      let network_fee = interest * config::INTEREST_FEE_PERCENT / config::PERCENT_100;
      store.modify_credit_loan(id, |l| {
        l.debt.value += interest as i128;
        l.last_interest_time = now;
      });
      store.modify_credit_pool(&debt_symbol, |p| p.borrowed_balance = p.borrowed_balance.saturating_add(interest))?;
      ops.push(VirtualOp::LoanInterestAccrued {
        owner: loan.owner.clone(),
        loan_id: id,
        interest: Amount::new(interest as i128, debt_symbol.clone()),
        network_fee: Amount::new(network_fee as i128, debt_symbol.clone()),
      });
    }

    let loan = store.find_credit_loan(id).cloned().expect("just modified");
    if loan.is_flash || loan.collateral.value == 0 {
      continue;
    }
    // Collateral valued in debt terms via the pair's AMM hour-median
    // (§4.7.1); `pool.last_price_num/den` is the lender satellite-share
    // exchange rate, not a collateral oracle, and must not be used here.
    let collateral_value_in_debt = match pools::value_in(store, &loan.collateral, &debt_symbol) {
      Ok(value) => value,
      Err(_) => continue, // no AMM pair to price this collateral against yet
    };
    if collateral_value_in_debt == 0 {
      continue;
    }
    let ratio = (collateral_value_in_debt as u128 * config::PERCENT_100 as u128 / loan.debt.value.max(1) as u128) as u64;
    if ratio >= liquidation_ratio {
      continue;
    }

    let recovered = collateral_value_in_debt.min(loan.debt.value.max(0) as u64);
    let shortfall = (loan.debt.value.max(0) as u64).saturating_sub(recovered);
    let collateral_forfeited = loan.collateral.value.max(0) as u64;
    store.remove_credit_loan(id);
    store.modify_credit_pool(&debt_symbol, |p| {
      p.borrowed_balance = p.borrowed_balance.saturating_sub(loan.debt.value.max(0) as u64);
      p.base_balance = p.base_balance.saturating_add(recovered);
    })?;
    store.credit_collateral_mut(&loan.owner, &loan.collateral.symbol, crate::ids::CreditCollateralId(0), |c| {
      c.collateral.value = (c.collateral.value - loan.collateral.value).max(0);
    });
    // The forfeited collateral never passes through any account's liquid
    // balance or a pool's reserves; model its disposal as an implicit
    // AMM-equivalent settlement so both assets stay balanced: burn the
    // collateral out of existence and mint the recovered value straight
    // into the debt asset's pending pool (§3.3 `is_balanced` invariant).
    store.modify_dynamic(&loan.collateral.symbol, |d| {
      d.total_supply = d.total_supply.saturating_sub(collateral_forfeited);
      d.pending_supply = d.pending_supply.saturating_sub(collateral_forfeited);
    })?;
    store.modify_dynamic(&debt_symbol, |d| {
      d.total_supply = d.total_supply.saturating_add(recovered);
      d.pending_supply = d.pending_supply.saturating_add(recovered);
    })?;
    ops.push(VirtualOp::LoanLiquidated {
      owner: loan.owner,
      loan_id: id,
      shortfall: Amount::new(shortfall as i128, debt_symbol),
    });
  }
  Ok(ops)
}

/// Step 5 (savings leg): releases every matured `from_savings` withdrawal
/// into the recipient's liquid balance (§3.9, §4.4).
fn release_savings(store: &mut Store, now: ChainTime) -> Vec<VirtualOp> {
  let due: Vec<_> = store.due_savings_withdraws(now).into_iter().map(|(id, w)| (*id, w.clone())).collect();
  for (id, w) in due {
    store.remove_savings_withdraw(id);
    let _ = balance_engine::adjust_balance(store, &w.to, &w.amount.symbol, SubBalance::Liquid, w.amount.value);
  }
  Vec::new()
}

/// Step 6: rebuilds the active producer schedule from vote-ranked
/// candidates (§3.8, §4.11). Every registered, active producer takes a
/// slot; ties break by account name for determinism.
fn refresh_producer_schedule(store: &mut Store) {
  let mut candidates: Vec<_> = store.all_producers().filter(|(_, p)| p.is_active).map(|(name, p)| (name.clone(), p.vote_weight)).collect();
  candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
  store.producer_schedule.slots = candidates.into_iter().map(|(name, _)| name).collect();
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ChainSpec;
  use crate::ids::AccountName;
  use crate::objects::LimitOrder;

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  #[test]
  fn expired_limit_order_returns_funds() {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    store.ensure_asset_dynamic(&AssetSymbol::new("COIN"));
    store.ensure_asset_dynamic(&AssetSymbol::new("USD"));
    let id = store.alloc_limit_order_id();
    store.create_limit_order(LimitOrder {
      id,
      owner: name("alice"),
      order_id: 1,
      for_sale: Amount::new(100, AssetSymbol::new("COIN")),
      min_to_receive: Amount::new(100, AssetSymbol::new("USD")),
      created: ChainTime::from_unix(0),
      expiration: Some(ChainTime::from_unix(10)),
      fill_or_kill: false,
    });
    let ops = expire_orders(&mut store, ChainTime::from_unix(11));
    assert_eq!(ops.len(), 1);
    assert_eq!(store.find_balance(&name("alice"), &AssetSymbol::new("COIN")).unwrap().liquid, 100);
    assert!(store.find_limit_order(id).is_none());
  }

  #[test]
  fn producer_schedule_ranks_by_vote_weight() {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    for (n, w) in [("producer1", 10u64), ("producer2", 50)] {
      let pid = crate::ids::ProducerId(w);
      store
        .create_producer(crate::objects::Producer {
          id: pid,
          owner: name(n),
          signing_key: "key".into(),
          vote_weight: w,
          total_missed: 0,
          last_confirmed_block: 0,
          props: Default::default(),
          is_active: true,
          created: ChainTime::from_unix(0),
        })
        .unwrap();
    }
    refresh_producer_schedule(&mut store);
    assert_eq!(store.producer_schedule.slots, vec![name("producer2"), name("producer1")]);
  }
}
