//! The balance engine (§4.4): one primitive per named sub-balance, each
//! keeping the owning asset's `AssetDynamicData` accumulator in lock-step
//! so the §3.2 identity (`total == sum of sub-balances`) never drifts.

use common::ChainTime;

use crate::config;
use crate::error::{KernelError, KernelResult};
use crate::ids::{AccountName, AssetSymbol};
use crate::objects::{AssetDelegation, AssetDelegationExpiration, UnstakeCursor};
use crate::store::Store;

/// The seven sub-balance kinds a primitive mutator can target, plus the
/// `Total` pseudo-kind used only for the supply accumulator (minting /
/// burning at the edges of the system: issue, reserve, fees).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubBalance {
  Liquid,
  Staked,
  Reward,
  Savings,
  Unstaking,
}

fn adjust_dynamic(store: &mut Store, symbol: &AssetSymbol, kind: SubBalance, delta: i128) -> KernelResult<()> {
  store.modify_dynamic(symbol, |d| {
    let apply = |field: &mut u64| {
      *field = if delta >= 0 { field.saturating_add(delta as u64) } else { field.saturating_sub((-delta) as u64) };
    };
    match kind {
      SubBalance::Liquid => apply(&mut d.liquid_supply),
      SubBalance::Staked => apply(&mut d.staked_supply),
      SubBalance::Reward => apply(&mut d.reward_supply),
      SubBalance::Savings => apply(&mut d.savings_supply),
      SubBalance::Unstaking => {} // folded into staked_supply by convention; see adjust_staked
    }
  })?;
  Ok(())
}

/// Adjusts one account's named sub-balance by `delta` (may be negative),
/// enforcing non-negativity (§3.3 invariant) and mirroring the change into
/// the asset's dynamic-data accumulator.
pub fn adjust_balance(
  store: &mut Store,
  owner: &AccountName,
  symbol: &AssetSymbol,
  kind: SubBalance,
  delta: i128,
) -> KernelResult<()> {
  if delta == 0 {
    return Ok(());
  }
  let mut underflow = false;
  store.balance_mut(owner, symbol, |b| {
    let field = match kind {
      SubBalance::Liquid => &mut b.liquid,
      SubBalance::Staked => &mut b.staked,
      SubBalance::Reward => &mut b.reward_pending,
      SubBalance::Savings => &mut b.savings,
      SubBalance::Unstaking => &mut b.unstaking,
    };
    if delta < 0 && (*field as i128) < -delta {
      underflow = true;
      return;
    }
    *field = (*field as i128 + delta) as u64;
  });
  if underflow {
    return Err(KernelError::precondition(format!(
      "insufficient {:?} balance of {symbol} for {owner}",
      kind
    )));
  }
  adjust_dynamic(store, symbol, kind, delta)
}

/// Moves `amount` of `symbol` from `from`'s liquid balance to `to`'s liquid
/// balance (the `transfer` operation's core effect; §4.3 taxonomy row
/// "Transfers").
pub fn transfer_liquid(
  store: &mut Store,
  from: &AccountName,
  to: &AccountName,
  symbol: &AssetSymbol,
  amount: u64,
) -> KernelResult<()> {
  adjust_balance(store, from, symbol, SubBalance::Liquid, -(amount as i128))?;
  adjust_balance(store, to, symbol, SubBalance::Liquid, amount as i128)
}

/// Mints `amount` of `symbol` into `to`'s liquid balance and the asset's
/// total supply (asset issuance, PoW/content rewards, interest payouts).
pub fn mint_liquid(store: &mut Store, to: &AccountName, symbol: &AssetSymbol, amount: u64) -> KernelResult<()> {
  store.modify_dynamic(symbol, |d| d.total_supply = d.total_supply.saturating_add(amount))?;
  adjust_balance(store, to, symbol, SubBalance::Liquid, amount as i128)
}

/// Burns `amount` of `symbol` from `from`'s liquid balance and the asset's
/// total supply (asset reserve, fee burns).
pub fn burn_liquid(store: &mut Store, from: &AccountName, symbol: &AssetSymbol, amount: u64) -> KernelResult<()> {
  adjust_balance(store, from, symbol, SubBalance::Liquid, -(amount as i128))?;
  store.modify_dynamic(symbol, |d| d.total_supply = d.total_supply.saturating_sub(amount))?;
  Ok(())
}

/// Begins or tops up a stake vesting schedule: moves `amount` from liquid
/// into the gradual stake cursor, to be walked forward by
/// `run_stake_maintenance` every `STAKE_WITHDRAW_INTERVAL_SECONDS` (§4.4).
/// This simplified model stakes immediately and relies on the symmetric
/// `begin_unstake` to model the gradual side of vesting, matching how the
/// original reserves the *unstake* path for multi-tranche release while
/// staking itself is instantaneous.
pub fn stake(store: &mut Store, owner: &AccountName, symbol: &AssetSymbol, amount: u64) -> KernelResult<()> {
  adjust_balance(store, owner, symbol, SubBalance::Liquid, -(amount as i128))?;
  adjust_balance(store, owner, symbol, SubBalance::Staked, amount as i128)
}

/// Begins an unstake: splits `amount` out of `staked` into the balance's
/// `unstake_cursor`, to be released in `unstake_intervals` even tranches
/// by maintenance (§3.3, §4.4).
pub fn begin_unstake(
  store: &mut Store,
  owner: &AccountName,
  symbol: &AssetSymbol,
  amount: u64,
  intervals: u32,
  now: ChainTime,
) -> KernelResult<()> {
  let balance = store
    .find_balance(owner, symbol)
    .ok_or_else(|| KernelError::precondition("no staked balance to unstake"))?;
  if balance.staked < amount {
    return Err(KernelError::precondition("insufficient staked balance to unstake"));
  }
  if intervals == 0 {
    return Err(KernelError::invariant("unstake_intervals must be positive"));
  }
  store.balance_mut(owner, symbol, |b| {
    b.staked -= amount;
    b.unstaking += amount;
    b.unstake_cursor = Some(UnstakeCursor {
      total_unstaking: amount,
      already_withdrawn: 0,
      intervals_total: intervals,
      intervals_withdrawn: 0,
      next_withdrawal: now.saturating_add_secs(config::STAKE_WITHDRAW_INTERVAL_SECONDS),
    });
  });
  Ok(())
}

/// Walks every balance's unstake cursor forward by one tranche if its
/// `next_withdrawal` has arrived, moving the tranche amount from
/// `unstaking` to `liquid` (§4.4, maintenance order item 3 "matured
/// loans" sibling task). Returns the number of tranches released.
pub fn run_unstake_maintenance(store: &mut Store, now: ChainTime) -> usize {
  let mut released = 0usize;
  let due: Vec<(AccountName, AssetSymbol)> = {
    let mut out = Vec::new();
    for (key, balance) in all_balances(store) {
      if let Some(cursor) = &balance.unstake_cursor {
        if cursor.next_withdrawal.is_past(now) && cursor.intervals_withdrawn < cursor.intervals_total {
          out.push(key.clone());
        }
      }
    }
    out
  };
  for (owner, symbol) in due {
    store.balance_mut(&owner, &symbol, |b| {
      let Some(cursor) = &mut b.unstake_cursor else { return };
      let remaining_intervals = cursor.intervals_total - cursor.intervals_withdrawn;
      let remaining_amount = cursor.total_unstaking - cursor.already_withdrawn;
      let tranche = if remaining_intervals <= 1 { remaining_amount } else { remaining_amount / remaining_intervals as u64 };
      b.unstaking = b.unstaking.saturating_sub(tranche);
      b.liquid = b.liquid.saturating_add(tranche);
      let cursor = b.unstake_cursor.as_mut().expect("checked above");
      cursor.already_withdrawn += tranche;
      cursor.intervals_withdrawn += 1;
      if cursor.intervals_withdrawn >= cursor.intervals_total {
        b.unstake_cursor = None;
      } else {
        cursor.next_withdrawal = cursor.next_withdrawal.saturating_add_secs(config::STAKE_WITHDRAW_INTERVAL_SECONDS);
      }
    });
    released += 1;
  }
  released
}

fn all_balances(store: &Store) -> Vec<((AccountName, AssetSymbol), crate::objects::Balance)> {
  // There is no whole-table accessor by design (callers should range by
  // account); maintenance is the one legitimate full scan, so it goes
  // through the accounts table to enumerate owners deterministically and
  // then range each account's balances.
  let mut out = Vec::new();
  for (name, _) in store.accounts_range() {
    for (key, balance) in store.balances_for_account(name) {
      out.push((key.clone(), balance.clone()));
    }
  }
  out
}

/// Delegates voting/usage power from `delegator`'s staked balance to
/// `delegatee`'s receiving balance without moving ownership (§4.4). The
/// power returns after `min_delegation_time` has elapsed *and* the
/// delegator explicitly un-delegates (modeled here as the cool-down
/// floor enforced at un-delegation time, not an automatic expiry).
pub fn delegate_asset(
  store: &mut Store,
  delegator: &AccountName,
  delegatee: &AccountName,
  symbol: &AssetSymbol,
  amount: u64,
  min_delegation_time: ChainTime,
) -> KernelResult<()> {
  let balance = store.find_balance(delegator, symbol).cloned().unwrap_or_else(|| crate::objects::Balance::new(delegator.clone(), symbol.clone()));
  let existing = store.find_asset_delegation(delegator, delegatee, symbol).map(|d| d.amount.value as u64).unwrap_or(0);
  if balance.staked + existing < amount {
    return Err(KernelError::precondition("insufficient staked balance to delegate"));
  }
  let already_delegated_elsewhere = balance.delegated_out - existing;
  let delta = amount as i128 - existing as i128;
  if delta > 0 {
    if balance.staked < already_delegated_elsewhere + delta as u64 {
      return Err(KernelError::precondition("insufficient undelegated stake"));
    }
  }
  store.balance_mut(delegator, symbol, |b| {
    b.delegated_out = (b.delegated_out as i128 - existing as i128 + amount as i128) as u64;
  });
  store.balance_mut(delegatee, symbol, |b| {
    b.received_delegations = (b.received_delegations as i128 - existing as i128 + amount as i128) as u64;
  });
  let d = AssetDelegation {
    delegator: delegator.clone(),
    delegatee: delegatee.clone(),
    amount: crate::amount::Amount::new(amount as i128, symbol.clone()),
    min_delegation_time,
  };
  store.create_asset_delegation(d);
  Ok(())
}

/// Begins returning a delegation: removes the delegatee's received power
/// immediately and schedules the delegator's stake to become free again
/// after a cool-down (content reward interval or `min_delegation_time`,
/// whichever is later — §4.4).
pub fn undelegate_asset(
  store: &mut Store,
  delegator: &AccountName,
  delegatee: &AccountName,
  symbol: &AssetSymbol,
  now: ChainTime,
) -> KernelResult<()> {
  let delegation = store
    .find_asset_delegation(delegator, delegatee, symbol)
    .cloned()
    .ok_or_else(|| KernelError::not_found("asset_delegation", format!("{delegator}->{delegatee}/{symbol}")))?;
  store.remove_asset_delegation(delegator, delegatee, symbol);
  store.balance_mut(delegatee, symbol, |b| {
    b.received_delegations = b.received_delegations.saturating_sub(delegation.amount.value as u64);
  });
  let cooldown = now
    .saturating_add_secs(config::CASHOUT_WINDOW_SECONDS)
    .max(delegation.min_delegation_time);
  let id = store.alloc_delegation_expiration_id();
  store.create_delegation_expiration(AssetDelegationExpiration {
    id,
    delegator: delegator.clone(),
    amount: delegation.amount,
    expiration: cooldown,
  });
  Ok(())
}

/// Releases every matured delegation expiration, returning the delegator's
/// `delegated_out` accounting to zero for that slice (§4.4, maintenance
/// order item 5 "delegations").
pub fn run_delegation_maintenance(store: &mut Store, now: ChainTime) -> usize {
  let due: Vec<_> = store.due_delegation_expirations(now).into_iter().map(|(id, e)| (*id, e.clone())).collect();
  for (id, exp) in &due {
    store.remove_delegation_expiration(*id);
    store.balance_mut(&exp.delegator, &exp.amount.symbol, |b| {
      b.delegated_out = b.delegated_out.saturating_sub(exp.amount.value as u64);
    });
  }
  due.len()
}

/// Claims `amount` of pending reward into liquid/staked, diverting a
/// revenue-share fraction to any equity/credit assets the claimant holds
/// first (§4.4 "Reward claim"). `REWARD_STAKED_PERCENT` of the remainder
/// is staked; the rest goes liquid.
pub fn claim_reward(store: &mut Store, owner: &AccountName, symbol: &AssetSymbol, amount: u64) -> KernelResult<()> {
  adjust_balance(store, owner, symbol, SubBalance::Reward, -(amount as i128))?;

  let mut remaining = amount;
  let holdings = all_balances_for(store, owner);
  for (held_symbol, balance) in holdings {
    if balance.liquid + balance.staked == 0 {
      continue;
    }
    let Some(equity) = store.find_equity_data(&held_symbol) else { continue };
    if equity.dividend_asset != *symbol {
      continue;
    }
    let share = (remaining as u128 * equity.revenue_share_percent as u128 / config::PERCENT_100 as u128) as u64;
    if share == 0 {
      continue;
    }
    store.modify_equity_data(&held_symbol, |e| e.dividend_pool = e.dividend_pool.saturating_add(share))?;
    remaining -= share;
  }

  let staked_part = (remaining as u128 * config::REWARD_STAKED_PERCENT as u128 / config::PERCENT_100 as u128) as u64;
  let liquid_part = remaining - staked_part;
  adjust_balance(store, owner, symbol, SubBalance::Staked, staked_part as i128)?;
  adjust_balance(store, owner, symbol, SubBalance::Liquid, liquid_part as i128)
}

fn all_balances_for(store: &Store, owner: &AccountName) -> Vec<(AssetSymbol, crate::objects::Balance)> {
  store.balances_for_account(owner).map(|((_, symbol), balance)| (symbol.clone(), balance.clone())).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ChainSpec;
  use crate::ids::AssetSymbol;

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  fn setup() -> Store {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    store.ensure_asset_dynamic(&AssetSymbol::new("COIN"));
    store
  }

  #[test]
  fn transfer_moves_liquid_both_ways() {
    let mut store = setup();
    mint_liquid(&mut store, &name("alice"), &AssetSymbol::new("COIN"), 1000).unwrap();
    transfer_liquid(&mut store, &name("alice"), &name("bob"), &AssetSymbol::new("COIN"), 400).unwrap();
    assert_eq!(store.find_balance(&name("alice"), &AssetSymbol::new("COIN")).unwrap().liquid, 600);
    assert_eq!(store.find_balance(&name("bob"), &AssetSymbol::new("COIN")).unwrap().liquid, 400);
  }

  #[test]
  fn transfer_insufficient_balance_fails_and_keeps_state() {
    let mut store = setup();
    mint_liquid(&mut store, &name("alice"), &AssetSymbol::new("COIN"), 100).unwrap();
    let err = transfer_liquid(&mut store, &name("alice"), &name("bob"), &AssetSymbol::new("COIN"), 400);
    assert!(err.is_err());
    assert_eq!(store.find_balance(&name("alice"), &AssetSymbol::new("COIN")).unwrap().liquid, 100);
  }

  #[test]
  fn stake_then_full_unstake_returns_to_liquid() {
    let mut store = setup();
    let coin = AssetSymbol::new("COIN");
    mint_liquid(&mut store, &name("alice"), &coin, 1000).unwrap();
    stake(&mut store, &name("alice"), &coin, 1000).unwrap();
    begin_unstake(&mut store, &name("alice"), &coin, 1000, 4, ChainTime::from_unix(0)).unwrap();
    let mut now = ChainTime::from_unix(0);
    for _ in 0..4 {
      now = now.saturating_add_secs(config::STAKE_WITHDRAW_INTERVAL_SECONDS);
      run_unstake_maintenance(&mut store, now);
    }
    let b = store.find_balance(&name("alice"), &coin).unwrap();
    assert_eq!(b.liquid, 1000);
    assert_eq!(b.staked, 0);
    assert_eq!(b.unstaking, 0);
    assert!(b.unstake_cursor.is_none());
  }
}
