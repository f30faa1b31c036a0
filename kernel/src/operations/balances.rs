//! Liquid transfer, staking, savings, and delegation evaluators (§4.4
//! taxonomy rows "Transfers", "Staking", "Delegation"). These are thin
//! wrappers around `balance_engine`'s primitives: the evaluator's job is
//! entity resolution and precondition checks, not balance arithmetic.

use common::ChainTime;

use crate::amount::Amount;
use crate::balance_engine;
use crate::config;
use crate::error::{KernelError, KernelResult};
use crate::ids::{AccountName, AssetSymbol};
use crate::objects::SavingsWithdraw;
use crate::store::Store;
use crate::virtual_op::VirtualOp;

fn require_positive(amount: &Amount) -> KernelResult<u64> {
  if amount.value <= 0 {
    return Err(KernelError::precondition("amount must be positive"));
  }
  Ok(amount.value as u64)
}

pub fn transfer(store: &mut Store, from: &AccountName, to: &AccountName, amount: &Amount) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(from)?;
  store.get_account(to)?;
  let value = require_positive(amount)?;
  balance_engine::transfer_liquid(store, from, to, &amount.symbol, value)?;
  Ok(Vec::new())
}

pub fn claim_reward(store: &mut Store, account: &AccountName, amount: &Amount) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(account)?;
  let value = require_positive(amount)?;
  balance_engine::claim_reward(store, account, &amount.symbol, value)?;
  Ok(Vec::new())
}

pub fn stake(store: &mut Store, account: &AccountName, symbol: &AssetSymbol, amount: u64) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(account)?;
  if amount == 0 {
    return Err(KernelError::precondition("stake amount must be positive"));
  }
  balance_engine::stake(store, account, symbol, amount)?;
  Ok(Vec::new())
}

pub fn unstake(store: &mut Store, account: &AccountName, symbol: &AssetSymbol, amount: u64, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(account)?;
  if amount == 0 {
    return Err(KernelError::precondition("unstake amount must be positive"));
  }
  let asset = store.get_asset(symbol)?;
  let intervals = asset.unstake_intervals.max(1);
  balance_engine::begin_unstake(store, account, symbol, amount, intervals, now)?;
  Ok(Vec::new())
}

pub fn to_savings(store: &mut Store, from: &AccountName, to: &AccountName, amount: &Amount) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(from)?;
  store.get_account(to)?;
  let value = require_positive(amount)?;
  balance_engine::adjust_balance(store, from, &amount.symbol, balance_engine::SubBalance::Liquid, -(value as i128))?;
  balance_engine::adjust_balance(store, to, &amount.symbol, balance_engine::SubBalance::Savings, value as i128)?;
  Ok(Vec::new())
}

pub fn from_savings(
  store: &mut Store,
  account: &AccountName,
  to: &AccountName,
  amount: &Amount,
  memo: &str,
  request_id: u32,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(account)?;
  store.get_account(to)?;
  let value = require_positive(amount)?;
  balance_engine::adjust_balance(store, account, &amount.symbol, balance_engine::SubBalance::Savings, -(value as i128))?;
  let id = store.alloc_savings_withdraw_id();
  store.create_savings_withdraw(SavingsWithdraw {
    id,
    from: account.clone(),
    to: to.clone(),
    amount: amount.clone(),
    memo: memo.to_string(),
    request_id,
    complete: now.saturating_add_secs(config::SAVINGS_WITHDRAW_DELAY_SECONDS),
  });
  Ok(Vec::new())
}

pub fn delegate(
  store: &mut Store,
  delegator: &AccountName,
  delegatee: &AccountName,
  symbol: &AssetSymbol,
  amount: u64,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(delegator)?;
  store.get_account(delegatee)?;
  balance_engine::delegate_asset(store, delegator, delegatee, symbol, amount, now)?;
  Ok(Vec::new())
}

pub fn undelegate(store: &mut Store, delegator: &AccountName, delegatee: &AccountName, symbol: &AssetSymbol, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(delegator)?;
  store.get_account(delegatee)?;
  balance_engine::undelegate_asset(store, delegator, delegatee, symbol, now)?;
  Ok(Vec::new())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ChainSpec;
  use crate::objects::{Account, Asset, AssetKind};

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  fn setup() -> Store {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    let coin = AssetSymbol::new("COIN");
    store.ensure_asset_dynamic(&coin);
    store
      .create_asset(Asset {
        id: store.alloc_asset_id(),
        symbol: coin.clone(),
        kind: AssetKind::Currency,
        issuer: None,
        max_supply: u64::MAX,
        stake_intervals: 1,
        unstake_intervals: 4,
        market_fee_percent: 0,
        permissions: u32::MAX,
        flags: u32::MAX,
        created: ChainTime::from_unix(0),
      })
      .unwrap();
    for n in ["alice", "bob"] {
      let id = store.alloc_account_id();
      store.create_account(Account::new(id, name(n), format!("{n}-key"), ChainTime::from_unix(0))).unwrap();
    }
    store
  }

  #[test]
  fn transfer_requires_positive_amount() {
    let mut store = setup();
    let coin = AssetSymbol::new("COIN");
    balance_engine::mint_liquid(&mut store, &name("alice"), &coin, 100).unwrap();
    assert!(transfer(&mut store, &name("alice"), &name("bob"), &Amount::new(0, coin.clone())).is_err());
    transfer(&mut store, &name("alice"), &name("bob"), &Amount::new(40, coin.clone())).unwrap();
    assert_eq!(store.find_balance(&name("bob"), &coin).unwrap().liquid, 40);
  }

  #[test]
  fn savings_round_trip_respects_the_delay() {
    let mut store = setup();
    let coin = AssetSymbol::new("COIN");
    balance_engine::mint_liquid(&mut store, &name("alice"), &coin, 100).unwrap();
    to_savings(&mut store, &name("alice"), &name("alice"), &Amount::new(100, coin.clone())).unwrap();
    assert_eq!(store.find_balance(&name("alice"), &coin).unwrap().savings, 100);
    from_savings(&mut store, &name("alice"), &name("bob"), &Amount::new(100, coin.clone()), "", 0, ChainTime::from_unix(0)).unwrap();
    assert_eq!(store.find_balance(&name("alice"), &coin).unwrap().savings, 0);
    assert_eq!(store.find_balance(&name("bob"), &coin).unwrap().liquid, 0);
  }

  #[test]
  fn unstake_uses_the_assets_configured_interval_count() {
    let mut store = setup();
    let coin = AssetSymbol::new("COIN");
    balance_engine::mint_liquid(&mut store, &name("alice"), &coin, 1000).unwrap();
    stake(&mut store, &name("alice"), &coin, 1000).unwrap();
    unstake(&mut store, &name("alice"), &coin, 1000, ChainTime::from_unix(0)).unwrap();
    let b = store.find_balance(&name("alice"), &coin).unwrap();
    assert_eq!(b.unstake_cursor.as_ref().unwrap().intervals_total, 4);
  }
}
