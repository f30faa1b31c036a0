//! Escrowed transfer evaluators (§3.9, §4.4 taxonomy row "Marketplace").
//! Escrowed principal is held in the asset's `pending_supply` accumulator
//! (§3.2) rather than any account balance, so `from`/`to` hold no claim on
//! it until `escrow_release` pays it out; the agent's fee is paid up front
//! as their payment for standing by, independent of how the escrow resolves.

use common::ChainTime;

use crate::amount::Amount;
use crate::balance_engine::{self, SubBalance};
use crate::error::{KernelError, KernelResult};
use crate::ids::{AccountName, EscrowId};
use crate::objects::Escrow;
use crate::store::Store;
use crate::virtual_op::VirtualOp;

#[allow(clippy::too_many_arguments)]
pub fn escrow_transfer(
  store: &mut Store,
  from: &AccountName,
  to: &AccountName,
  agent: &AccountName,
  escrow_id: EscrowId,
  amount: &Amount,
  fee: &Amount,
  ratification_deadline: ChainTime,
  escrow_expiration: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(from)?;
  store.get_account(to)?;
  store.get_account(agent)?;
  if amount.value <= 0 {
    return Err(KernelError::precondition("escrow amount must be positive"));
  }
  if fee.value < 0 || fee.symbol != amount.symbol {
    return Err(KernelError::precondition("escrow fee must be nonnegative and in the same asset"));
  }
  if ratification_deadline.as_unix() > escrow_expiration.as_unix() {
    return Err(KernelError::precondition("ratification deadline must precede escrow expiration"));
  }

  balance_engine::adjust_balance(store, from, &amount.symbol, SubBalance::Liquid, -(amount.value + fee.value))?;
  store.modify_dynamic(&amount.symbol, |d| d.pending_supply = d.pending_supply.saturating_add(amount.value as u64))?;
  if fee.value > 0 {
    balance_engine::adjust_balance(store, agent, &fee.symbol, SubBalance::Liquid, fee.value)?;
  }

  store.create_escrow(Escrow {
    id: escrow_id,
    from: from.clone(),
    to: to.clone(),
    agent: agent.clone(),
    amount: amount.clone(),
    fee: fee.clone(),
    ratification_deadline,
    escrow_expiration,
    to_approved: false,
    agent_approved: false,
    is_disputed: false,
  });
  Ok(Vec::new())
}

pub fn escrow_approve(store: &mut Store, who: &AccountName, escrow_id: EscrowId, approve: bool) -> KernelResult<Vec<VirtualOp>> {
  let escrow = store.find_escrow(escrow_id).ok_or_else(|| KernelError::not_found("escrow", escrow_id.to_string()))?;
  if *who == escrow.to {
    store.modify_escrow(escrow_id, |e| e.to_approved = approve);
  } else if *who == escrow.agent {
    store.modify_escrow(escrow_id, |e| e.agent_approved = approve);
  } else {
    return Err(KernelError::unauthorized("only the receiver or agent may approve an escrow"));
  }
  Ok(Vec::new())
}

pub fn escrow_dispute(store: &mut Store, who: &AccountName, escrow_id: EscrowId) -> KernelResult<Vec<VirtualOp>> {
  let escrow = store.find_escrow(escrow_id).ok_or_else(|| KernelError::not_found("escrow", escrow_id.to_string()))?;
  if *who != escrow.from && *who != escrow.to {
    return Err(KernelError::unauthorized("only the sender or receiver may dispute an escrow"));
  }
  if escrow.is_disputed {
    return Err(KernelError::precondition("escrow is already disputed"));
  }
  store.modify_escrow(escrow_id, |e| e.is_disputed = true);
  Ok(Vec::new())
}

pub fn escrow_release(
  store: &mut Store,
  who: &AccountName,
  escrow_id: EscrowId,
  receiver: &AccountName,
  amount: &Amount,
) -> KernelResult<Vec<VirtualOp>> {
  let escrow = store
    .find_escrow(escrow_id)
    .cloned()
    .ok_or_else(|| KernelError::not_found("escrow", escrow_id.to_string()))?;
  if amount.symbol != escrow.amount.symbol || amount.value <= 0 || amount.value > escrow.amount.value {
    return Err(KernelError::precondition("invalid release amount"));
  }

  if escrow.is_disputed {
    if *who != escrow.agent {
      return Err(KernelError::unauthorized("only the agent may release a disputed escrow"));
    }
    if *receiver != escrow.from && *receiver != escrow.to {
      return Err(KernelError::precondition("release receiver must be the sender or intended recipient"));
    }
  } else if (*who == escrow.from && *receiver == escrow.to) || (*who == escrow.to && *receiver == escrow.from) {
    // mutual release, either direction
  } else {
    return Err(KernelError::unauthorized("undisputed escrow releases require the sender or receiver to act"));
  }

  store.modify_dynamic(&amount.symbol, |d| d.pending_supply = d.pending_supply.saturating_sub(amount.value as u64))?;
  balance_engine::adjust_balance(store, receiver, &amount.symbol, SubBalance::Liquid, amount.value)?;
  store.modify_escrow(escrow_id, |e| e.amount.value -= amount.value);
  if store.find_escrow(escrow_id).map(|e| e.amount.value).unwrap_or(0) == 0 {
    store.remove_escrow(escrow_id);
  }
  Ok(Vec::new())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ChainSpec;
  use crate::ids::AssetSymbol;
  use crate::objects::Account;

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  fn setup() -> Store {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    let coin = AssetSymbol::new("COIN");
    store.ensure_asset_dynamic(&coin);
    for n in ["alice", "bob", "carol"] {
      let id = store.alloc_account_id();
      store.create_account(Account::new(id, name(n), format!("{n}-key"), ChainTime::from_unix(0))).unwrap();
    }
    balance_engine::mint_liquid(&mut store, &name("alice"), &coin, 1000).unwrap();
    store
  }

  #[test]
  fn transfer_parks_principal_and_pays_agent_fee_up_front() {
    let mut store = setup();
    let coin = AssetSymbol::new("COIN");
    escrow_transfer(
      &mut store,
      &name("alice"),
      &name("bob"),
      &name("carol"),
      EscrowId(1),
      &Amount::new(500, coin.clone()),
      &Amount::new(10, coin.clone()),
      ChainTime::from_unix(10),
      ChainTime::from_unix(100),
    )
    .unwrap();
    assert_eq!(store.find_balance(&name("alice"), &coin).unwrap().liquid, 490);
    assert_eq!(store.find_balance(&name("carol"), &coin).unwrap().liquid, 10);
    assert_eq!(store.get_dynamic(&coin).unwrap().pending_supply, 500);
  }

  #[test]
  fn mutual_release_pays_receiver_and_clears_escrow() {
    let mut store = setup();
    let coin = AssetSymbol::new("COIN");
    escrow_transfer(&mut store, &name("alice"), &name("bob"), &name("carol"), EscrowId(1), &Amount::new(500, coin.clone()), &Amount::zero(coin.clone()), ChainTime::from_unix(10), ChainTime::from_unix(100)).unwrap();
    escrow_release(&mut store, &name("alice"), EscrowId(1), &name("bob"), &Amount::new(500, coin.clone())).unwrap();
    assert_eq!(store.find_balance(&name("bob"), &coin).unwrap().liquid, 500);
    assert_eq!(store.get_dynamic(&coin).unwrap().pending_supply, 0);
    assert!(store.find_escrow(EscrowId(1)).is_none());
  }

  #[test]
  fn disputed_escrow_only_releases_via_agent() {
    let mut store = setup();
    let coin = AssetSymbol::new("COIN");
    escrow_transfer(&mut store, &name("alice"), &name("bob"), &name("carol"), EscrowId(1), &Amount::new(500, coin.clone()), &Amount::zero(coin.clone()), ChainTime::from_unix(10), ChainTime::from_unix(100)).unwrap();
    escrow_dispute(&mut store, &name("alice"), EscrowId(1)).unwrap();
    let err = escrow_release(&mut store, &name("alice"), EscrowId(1), &name("bob"), &Amount::new(500, coin.clone()));
    assert!(err.is_err());
    escrow_release(&mut store, &name("carol"), EscrowId(1), &name("alice"), &Amount::new(500, coin.clone())).unwrap();
    assert_eq!(store.find_balance(&name("alice"), &coin).unwrap().liquid, 1000);
  }
}
