//! Producer registration and slashing evaluators (§3.8, §4.11 taxonomy
//! row "Producers"). Vote weight itself is carried by `account::witness_vote`;
//! these two evaluators own a producer's own signing key and its violation
//! record.

use common::ChainTime;

use crate::config;
use crate::error::{KernelError, KernelResult};
use crate::ids::AccountName;
use crate::objects::Producer;
use crate::store::Store;
use crate::virtual_op::VirtualOp;

pub fn producer_update(store: &mut Store, owner: &AccountName, signing_key: &str, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(owner)?;
  if signing_key.is_empty() {
    return Err(KernelError::precondition("signing key must not be empty"));
  }
  if store.find_producer(owner).is_some() {
    store.modify_producer(owner, |p| {
      p.signing_key = signing_key.to_string();
      p.is_active = true;
    })?;
  } else {
    let id = store.alloc_producer_id();
    store.create_producer(Producer::new(id, owner.clone(), signing_key.to_string(), now))?;
  }
  Ok(Vec::new())
}

/// Records a reported consensus violation (double-signing, unavailability
/// past a missed-block threshold — the exact trigger is the host consensus
/// layer's concern; the kernel only tallies it, §1 Non-goals). Deactivates
/// the producer once `PRODUCER_VIOLATION_DEACTIVATION_THRESHOLD` is reached.
pub fn producer_violation(store: &mut Store, reporter: &AccountName, producer: &AccountName) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(reporter)?;
  store.find_producer(producer).ok_or_else(|| KernelError::not_found("producer", producer.to_string()))?;
  let mut slashed = false;
  store.modify_producer(producer, |p| {
    p.total_missed += 1;
    if p.total_missed >= config::PRODUCER_VIOLATION_DEACTIVATION_THRESHOLD {
      p.is_active = false;
      slashed = true;
    }
  })?;
  if slashed {
    return Ok(vec![VirtualOp::ProducerSlashed { producer: producer.clone() }]);
  }
  Ok(Vec::new())
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
    for n in ["alice", "bob"] {
      let id = store.alloc_account_id();
      store.create_account(Account::new(id, name(n), format!("{n}-key"), ChainTime::from_unix(0))).unwrap();
    }
    store
  }

  #[test]
  fn producer_update_registers_then_rotates_key() {
    let mut store = setup();
    producer_update(&mut store, &name("alice"), "key1", ChainTime::from_unix(0)).unwrap();
    assert_eq!(store.find_producer(&name("alice")).unwrap().signing_key, "key1");
    producer_update(&mut store, &name("alice"), "key2", ChainTime::from_unix(10)).unwrap();
    assert_eq!(store.find_producer(&name("alice")).unwrap().signing_key, "key2");
  }

  #[test]
  fn repeated_violations_deactivate_the_producer() {
    let mut store = setup();
    producer_update(&mut store, &name("alice"), "key1", ChainTime::from_unix(0)).unwrap();
    for _ in 0..2 {
      let ops = producer_violation(&mut store, &name("bob"), &name("alice")).unwrap();
      assert!(ops.is_empty());
    }
    let ops = producer_violation(&mut store, &name("bob"), &name("alice")).unwrap();
    assert_eq!(ops.len(), 1);
    assert!(!store.find_producer(&name("alice")).unwrap().is_active);
  }
}
