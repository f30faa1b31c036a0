//! Lightweight social-graph evaluators (§3.1, §1 Non-goals: moderation
//! roles, community-scoped permissions, and governance tallying are a
//! presentation-layer concern; the kernel records only the raw relations).

use crate::error::{KernelError, KernelResult};
use crate::ids::AccountName;
use crate::objects::Community;
use crate::store::Store;
use crate::virtual_op::VirtualOp;

pub fn community_create(store: &mut Store, creator: &AccountName, name: &str) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(creator)?;
  if name.is_empty() {
    return Err(KernelError::precondition("community name must not be empty"));
  }
  store.create_community(Community::new(name.to_string(), creator.clone(), store.head_time()))?;
  Ok(Vec::new())
}

pub fn community_subscribe(store: &mut Store, account: &AccountName, community: &str, unsubscribe: bool) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(account)?;
  store.find_community(community).ok_or_else(|| KernelError::not_found("community", community.to_string()))?;
  let already = store.is_subscribed(account, community);
  if unsubscribe {
    if already {
      store.remove_community_subscription(account, community);
      store.modify_community(community, |c| c.subscriber_count = c.subscriber_count.saturating_sub(1))?;
    }
  } else if !already {
    store.create_community_subscription(account, community);
    store.modify_community(community, |c| c.subscriber_count += 1)?;
  }
  Ok(Vec::new())
}

pub fn network_officer_vote(store: &mut Store, voter: &AccountName, officer: &AccountName, approve: bool) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(voter)?;
  store.get_account(officer)?;
  let already = store.is_voting_for_officer(voter, officer);
  if approve && !already {
    store.create_network_officer_vote(voter, officer);
  } else if !approve && already {
    store.remove_network_officer_vote(voter, officer);
  }
  Ok(Vec::new())
}

/// A custom, application-defined payload carried with posting authority
/// (§1 Non-goals: the kernel does not interpret `id`/`payload`; it only
/// enforces that the actor is a real, active account).
pub fn custom(store: &mut Store, actor: &AccountName, id: &str, payload: &str) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(actor)?;
  if id.is_empty() {
    return Err(KernelError::precondition("custom operation id must not be empty"));
  }
  let _ = payload;
  Ok(Vec::new())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ChainSpec;
  use crate::objects::Account;
  use common::ChainTime;

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
  fn subscribe_then_unsubscribe_tracks_count() {
    let mut store = setup();
    community_create(&mut store, &name("alice"), "rustlang").unwrap();
    community_subscribe(&mut store, &name("bob"), "rustlang", false).unwrap();
    assert_eq!(store.find_community("rustlang").unwrap().subscriber_count, 1);
    community_subscribe(&mut store, &name("bob"), "rustlang", false).unwrap();
    assert_eq!(store.find_community("rustlang").unwrap().subscriber_count, 1);
    community_subscribe(&mut store, &name("bob"), "rustlang", true).unwrap();
    assert_eq!(store.find_community("rustlang").unwrap().subscriber_count, 0);
  }

  #[test]
  fn officer_vote_is_idempotent() {
    let mut store = setup();
    network_officer_vote(&mut store, &name("alice"), &name("bob"), true).unwrap();
    assert!(store.is_voting_for_officer(&name("alice"), &name("bob")));
    network_officer_vote(&mut store, &name("alice"), &name("bob"), true).unwrap();
    network_officer_vote(&mut store, &name("alice"), &name("bob"), false).unwrap();
    assert!(!store.is_voting_for_officer(&name("alice"), &name("bob")));
  }

  #[test]
  fn custom_requires_nonempty_id() {
    let mut store = setup();
    assert!(custom(&mut store, &name("alice"), "", "payload").is_err());
    custom(&mut store, &name("alice"), "follow", "{}").unwrap();
  }
}
