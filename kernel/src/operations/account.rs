//! Account lifecycle evaluators (§3.1, §4.3 taxonomy row "Account
//! lifecycle"): creation, authority rotation, membership, the social
//! graph's follow edge, witness voting, and the owner-recovery/reset
//! escape hatches.

use common::ChainTime;

use crate::amount::Amount;
use crate::balance_engine::{self, SubBalance};
use crate::config;
use crate::error::{KernelError, KernelResult};
use crate::ids::AccountName;
use crate::objects::{Account, MembershipTier, RecoveryRequest};
use crate::store::Store;
use crate::virtual_op::VirtualOp;

pub fn create(
  store: &mut Store,
  creator: &AccountName,
  new_account: &AccountName,
  owner_key: &str,
  fee: &Amount,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(creator)?;
  if store.find_account(new_account).is_some() {
    return Err(KernelError::precondition(format!("account {new_account} already exists")));
  }
  let native = store.chain_spec.native_symbol.clone();
  if fee.symbol != native {
    return Err(KernelError::precondition("account creation fee must be paid in the native asset"));
  }
  let required_fee = store.median_props().account_creation_fee;
  if (fee.value.max(0) as u64) < required_fee {
    return Err(KernelError::precondition("account creation fee is below the required minimum"));
  }
  balance_engine::burn_liquid(store, creator, &native, fee.value.max(0) as u64)?;

  let id = store.alloc_account_id();
  let account = Account::new(id, new_account.clone(), owner_key.to_string(), now);
  store.create_account(account)?;
  Ok(Vec::new())
}

pub fn update(
  store: &mut Store,
  account: &AccountName,
  new_owner_key: Option<String>,
  new_active_key: Option<String>,
  new_posting_key: Option<String>,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  let acc = store.get_account(account)?;
  if new_owner_key.is_some() {
    if let Some(last) = acc.last_owner_update {
      if now.elapsed_since(last) < config::OWNER_UPDATE_LIMIT_SECONDS {
        return Err(KernelError::precondition("owner authority was already updated within the last day"));
      }
    }
  }
  store.modify_account(account, |a| {
    if let Some(key) = new_owner_key {
      a.owner.weight_threshold = 1;
      a.owner.key_auths.clear();
      a.owner.key_auths.insert(key, 1);
      a.last_owner_update = Some(now);
    }
    if let Some(key) = new_active_key {
      a.active.weight_threshold = 1;
      a.active.key_auths.clear();
      a.active.key_auths.insert(key, 1);
    }
    if let Some(key) = new_posting_key {
      a.posting.weight_threshold = 1;
      a.posting.key_auths.clear();
      a.posting.key_auths.insert(key, 1);
    }
  })?;
  Ok(Vec::new())
}

pub fn membership(
  store: &mut Store,
  account: &AccountName,
  tier: MembershipTier,
  months: u32,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(account)?;
  store.modify_account(account, |a| {
    a.membership_tier = tier;
    if months == 0 {
      a.membership_expiration = None;
      a.recurring_membership_months = None;
    } else {
      a.membership_expiration = Some(now.saturating_add_secs(common::SECONDS_PER_DAY * 30 * months as u64));
      a.recurring_membership_months = Some(months);
    }
  })?;
  Ok(Vec::new())
}

pub fn decline_voting(store: &mut Store, account: &AccountName, decline: bool) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(account)?;
  store.modify_account(account, |a| a.decline_voting = decline)?;
  Ok(Vec::new())
}

pub fn follow(
  store: &mut Store,
  follower: &AccountName,
  followed: &AccountName,
  unfollow: bool,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(follower)?;
  store.get_account(followed)?;
  let already = store.is_following(follower, followed);
  if unfollow {
    if already {
      store.remove_follow(follower, followed);
      store.modify_account(followed, |a| a.follower_count = a.follower_count.saturating_sub(1))?;
    }
  } else if !already {
    store.create_follow(follower, followed);
    store.modify_account(followed, |a| a.follower_count = a.follower_count.saturating_add(1))?;
  }
  Ok(Vec::new())
}

/// Casts (or withdraws) a voter's full effective stake behind a witness
/// candidate's `vote_weight`, adjusting by the delta from any previous
/// vote so repeat calls never double-count (§3.8, §4.11).
pub fn witness_vote(
  store: &mut Store,
  voter: &AccountName,
  witness: &AccountName,
  approve: bool,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(voter)?;
  store
    .find_producer(witness)
    .ok_or_else(|| KernelError::not_found("producer", witness.to_string()))?;
  let native = store.chain_spec.native_symbol.clone();
  let existing = store.find_witness_vote(voter, witness).unwrap_or(0);
  let new_weight = if approve { store.find_balance(voter, &native).map(|b| b.effective_stake()).unwrap_or(0) } else { 0 };
  let delta = new_weight as i128 - existing as i128;
  if delta != 0 {
    store.modify_producer(witness, |p| {
      p.vote_weight = (p.vote_weight as i128 + delta).max(0) as u64;
    })?;
  }
  if new_weight == 0 {
    store.remove_witness_vote(voter, witness);
  } else {
    store.set_witness_vote(voter, witness, new_weight);
  }
  Ok(Vec::new())
}

pub fn request_recovery(
  store: &mut Store,
  recovery_account: &AccountName,
  account_to_recover: &AccountName,
  new_owner_key: &str,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  let target = store.get_account(account_to_recover)?;
  if target.recovery_account.as_ref() != Some(recovery_account) {
    return Err(KernelError::unauthorized(format!("{recovery_account} is not {account_to_recover}'s recovery account")));
  }
  store.create_recovery_request(RecoveryRequest {
    account_to_recover: account_to_recover.clone(),
    new_owner_key: new_owner_key.to_string(),
    expiration: now.saturating_add_secs(config::OWNER_UPDATE_LIMIT_SECONDS),
  });
  Ok(Vec::new())
}

pub fn recover(
  store: &mut Store,
  account_to_recover: &AccountName,
  new_owner_key: &str,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  let request = store
    .find_recovery_request(account_to_recover)
    .cloned()
    .ok_or_else(|| KernelError::not_found("recovery_request", account_to_recover.to_string()))?;
  if request.expiration.is_past(now) {
    return Err(KernelError::Expired { what: "account recovery request", at: request.expiration.as_unix(), now: now.as_unix() });
  }
  store.modify_account(account_to_recover, |a| {
    a.owner.weight_threshold = 1;
    a.owner.key_auths.clear();
    a.owner.key_auths.insert(new_owner_key.to_string(), 1);
    a.last_owner_update = Some(now);
  })?;
  store.remove_recovery_request(account_to_recover);
  Ok(Vec::new())
}

/// Lets an account's designated `reset_account` rotate its owner key once
/// it has gone quiet for `reset_delay_days` (§3.1, GLOSSARY "Reset
/// account"), without waiting on owner-authority cooperation at all.
pub fn reset(
  store: &mut Store,
  reset_account: &AccountName,
  account: &AccountName,
  new_owner_key: &str,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  let acc = store.get_account(account)?;
  if acc.reset_account.as_ref() != Some(reset_account) {
    return Err(KernelError::unauthorized(format!("{reset_account} is not {account}'s reset account")));
  }
  let last_activity = [acc.last_vote_time, acc.last_view_time, acc.last_share_time, acc.last_comment_time, acc.last_post_time]
    .into_iter()
    .max()
    .unwrap_or(acc.created);
  let required_idle = common::SECONDS_PER_DAY * acc.reset_delay_days as u64;
  if now.elapsed_since(last_activity) < required_idle {
    return Err(KernelError::precondition(format!("{account} has been active within its reset delay")));
  }
  store.modify_account(account, |a| {
    a.owner.weight_threshold = 1;
    a.owner.key_auths.clear();
    a.owner.key_auths.insert(new_owner_key.to_string(), 1);
    a.last_owner_update = Some(now);
  })?;
  Ok(Vec::new())
}

/// Mints a protocol-level reward directly into `account`'s pending reward
/// balance (§4.3: `required_authorities` returns none for this op — it is
/// only ever emitted by the host, never signed by the recipient).
pub fn activity_reward(store: &mut Store, account: &AccountName, amount: &Amount) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(account)?;
  store.modify_dynamic(&amount.symbol, |d| d.total_supply = d.total_supply.saturating_add(amount.value.max(0) as u64))?;
  balance_engine::adjust_balance(store, account, &amount.symbol, SubBalance::Reward, amount.value.max(0))?;
  Ok(Vec::new())
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
    let native = store.chain_spec.native_symbol.clone();
    store.ensure_asset_dynamic(&native);
    let id = store.alloc_account_id();
    store.create_account(Account::new(id, name("alice"), "alice-key".into(), ChainTime::from_unix(0))).unwrap();
    store
  }

  #[test]
  fn create_charges_the_required_fee() {
    let mut store = setup();
    let native = store.chain_spec.native_symbol.clone();
    let required = store.median_props().account_creation_fee;
    balance_engine::mint_liquid(&mut store, &name("alice"), &native, required).unwrap();
    create(&mut store, &name("alice"), &name("bob"), "bob-key", &Amount::new(required as i128, native.clone()), ChainTime::from_unix(0)).unwrap();
    assert!(store.find_account(&name("bob")).is_some());
    assert_eq!(store.find_balance(&name("alice"), &native).unwrap().liquid, 0);
  }

  #[test]
  fn create_rejects_underpaid_fee() {
    let mut store = setup();
    let native = store.chain_spec.native_symbol.clone();
    balance_engine::mint_liquid(&mut store, &name("alice"), &native, 1).unwrap();
    let err = create(&mut store, &name("alice"), &name("bob"), "bob-key", &Amount::new(1, native), ChainTime::from_unix(0));
    assert!(err.is_err());
    assert!(store.find_account(&name("bob")).is_none());
  }

  #[test]
  fn owner_update_is_rate_limited() {
    let mut store = setup();
    update(&mut store, &name("alice"), Some("new-key".into()), None, None, ChainTime::from_unix(0)).unwrap();
    let err = update(&mut store, &name("alice"), Some("other-key".into()), None, None, ChainTime::from_unix(10));
    assert!(err.is_err());
    update(&mut store, &name("alice"), Some("other-key".into()), None, None, ChainTime::from_unix(common::SECONDS_PER_DAY)).unwrap();
  }

  #[test]
  fn follow_then_unfollow_tracks_follower_count() {
    let mut store = setup();
    let id = store.alloc_account_id();
    store.create_account(Account::new(id, name("bob"), "bob-key".into(), ChainTime::from_unix(0))).unwrap();
    follow(&mut store, &name("alice"), &name("bob"), false).unwrap();
    assert_eq!(store.find_account(&name("bob")).unwrap().follower_count, 1);
    follow(&mut store, &name("alice"), &name("bob"), false).unwrap();
    assert_eq!(store.find_account(&name("bob")).unwrap().follower_count, 1);
    follow(&mut store, &name("alice"), &name("bob"), true).unwrap();
    assert_eq!(store.find_account(&name("bob")).unwrap().follower_count, 0);
  }

  #[test]
  fn witness_vote_is_idempotent_on_repeat_votes() {
    let mut store = setup();
    let native = store.chain_spec.native_symbol.clone();
    balance_engine::mint_liquid(&mut store, &name("alice"), &native, 1000).unwrap();
    balance_engine::stake(&mut store, &name("alice"), &native, 1000).unwrap();
    let pid = crate::ids::ProducerId(1);
    store.create_producer(crate::objects::Producer::new(pid, name("carol"), "carol-key".into(), ChainTime::from_unix(0))).unwrap();
    witness_vote(&mut store, &name("alice"), &name("carol"), true).unwrap();
    assert_eq!(store.find_producer(&name("carol")).unwrap().vote_weight, 1000);
    witness_vote(&mut store, &name("alice"), &name("carol"), true).unwrap();
    assert_eq!(store.find_producer(&name("carol")).unwrap().vote_weight, 1000);
    witness_vote(&mut store, &name("alice"), &name("carol"), false).unwrap();
    assert_eq!(store.find_producer(&name("carol")).unwrap().vote_weight, 0);
  }
}
