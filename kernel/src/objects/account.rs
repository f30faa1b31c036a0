use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use common::ChainTime;

use crate::ids::{AccountId, AccountName};

/// A weighted multisig authority: a threshold over a mix of direct keys and
/// nested account authorities (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Authority {
  pub weight_threshold: u32,
  /// public key (opaque, wallet-verified) -> weight
  pub key_auths: BTreeMap<String, u32>,
  /// nested account name -> weight
  pub account_auths: BTreeMap<AccountName, u32>,
}

impl Authority {
  pub fn total_weight(&self) -> u64 {
    let keys: u64 = self.key_auths.values().map(|w| *w as u64).sum();
    let accounts: u64 = self.account_auths.values().map(|w| *w as u64).sum();
    keys + accounts
  }

  pub fn is_valid(&self) -> bool {
    self.weight_threshold > 0 && (self.weight_threshold as u64) <= self.total_weight()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EncryptionKeys {
  pub secure_public_key: Option<String>,
  pub connection_public_key: Option<String>,
  pub friend_public_key: Option<String>,
  pub companion_public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
  pub id: AccountId,
  pub name: AccountName,
  pub owner: Authority,
  pub active: Authority,
  pub posting: Authority,
  pub keys: EncryptionKeys,

  pub post_count: u64,
  pub follower_count: u64,
  /// Regenerating power pools, in basis points of max (0..=PERCENT_100).
  pub voting_power: u64,
  pub viewing_power: u64,
  pub sharing_power: u64,
  pub commenting_power: u64,
  pub last_vote_time: ChainTime,
  pub last_view_time: ChainTime,
  pub last_share_time: ChainTime,
  pub last_comment_time: ChainTime,
  pub last_post_time: ChainTime,
  pub last_root_post_time: ChainTime,
  pub last_owner_update: Option<ChainTime>,

  pub recovery_account: Option<AccountName>,
  pub reset_account: Option<AccountName>,
  pub reset_delay_days: u32,

  pub membership_tier: MembershipTier,
  pub membership_expiration: Option<ChainTime>,
  pub recurring_membership_months: Option<u32>,

  pub loan_default_balance: u64,
  pub decline_voting: bool,
  pub active_account: bool,
  pub created: ChainTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipTier {
  None,
  Standard,
  Premium,
  Executive,
}

impl Account {
  pub fn new(id: AccountId, name: AccountName, owner_key: String, now: ChainTime) -> Self {
    let mut owner = Authority { weight_threshold: 1, ..Default::default() };
    owner.key_auths.insert(owner_key.clone(), 1);
    let mut active = Authority { weight_threshold: 1, ..Default::default() };
    active.key_auths.insert(owner_key.clone(), 1);
    let mut posting = Authority { weight_threshold: 1, ..Default::default() };
    posting.key_auths.insert(owner_key, 1);

    Self {
      id,
      name,
      owner,
      active,
      posting,
      keys: EncryptionKeys::default(),
      post_count: 0,
      follower_count: 0,
      voting_power: crate::config::PERCENT_100,
      viewing_power: crate::config::PERCENT_100,
      sharing_power: crate::config::PERCENT_100,
      commenting_power: crate::config::PERCENT_100,
      last_vote_time: now,
      last_view_time: now,
      last_share_time: now,
      last_comment_time: now,
      last_post_time: now,
      last_root_post_time: now,
      last_owner_update: None,
      recovery_account: None,
      reset_account: None,
      reset_delay_days: 3,
      membership_tier: MembershipTier::None,
      membership_expiration: None,
      recurring_membership_months: None,
      loan_default_balance: 0,
      decline_voting: false,
      active_account: true,
      created: now,
    }
  }
}
