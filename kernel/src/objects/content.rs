use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use common::ChainTime;

use crate::amount::Amount;
use crate::ids::{AccountName, CommentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EngagementKind {
  Vote,
  View,
  Share,
  Comment,
}

/// Visibility class of a post, determining which feeds receive it and
/// under which key it must be encrypted (§3.7, GLOSSARY "Reach").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReachTag {
  Tag,
  Follow,
  Mutual,
  Connection,
  Friend,
  Companion,
  Community,
  NoFeed,
}

impl ReachTag {
  /// Whether this reach implies the content must be encrypted under a
  /// matching off-chain key rather than published in the clear (§3.7
  /// invariant).
  pub fn requires_encryption(&self) -> bool {
    matches!(self, ReachTag::Connection | ReachTag::Friend | ReachTag::Companion | ReachTag::Community)
  }
}

/// One weighted engagement recorded against a comment before cashout,
/// carrying enough to compute curation reward share at payout time
/// (§4.9). `weight` is the *curation weight earned*, not the power spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
  pub kind: EngagementKind,
  pub weight: u128,
  pub at: ChainTime,
}

/// A post or comment awaiting or past its single cashout event (§3.7,
/// §4.9). `net_reward_shares` accumulates as votes/views/shares/comments
/// convert power into reward; the four `*_power_sum` fields are the
/// running curve input used to compute each new actor's marginal share
/// (§4.9 `curve(new_power) - curve(old_power)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub id: CommentId,
  pub author: AccountName,
  pub permlink: String,
  pub parent: Option<CommentId>,
  pub root: CommentId,
  pub depth: u32,
  pub reach: ReachTag,
  pub created: ChainTime,
  pub cashout_time: Option<ChainTime>,
  pub is_paid_out: bool,
  pub engagements: BTreeMap<(AccountName, EngagementKind), Engagement>,
  pub net_reward_shares: u128,
  pub vote_power_sum: u128,
  pub view_power_sum: u128,
  pub share_power_sum: u128,
  pub comment_power_sum: u128,
  pub children_count: u32,
  pub total_payout: Option<Amount>,
  pub beneficiaries: Vec<(AccountName, u64)>,
  pub max_accepted_payout: Option<Amount>,
  pub percent_for_curators: u64,
  pub allow_curation_rewards: bool,
  pub allow_votes: bool,
  pub allow_views: bool,
  pub allow_shares: bool,
}

impl Comment {
  pub fn is_root(&self) -> bool {
    self.parent.is_none()
  }

  pub fn ready_for_cashout(&self, now: ChainTime) -> bool {
    !self.is_paid_out && self.cashout_time.map(|t| t.is_past(now)).unwrap_or(false)
  }

  pub fn power_sum_for(&self, kind: EngagementKind) -> u128 {
    match kind {
      EngagementKind::Vote => self.vote_power_sum,
      EngagementKind::View => self.view_power_sum,
      EngagementKind::Share => self.share_power_sum,
      EngagementKind::Comment => self.comment_power_sum,
    }
  }

  pub fn add_power(&mut self, kind: EngagementKind, power: u128) {
    match kind {
      EngagementKind::Vote => self.vote_power_sum += power,
      EngagementKind::View => self.view_power_sum += power,
      EngagementKind::Share => self.share_power_sum += power,
      EngagementKind::Comment => self.comment_power_sum += power,
    }
  }

  pub fn count_prior_actors(&self, kind: EngagementKind) -> usize {
    self.engagements.keys().filter(|(_, k)| *k == kind).count()
  }

  pub fn total_curation_weight(&self) -> u128 {
    self.engagements.values().map(|e| e.weight).sum()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base_comment() -> Comment {
    Comment {
      id: CommentId(1),
      author: AccountName::new("alice").unwrap(),
      permlink: "hello-world".into(),
      parent: None,
      root: CommentId(1),
      depth: 0,
      reach: ReachTag::Tag,
      created: ChainTime::from_unix(0),
      cashout_time: Some(ChainTime::from_unix(100)),
      is_paid_out: false,
      engagements: BTreeMap::new(),
      net_reward_shares: 0,
      vote_power_sum: 0,
      view_power_sum: 0,
      share_power_sum: 0,
      comment_power_sum: 0,
      children_count: 0,
      total_payout: None,
      beneficiaries: vec![],
      max_accepted_payout: None,
      percent_for_curators: 5_000,
      allow_curation_rewards: true,
      allow_votes: true,
      allow_views: true,
      allow_shares: true,
    }
  }

  #[test]
  fn root_comment_has_no_parent() {
    let c = base_comment();
    assert!(c.is_root());
    assert!(!c.ready_for_cashout(ChainTime::from_unix(50)));
    assert!(c.ready_for_cashout(ChainTime::from_unix(100)));
  }

  #[test]
  fn reach_tags_requiring_encryption() {
    assert!(ReachTag::Friend.requires_encryption());
    assert!(!ReachTag::Tag.requires_encryption());
  }

  #[test]
  fn engagement_kinds_keyed_independently_per_actor() {
    let mut c = base_comment();
    let bob = AccountName::new("bob").unwrap();
    c.engagements.insert(
      (bob.clone(), EngagementKind::Vote),
      Engagement { kind: EngagementKind::Vote, weight: 10, at: ChainTime::from_unix(1) },
    );
    c.engagements.insert(
      (bob, EngagementKind::View),
      Engagement { kind: EngagementKind::View, weight: 3, at: ChainTime::from_unix(2) },
    );
    assert_eq!(c.total_curation_weight(), 13);
    assert_eq!(c.count_prior_actors(EngagementKind::Vote), 1);
  }
}
