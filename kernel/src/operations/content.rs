//! Post/comment lifecycle and engagement evaluators (§3.7, §4.9 taxonomy
//! row "Content"). `comment` owns creation/edit and rate limiting;
//! `vote`/`view`/`share` spend a regenerating power pool into curation
//! weight via `reward::record_engagement`.

use common::ChainTime;

use crate::amount::{mul_div_u128, Amount};
use crate::config;
use crate::error::{KernelError, KernelResult};
use crate::ids::{AccountName, CommentId};
use crate::objects::content::{EngagementKind, ReachTag};
use crate::objects::Comment;
use crate::reward;
use crate::store::Store;
use crate::virtual_op::VirtualOp;

/// Power pools regenerate linearly from zero to full over
/// `POWER_REGENERATION_SECONDS`, independent of how much was spent (§3.7).
fn regenerate_power(power: u64, last: ChainTime, now: ChainTime) -> u64 {
  let elapsed = now.elapsed_since(last);
  let regen = mul_div_u128(config::PERCENT_100, elapsed, config::POWER_REGENERATION_SECONDS).unwrap_or(config::PERCENT_100);
  (power + regen).min(config::PERCENT_100)
}

#[allow(clippy::too_many_arguments)]
pub fn comment(
  store: &mut Store,
  author: &AccountName,
  permlink: &str,
  parent_author: Option<&AccountName>,
  parent_permlink: Option<&str>,
  reach: ReachTag,
  max_accepted_payout: Option<Amount>,
  percent_for_curators: u64,
  allow_curation_rewards: bool,
  allow_votes: bool,
  allow_views: bool,
  allow_shares: bool,
  beneficiaries: Vec<(AccountName, u64)>,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(author)?;
  if percent_for_curators > config::PERCENT_100 {
    return Err(KernelError::precondition("percent_for_curators exceeds 100%"));
  }
  let beneficiary_total: u64 = beneficiaries.iter().map(|(_, bp)| *bp).sum();
  if beneficiary_total > config::PERCENT_100 {
    return Err(KernelError::precondition("beneficiary shares exceed 100%"));
  }

  if store.find_comment(author, permlink).is_some() {
    // Edit: only the reach tag may still move (options are fixed at
    // creation, mirroring `max_accepted_payout`'s one-shot semantics).
    store.modify_comment(author, permlink, |c| {
      if !c.is_paid_out {
        c.reach = reach;
      }
    })?;
    return Ok(Vec::new());
  }

  let parent_info = match (parent_author, parent_permlink) {
    (Some(pa), Some(pp)) => {
      let parent = store
        .find_comment(pa, pp)
        .ok_or_else(|| KernelError::not_found("comment", format!("{pa}/{pp}")))?;
      Some((parent.id, parent.root, parent.depth))
    }
    _ => None,
  };

  let account = store.get_account(author)?;
  let is_root = parent_info.is_none();
  if is_root {
    if now.elapsed_since(account.last_root_post_time) < config::MIN_ROOT_POST_INTERVAL_SEC {
      return Err(KernelError::precondition("root post rate limit"));
    }
  } else if now.elapsed_since(account.last_comment_time) < config::MIN_COMMENT_INTERVAL_SEC {
    return Err(KernelError::precondition("comment rate limit"));
  }
  let commenting_power = account.commenting_power;
  let last_comment_time = account.last_comment_time;

  let id = CommentId(store.alloc_comment_id());
  let (parent, root, depth) = match parent_info {
    Some((parent_id, parent_root, parent_depth)) => (Some(parent_id), parent_root, parent_depth + 1),
    None => (None, id, 0),
  };

  store.create_comment(Comment {
    id,
    author: author.clone(),
    permlink: permlink.to_string(),
    parent,
    root,
    depth,
    reach,
    created: now,
    cashout_time: Some(now.saturating_add_secs(config::CASHOUT_WINDOW_SECONDS)),
    is_paid_out: false,
    engagements: Default::default(),
    net_reward_shares: 0,
    vote_power_sum: 0,
    view_power_sum: 0,
    share_power_sum: 0,
    comment_power_sum: 0,
    children_count: 0,
    total_payout: None,
    beneficiaries,
    max_accepted_payout,
    percent_for_curators,
    allow_curation_rewards,
    allow_votes,
    allow_views,
    allow_shares,
  })?;

  if let (Some(pa), Some(pp)) = (parent_author, parent_permlink) {
    store.modify_comment(pa, pp, |c| c.children_count += 1)?;
    let regen = regenerate_power(commenting_power, last_comment_time, now);
    reward::record_engagement(store, pa, pp, author, EngagementKind::Comment, regen as u128, now)?;
  }

  store.modify_account(author, |a| {
    a.post_count += 1;
    a.last_post_time = now;
    if is_root {
      a.last_root_post_time = now;
    } else {
      a.last_comment_time = now;
      a.commenting_power = 0;
    }
  })?;

  Ok(Vec::new())
}

pub fn vote(store: &mut Store, voter: &AccountName, author: &AccountName, permlink: &str, weight_percent: i64, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  if weight_percent == 0 {
    return Err(KernelError::precondition("vote weight must be nonzero"));
  }
  let comment = store
    .find_comment(author, permlink)
    .ok_or_else(|| KernelError::not_found("comment", format!("{author}/{permlink}")))?;
  if comment.is_paid_out {
    return Err(KernelError::precondition("comment has already cashed out"));
  }

  let account = store.get_account(voter)?;
  if now.elapsed_since(account.last_vote_time) < config::MIN_VOTE_INTERVAL_SEC {
    return Err(KernelError::precondition("vote rate limit"));
  }
  let regen = regenerate_power(account.voting_power, account.last_vote_time, now);
  let magnitude = (weight_percent.unsigned_abs()).min(config::PERCENT_100);
  let spent = mul_div_u128(regen, magnitude, config::PERCENT_100)?;
  let remaining = regen - spent;

  store.modify_account(voter, |a| {
    a.voting_power = remaining;
    a.last_vote_time = now;
  })?;
  reward::record_engagement(store, author, permlink, voter, EngagementKind::Vote, spent as u128, now)?;
  Ok(Vec::new())
}

pub fn view(store: &mut Store, viewer: &AccountName, author: &AccountName, permlink: &str, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  let comment = store
    .find_comment(author, permlink)
    .ok_or_else(|| KernelError::not_found("comment", format!("{author}/{permlink}")))?;
  if comment.is_paid_out {
    return Err(KernelError::precondition("comment has already cashed out"));
  }

  let account = store.get_account(viewer)?;
  if now.elapsed_since(account.last_view_time) < config::MIN_VIEW_INTERVAL_SEC {
    return Err(KernelError::precondition("view rate limit"));
  }
  let regen = regenerate_power(account.viewing_power, account.last_view_time, now);

  store.modify_account(viewer, |a| {
    a.viewing_power = 0;
    a.last_view_time = now;
  })?;
  reward::record_engagement(store, author, permlink, viewer, EngagementKind::View, regen as u128, now)?;
  Ok(Vec::new())
}

pub fn share(store: &mut Store, sharer: &AccountName, author: &AccountName, permlink: &str, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  let comment = store
    .find_comment(author, permlink)
    .ok_or_else(|| KernelError::not_found("comment", format!("{author}/{permlink}")))?;
  if comment.is_paid_out {
    return Err(KernelError::precondition("comment has already cashed out"));
  }

  let account = store.get_account(sharer)?;
  if now.elapsed_since(account.last_share_time) < config::MIN_SHARE_INTERVAL_SEC {
    return Err(KernelError::precondition("share rate limit"));
  }
  let regen = regenerate_power(account.sharing_power, account.last_share_time, now);

  store.modify_account(sharer, |a| {
    a.sharing_power = 0;
    a.last_share_time = now;
  })?;
  reward::record_engagement(store, author, permlink, sharer, EngagementKind::Share, regen as u128, now)?;
  Ok(Vec::new())
}

/// Flags a comment for moderation (§1 Non-goals: moderation policy and
/// enforcement live off-chain; the kernel only records that a moderator
/// acted). No comment field is mutated — `tag` is free-form presentation
/// metadata the host layer interprets.
pub fn moderate(store: &mut Store, moderator: &AccountName, author: &AccountName, permlink: &str, tag: &str) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(moderator)?;
  store
    .find_comment(author, permlink)
    .ok_or_else(|| KernelError::not_found("comment", format!("{author}/{permlink}")))?;
  if tag.is_empty() {
    return Err(KernelError::precondition("moderation tag must not be empty"));
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
    store.ensure_asset_dynamic(&AssetSymbol::new("COIN"));
    for n in ["alice", "bob"] {
      let id = store.alloc_account_id();
      store.create_account(Account::new(id, name(n), format!("{n}-key"), ChainTime::from_unix(0))).unwrap();
    }
    store
  }

  #[test]
  fn root_post_then_reply_sets_depth_and_root() {
    let mut store = setup();
    comment(&mut store, &name("alice"), "hello", None, None, ReachTag::Tag, None, 5_000, true, true, true, true, vec![], ChainTime::from_unix(0)).unwrap();
    comment(&mut store, &name("bob"), "reply", Some(&name("alice")), Some("hello"), ReachTag::Tag, None, 5_000, true, true, true, true, vec![], ChainTime::from_unix(100)).unwrap();
    let reply = store.find_comment(&name("bob"), "reply").unwrap();
    assert_eq!(reply.depth, 1);
    assert_eq!(reply.root, store.find_comment(&name("alice"), "hello").unwrap().id);
    assert_eq!(store.find_comment(&name("alice"), "hello").unwrap().children_count, 1);
  }

  #[test]
  fn root_post_rate_limit_is_enforced() {
    let mut store = setup();
    comment(&mut store, &name("alice"), "a", None, None, ReachTag::Tag, None, 0, true, true, true, true, vec![], ChainTime::from_unix(0)).unwrap();
    let err = comment(&mut store, &name("alice"), "b", None, None, ReachTag::Tag, None, 0, true, true, true, true, vec![], ChainTime::from_unix(1));
    assert!(err.is_err());
    comment(&mut store, &name("alice"), "b", None, None, ReachTag::Tag, None, 0, true, true, true, true, vec![], ChainTime::from_unix(100)).unwrap();
  }

  #[test]
  fn vote_spends_power_and_grants_curation_weight() {
    let mut store = setup();
    comment(&mut store, &name("alice"), "p", None, None, ReachTag::Tag, None, 5_000, true, true, true, true, vec![], ChainTime::from_unix(0)).unwrap();
    vote(&mut store, &name("bob"), &name("alice"), "p", 10_000, ChainTime::from_unix(config::CURATION_AUCTION_WINDOW_SECONDS)).unwrap();
    let c = store.find_comment(&name("alice"), "p").unwrap();
    assert!(c.net_reward_shares > 0);
    assert_eq!(store.find_account(&name("bob")).unwrap().voting_power, 0);
  }

  #[test]
  fn view_on_paid_out_comment_is_rejected() {
    let mut store = setup();
    comment(&mut store, &name("alice"), "p", None, None, ReachTag::Tag, None, 5_000, true, true, true, true, vec![], ChainTime::from_unix(0)).unwrap();
    store.modify_comment(&name("alice"), "p", |c| c.is_paid_out = true).unwrap();
    let err = view(&mut store, &name("bob"), &name("alice"), "p", ChainTime::from_unix(10));
    assert!(err.is_err());
  }
}
