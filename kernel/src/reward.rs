//! Content reward accumulation and cashout (§4.9). Four weight
//! accumulators per comment (vote/view/share/comment) convert an actor's
//! spent power into `net_reward`; at cashout the fund pays that share out,
//! split between the author (and declared beneficiaries) and curators.

use std::collections::BTreeMap;

use common::SECONDS_PER_DAY;
use common::ChainTime;

use crate::amount::{mul_div_u128, Amount};
use crate::config;
use crate::error::KernelResult;
use crate::ids::AccountName;
use crate::objects::content::EngagementKind;
use crate::objects::Comment;
use crate::store::Store;
use crate::virtual_op::VirtualOp;

/// Integer square root via Newton's method, used by the bounded-curation
/// reward curve (§4.9 "curve"). `isqrt(0) == 0`.
fn isqrt(n: u128) -> u128 {
  if n == 0 {
    return 0;
  }
  let mut x = n;
  let mut y = (x + 1) / 2;
  while y < x {
    x = y;
    y = (x + n / x) / 2;
  }
  x
}

/// The reward-fund's declared curve, applied to cumulative power spent on
/// a post. Bounded-curation (square root) by default: early, large votes
/// are rewarded superlinearly less than many small ones, bounding whale
/// dominance (§4.9 Open Question — curve choice).
fn curve(power: u128) -> u128 {
  isqrt(power)
}

/// Ramps from 0 to 1 (in basis points of `CURATION_AUCTION_WINDOW_SECONDS`)
/// over the curation auction window so that voting immediately after
/// creation earns negligible curation weight (§4.9).
fn linear_auction_decay(elapsed_seconds: u64) -> u64 {
  if elapsed_seconds >= config::CURATION_AUCTION_WINDOW_SECONDS {
    config::PERCENT_100
  } else {
    (elapsed_seconds as u128 * config::PERCENT_100 as u128 / config::CURATION_AUCTION_WINDOW_SECONDS as u128) as u64
  }
}

/// `0.5^(n / decay_const)` approximated by halving `PERCENT_100` every
/// `decay_const` prior actors (§4.9 "suppresses the reward for
/// late-comers"), computed with integer shifts to stay deterministic.
fn geometric_count_decay(n_prior_actors: usize, decay_const: u64) -> u64 {
  if decay_const == 0 {
    return config::PERCENT_100;
  }
  let halvings = n_prior_actors as u64 / decay_const.max(1);
  if halvings >= 64 {
    return 0;
  }
  config::PERCENT_100 >> halvings
}

fn decay_const_for(kind: EngagementKind, props: &config::MedianChainProperties) -> u64 {
  match kind {
    EngagementKind::Vote => props.vote_curation_decay,
    EngagementKind::View => props.view_curation_decay,
    EngagementKind::Share => props.share_curation_decay,
    EngagementKind::Comment => props.comment_curation_decay,
  }
}

/// Records one actor's engagement against a comment, converting `power`
/// (a fraction of their regenerated vote/view/share/comment power) into
/// `net_reward` and a curation weight for the actor (§4.9). Returns the
/// curation weight granted, or zero if the comment disallows this kind of
/// engagement or the comment has already cashed out.
pub fn record_engagement(
  store: &mut Store,
  author: &AccountName,
  permlink: &str,
  actor: &AccountName,
  kind: EngagementKind,
  power: u128,
  now: ChainTime,
) -> KernelResult<u128> {
  let props = store.median_props();
  let mut granted = 0u128;
  store.modify_comment(author, permlink, |c| {
    if c.is_paid_out || power == 0 {
      return;
    }
    if !engagement_allowed(c, kind) {
      return;
    }
    let old_power = c.power_sum_for(kind);
    let new_power = old_power + power;
    let elapsed = now.elapsed_since(c.created);
    let n_prior = c.count_prior_actors(kind);
    let decay_const = decay_const_for(kind, &props);
    let raw = curve(new_power).saturating_sub(curve(old_power));
    let weight = raw
      .saturating_mul(linear_auction_decay(elapsed) as u128)
      .saturating_mul(geometric_count_decay(n_prior, decay_const) as u128)
      / (config::PERCENT_100 as u128 * config::PERCENT_100 as u128).max(1);
    c.add_power(kind, power);
    c.net_reward_shares = c.net_reward_shares.saturating_add(power);
    c.engagements.insert((actor.clone(), kind), crate::objects::content::Engagement { kind, weight, at: now });
    granted = weight;
  })?;
  Ok(granted)
}

fn engagement_allowed(c: &Comment, kind: EngagementKind) -> bool {
  match kind {
    EngagementKind::Vote => c.allow_votes,
    EngagementKind::View => c.allow_views,
    EngagementKind::Share => c.allow_shares,
    EngagementKind::Comment => true,
  }
}

/// Mints the day's content inflation into the pool awaiting the next
/// cashout batch (§4.9, maintenance order item 4's upstream feed). Safe to
/// call every maintenance tick; accrues proportionally to elapsed time
/// rather than assuming an exact day boundary.
pub fn accrue_content_reward_fund(store: &mut Store, now: ChainTime) {
  let last = store.last_reward_fund_accrual();
  let elapsed = now.elapsed_since(last);
  if elapsed == 0 {
    return;
  }
  let per_day = store.median_props().content_reward_fund_per_day;
  let minted = mul_div_u128(per_day, elapsed, SECONDS_PER_DAY).unwrap_or(per_day);
  store.add_to_content_reward_pool(minted, now);
}

/// Pays out every comment whose cashout time has arrived (§4.9, §5
/// maintenance order item 4 "cashouts"). The pool is split across the
/// batch proportional to each comment's `net_reward_shares`; within a
/// comment, `percent_for_curators` goes to curators (split by curation
/// weight) and the rest to the author, net of beneficiary cuts.
pub fn run_cashouts(store: &mut Store, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  let native = store.chain_spec.native_symbol.clone();
  let due: Vec<(AccountName, String)> = store
    .comments_pending_cashout()
    .into_iter()
    .filter(|(_, c)| c.cashout_time.map(|t| t.is_past(now)).unwrap_or(false))
    .map(|((author, permlink), _)| (author.clone(), permlink.clone()))
    .collect();
  if due.is_empty() {
    return Ok(Vec::new());
  }

  let batch_total_shares: u128 = due
    .iter()
    .filter_map(|(a, p)| store.find_comment(a, p))
    .map(|c| c.net_reward_shares)
    .sum();

  let mut ops = Vec::new();
  let pool = store.content_reward_pool();
  for (author, permlink) in due {
    let comment = store.find_comment(&author, &permlink).cloned().expect("listed above");
    let payout_u64: u64 = if batch_total_shares == 0 {
      0
    } else {
      let share = (pool as u128 * comment.net_reward_shares / batch_total_shares).min(u64::MAX as u128);
      share as u64
    };
    let capped = match &comment.max_accepted_payout {
      Some(max) => payout_u64.min(max.value.max(0) as u64),
      None => payout_u64,
    };
    let taken = store.take_from_content_reward_pool(capped);

    let curator_cut = if comment.allow_curation_rewards {
      (taken as u128 * comment.percent_for_curators as u128 / config::PERCENT_100 as u128) as u64
    } else {
      0
    };
    let author_side = taken - curator_cut;

    let total_curation_weight = comment.total_curation_weight();
    let mut curator_reward_total = 0u64;
    if curator_cut > 0 && total_curation_weight > 0 {
      let mut distributed = 0u64;
      let mut by_curator: BTreeMap<AccountName, u128> = BTreeMap::new();
      for ((curator, _), engagement) in &comment.engagements {
        *by_curator.entry(curator.clone()).or_insert(0) += engagement.weight;
      }
      for (curator, weight) in by_curator {
        let share = (curator_cut as u128 * weight / total_curation_weight) as u64;
        if share == 0 {
          continue;
        }
        crate::balance_engine::mint_liquid(store, &curator, &native, share)?;
        distributed += share;
        curator_reward_total += share;
        ops.push(VirtualOp::CurationReward {
          curator,
          author: author.clone(),
          permlink: permlink.clone(),
          reward: Amount::new(share as i128, native.clone()),
        });
      }
      let _ = distributed;
    }
    // Undistributed curator cut (no curators, or rounding remainder) rolls
    // back to the author.
    let author_total = author_side + (curator_cut - curator_reward_total);

    let mut beneficiary_total = 0u64;
    let mut remaining_author = author_total;
    for (beneficiary, basis_points) in &comment.beneficiaries {
      let cut = (author_total as u128 * *basis_points as u128 / config::PERCENT_100 as u128) as u64;
      if cut == 0 {
        continue;
      }
      crate::balance_engine::mint_liquid(store, beneficiary, &native, cut)?;
      beneficiary_total += cut;
      remaining_author -= cut;
    }
    if remaining_author > 0 {
      crate::balance_engine::mint_liquid(store, &author, &native, remaining_author)?;
    }

    store.modify_comment(&author, &permlink, |c| {
      c.is_paid_out = true;
      c.total_payout = Some(Amount::new(taken as i128, native.clone()));
    })?;

    ops.push(VirtualOp::CommentPayout {
      author: author.clone(),
      permlink: permlink.clone(),
      author_reward: Amount::new(remaining_author as i128, native.clone()),
      curator_reward: Amount::new(curator_reward_total as i128, native.clone()),
      beneficiary_reward: Amount::new(beneficiary_total as i128, native.clone()),
    });
  }
  Ok(ops)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ChainSpec;
  use crate::ids::{AssetSymbol, CommentId};
  use crate::objects::content::ReachTag;

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  fn setup() -> Store {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    store.ensure_asset_dynamic(&AssetSymbol::new("COIN"));
    store
  }

  fn post(store: &mut Store, author: &AccountName, cashout: ChainTime) {
    store
      .create_comment(Comment {
        id: CommentId(1),
        author: author.clone(),
        permlink: "p".into(),
        parent: None,
        root: CommentId(1),
        depth: 0,
        reach: ReachTag::Tag,
        created: ChainTime::from_unix(0),
        cashout_time: Some(cashout),
        is_paid_out: false,
        engagements: Default::default(),
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
      })
      .unwrap();
  }

  #[test]
  fn isqrt_matches_known_values() {
    assert_eq!(isqrt(0), 0);
    assert_eq!(isqrt(1), 1);
    assert_eq!(isqrt(100), 10);
    assert_eq!(isqrt(99), 9);
  }

  #[test]
  fn geometric_decay_halves_every_decay_const() {
    assert_eq!(geometric_count_decay(0, 10), config::PERCENT_100);
    assert_eq!(geometric_count_decay(10, 10), config::PERCENT_100 / 2);
    assert_eq!(geometric_count_decay(20, 10), config::PERCENT_100 / 4);
  }

  #[test]
  fn voting_grants_curation_weight_and_reward() {
    let mut store = setup();
    post(&mut store, &name("alice"), ChainTime::from_unix(100));
    let w = record_engagement(
      &mut store,
      &name("alice"),
      "p",
      &name("bob"),
      EngagementKind::Vote,
      10_000,
      ChainTime::from_unix(config::CURATION_AUCTION_WINDOW_SECONDS),
    )
    .unwrap();
    assert!(w > 0);
    let c = store.find_comment(&name("alice"), "p").unwrap();
    assert_eq!(c.net_reward_shares, 10_000);
  }

  #[test]
  fn cashout_splits_author_and_curator() {
    let mut store = setup();
    post(&mut store, &name("alice"), ChainTime::from_unix(100));
    record_engagement(
      &mut store,
      &name("alice"),
      "p",
      &name("bob"),
      EngagementKind::Vote,
      10_000,
      ChainTime::from_unix(config::CURATION_AUCTION_WINDOW_SECONDS),
    )
    .unwrap();
    store.add_to_content_reward_pool(1_000_000, ChainTime::from_unix(100));
    let ops = run_cashouts(&mut store, ChainTime::from_unix(200)).unwrap();
    assert_eq!(ops.len(), 2); // one CurationReward + one CommentPayout
    let c = store.find_comment(&name("alice"), "p").unwrap();
    assert!(c.is_paid_out);
    assert!(store.find_balance(&name("bob"), &AssetSymbol::new("COIN")).unwrap().liquid > 0);
    assert!(store.find_balance(&name("alice"), &AssetSymbol::new("COIN")).unwrap().liquid > 0);
  }
}
