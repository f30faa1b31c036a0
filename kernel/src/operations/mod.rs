//! The operation evaluator framework (§4.3): one closed tagged union of
//! operation kinds, one required-authority mapping per kind (consumed by
//! authority verification before any evaluator runs), and one dispatch
//! function per kind. Handlers for the economically load-bearing groups
//! (trading, pools, asset lifecycle, content, balances) are detailed in
//! full; the remaining groups obey the same framework with leaner bodies,
//! as the framework's own scope calls for (§1 non-goals).

pub mod account;
pub mod asset;
pub mod balances;
pub mod content;
pub mod marketplace;
pub mod pools;
pub mod producers;
pub mod social;
pub mod trading;

use common::ChainTime;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::authority::{AuthorityLevel, RequiredAuthority};
use crate::error::KernelResult;
use crate::ids::{
  AccountName, AssetSymbol, CallOrderId, CollateralBidId, CreditLoanId, CreditPoolId, EscrowId,
  LimitOrderId, MarginOrderId, OptionOrderId, PredictionPoolId,
};
use crate::objects::content::{EngagementKind, ReachTag};
use crate::objects::{MembershipTier, OptionStyle};
use crate::store::Store;
use crate::virtual_op::VirtualOp;

/// The closed tagged union of every operation kind the kernel accepts
/// (§6.2). Grouped to match the taxonomy table in §4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
  // -- Account lifecycle --------------------------------------------------
  AccountCreate { creator: AccountName, new_account: AccountName, owner_key: String, fee: Amount },
  AccountUpdate { account: AccountName, new_owner_key: Option<String>, new_active_key: Option<String>, new_posting_key: Option<String> },
  AccountMembership { account: AccountName, tier: MembershipTier, months: u32 },
  DeclineVoting { account: AccountName, decline: bool },
  Follow { follower: AccountName, followed: AccountName, unfollow: bool },
  WitnessVote { voter: AccountName, witness: AccountName, approve: bool },
  RequestAccountRecovery { recovery_account: AccountName, account_to_recover: AccountName, new_owner_key: String },
  RecoverAccount { account_to_recover: AccountName, new_owner_key: String },
  ResetAccount { reset_account: AccountName, account: AccountName, new_owner_key: String },
  ActivityReward { account: AccountName, amount: Amount },

  // -- Balances -------------------------------------------------------------
  Transfer { from: AccountName, to: AccountName, amount: Amount, memo: String },
  ClaimReward { account: AccountName, amount: Amount },
  Stake { account: AccountName, symbol: AssetSymbol, amount: u64 },
  Unstake { account: AccountName, symbol: AssetSymbol, amount: u64 },
  ToSavings { from: AccountName, to: AccountName, amount: Amount, memo: String },
  FromSavings { account: AccountName, to: AccountName, amount: Amount, memo: String, request_id: u32 },
  DelegateAsset { delegator: AccountName, delegatee: AccountName, symbol: AssetSymbol, amount: u64 },
  UndelegateAsset { delegator: AccountName, delegatee: AccountName, symbol: AssetSymbol },

  // -- Content ----------------------------------------------------------------
  Comment {
    author: AccountName,
    permlink: String,
    parent_author: Option<AccountName>,
    parent_permlink: Option<String>,
    reach: ReachTag,
    max_accepted_payout: Option<Amount>,
    percent_for_curators: u64,
    allow_curation_rewards: bool,
    allow_votes: bool,
    allow_views: bool,
    allow_shares: bool,
    beneficiaries: Vec<(AccountName, u64)>,
  },
  CommentVote { voter: AccountName, author: AccountName, permlink: String, weight_percent: i64 },
  CommentView { viewer: AccountName, author: AccountName, permlink: String },
  CommentShare { sharer: AccountName, author: AccountName, permlink: String },
  CommentModeration { moderator: AccountName, author: AccountName, permlink: String, tag: String },

  // -- Trading ------------------------------------------------------------
  LimitOrderCreate { owner: AccountName, order_id: u32, for_sale: Amount, min_to_receive: Amount, expiration: Option<ChainTime>, fill_or_kill: bool },
  LimitOrderCancel { owner: AccountName, order_id: LimitOrderId },
  MarginOrderCreate { owner: AccountName, order_id: u32, collateral: Amount, debt: Amount, sell: Amount, receive: Amount },
  MarginOrderClose { owner: AccountName, order_id: MarginOrderId },
  CallOrderUpdate { owner: AccountName, collateral_delta: Amount, debt_delta: Amount, target_collateral_ratio: Option<u64> },
  AuctionOrderCreate { owner: AccountName, for_sale: Amount, min_to_receive: Amount },
  OptionOrderCreate { owner: AccountName, pool_underlying: AssetSymbol, pool_strike: AssetSymbol, collateral: Amount },

  // -- Pools ----------------------------------------------------------------
  LiquidityPoolCreate { creator: AccountName, symbol_a: AssetSymbol, symbol_b: AssetSymbol, amount_a: u64, amount_b: u64 },
  LiquidityPoolExchange { trader: AccountName, pool_a: AssetSymbol, pool_b: AssetSymbol, amount_in: Amount, limit_price: Option<(u64, u64)>, interface: Option<AccountName> },
  LiquidityPoolFund { provider: AccountName, pool_a: AssetSymbol, pool_b: AssetSymbol, amount_a: u64, amount_b: u64 },
  LiquidityPoolWithdraw { provider: AccountName, pool_a: AssetSymbol, pool_b: AssetSymbol, shares: u64 },
  CreditPoolCollateral { owner: AccountName, symbol: AssetSymbol, amount: u64 },
  CreditPoolBorrow { owner: AccountName, loan_id: CreditLoanId, debt_symbol: AssetSymbol, amount: u64, collateral_symbol: AssetSymbol, collateral: u64, is_flash: bool },
  CreditPoolLend { lender: AccountName, base_symbol: AssetSymbol, amount: u64 },
  CreditPoolWithdraw { lender: AccountName, base_symbol: AssetSymbol, shares: u64 },
  PredictionPoolCreate { creator: AccountName, collateral_symbol: AssetSymbol, outcome_symbols: Vec<AssetSymbol>, outcome_time: ChainTime },
  PredictionPoolExchange { trader: AccountName, pool: PredictionPoolId, collateral_amount: u64, redeem: bool },
  PredictionPoolResolve { voter: AccountName, pool: PredictionPoolId, outcome: AssetSymbol, bond_staked: u64 },

  // -- Asset lifecycle ------------------------------------------------------
  AssetCreate { issuer: AccountName, symbol: AssetSymbol, kind: crate::objects::AssetKind, max_supply: u64, market_fee_percent: u64, permissions: u32, backing_asset: Option<AssetSymbol> },
  AssetUpdate { issuer: AccountName, symbol: AssetSymbol, new_flags: u32, new_market_fee_percent: u64 },
  AssetIssue { issuer: AccountName, to: AccountName, amount: Amount },
  AssetReserve { owner: AccountName, amount: Amount },
  AssetUpdateIssuer { issuer: AccountName, symbol: AssetSymbol, new_issuer: AccountName },
  PublishFeed { publisher: AccountName, symbol: AssetSymbol, settlement_price_num: u64, settlement_price_den: u64, maintenance_collateral_ratio: u64 },
  UpdateFeedProducers { issuer: AccountName, symbol: AssetSymbol, producers: Vec<AccountName> },
  GlobalSettle { issuer: AccountName, symbol: AssetSymbol },
  ForceSettle { owner: AccountName, symbol: AssetSymbol, amount: u64 },
  CollateralBid { bidder: AccountName, symbol: AssetSymbol, collateral: u64, debt_covered: u64 },

  // -- Marketplace ------------------------------------------------------------
  EscrowTransfer { from: AccountName, to: AccountName, agent: AccountName, escrow_id: EscrowId, amount: Amount, fee: Amount, ratification_deadline: ChainTime, escrow_expiration: ChainTime },
  EscrowApprove { who: AccountName, escrow_id: EscrowId, approve: bool },
  EscrowDispute { who: AccountName, escrow_id: EscrowId },
  EscrowRelease { who: AccountName, escrow_id: EscrowId, receiver: AccountName, amount: Amount },

  // -- Producers ----------------------------------------------------------
  ProducerUpdate { owner: AccountName, signing_key: String },
  ProducerViolation { reporter: AccountName, producer: AccountName },

  // -- Framework-consistent lighter groups (business, governance, network
  // roles, communities, ads, graph) share one representative shape per
  // §1 non-goals: the framework is specified exhaustively, the long tail
  // of near-identical record-registry ops is not.
  CommunityCreate { creator: AccountName, name: String },
  CommunitySubscribe { account: AccountName, community: String, unsubscribe: bool },
  NetworkOfficerVote { voter: AccountName, officer: AccountName, approve: bool },
  Custom { actor: AccountName, id: String, payload: String },
}

/// Collects the authorities an operation requires before any evaluator
/// runs (§4.2 step 1). Most operations name exactly one actor at `Active`;
/// content/voting ops are `Posting`; key-rotation and recovery ops are
/// `Owner`.
pub fn required_authorities(op: &Operation) -> Vec<RequiredAuthority> {
  use Operation::*;
  let active = |account: &AccountName| vec![RequiredAuthority { account: account.clone(), level: AuthorityLevel::Active }];
  let posting = |account: &AccountName| vec![RequiredAuthority { account: account.clone(), level: AuthorityLevel::Posting }];
  let owner = |account: &AccountName| vec![RequiredAuthority { account: account.clone(), level: AuthorityLevel::Owner }];

  match op {
    AccountCreate { creator, .. } => active(creator),
    AccountUpdate { account, new_owner_key, .. } => {
      if new_owner_key.is_some() { owner(account) } else { active(account) }
    }
    AccountMembership { account, .. } => active(account),
    DeclineVoting { account, .. } => owner(account),
    Follow { follower, .. } => posting(follower),
    WitnessVote { voter, .. } => active(voter),
    RequestAccountRecovery { recovery_account, .. } => active(recovery_account),
    RecoverAccount { account_to_recover, .. } => owner(account_to_recover),
    ResetAccount { reset_account, .. } => active(reset_account),
    ActivityReward { .. } => vec![],

    Transfer { from, .. } => active(from),
    ClaimReward { account, .. } => posting(account),
    Stake { account, .. } => active(account),
    Unstake { account, .. } => active(account),
    ToSavings { from, .. } => active(from),
    FromSavings { account, .. } => active(account),
    DelegateAsset { delegator, .. } => active(delegator),
    UndelegateAsset { delegator, .. } => active(delegator),

    Comment { author, .. } => posting(author),
    CommentVote { voter, .. } => posting(voter),
    CommentView { viewer, .. } => posting(viewer),
    CommentShare { sharer, .. } => posting(sharer),
    CommentModeration { moderator, .. } => active(moderator),

    LimitOrderCreate { owner: o, .. } => active(o),
    LimitOrderCancel { owner: o, .. } => active(o),
    MarginOrderCreate { owner: o, .. } => active(o),
    MarginOrderClose { owner: o, .. } => active(o),
    CallOrderUpdate { owner: o, .. } => active(o),
    AuctionOrderCreate { owner: o, .. } => active(o),
    OptionOrderCreate { owner: o, .. } => active(o),

    LiquidityPoolCreate { creator, .. } => active(creator),
    LiquidityPoolExchange { trader, .. } => active(trader),
    LiquidityPoolFund { provider, .. } => active(provider),
    LiquidityPoolWithdraw { provider, .. } => active(provider),
    CreditPoolCollateral { owner: o, .. } => active(o),
    CreditPoolBorrow { owner: o, .. } => active(o),
    CreditPoolLend { lender, .. } => active(lender),
    CreditPoolWithdraw { lender, .. } => active(lender),
    PredictionPoolCreate { creator, .. } => active(creator),
    PredictionPoolExchange { trader, .. } => active(trader),
    PredictionPoolResolve { voter, .. } => active(voter),

    AssetCreate { issuer, .. } => active(issuer),
    AssetUpdate { issuer, .. } => active(issuer),
    AssetIssue { issuer, .. } => active(issuer),
    AssetReserve { owner: o, .. } => active(o),
    AssetUpdateIssuer { issuer, .. } => owner(issuer),
    PublishFeed { publisher, .. } => active(publisher),
    UpdateFeedProducers { issuer, .. } => active(issuer),
    GlobalSettle { issuer, .. } => active(issuer),
    ForceSettle { owner: o, .. } => active(o),
    CollateralBid { bidder, .. } => active(bidder),

    EscrowTransfer { from, .. } => active(from),
    EscrowApprove { who, .. } => active(who),
    EscrowDispute { who, .. } => active(who),
    EscrowRelease { who, .. } => active(who),

    ProducerUpdate { owner: o, .. } => active(o),
    ProducerViolation { reporter, .. } => active(reporter),

    CommunityCreate { creator, .. } => active(creator),
    CommunitySubscribe { account, .. } => posting(account),
    NetworkOfficerVote { voter, .. } => active(voter),
    Custom { actor, .. } => posting(actor),
  }
}

/// Dispatches one operation to its evaluator (§4.3 steps 1-6). The caller
/// (transaction apply loop) is responsible for the undo scope: on `Err`
/// every mutation this call made is rolled back along with the rest of the
/// enclosing transaction (§4.3 step 7).
pub fn apply_operation(store: &mut Store, op: &Operation, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  use Operation::*;
  match op {
    AccountCreate { creator, new_account, owner_key, fee } => {
      account::create(store, creator, new_account, owner_key, fee, now)
    }
    AccountUpdate { account, new_owner_key, new_active_key, new_posting_key } => {
      account::update(store, account, new_owner_key.clone(), new_active_key.clone(), new_posting_key.clone(), now)
    }
    AccountMembership { account, tier, months } => account::membership(store, account, *tier, *months, now),
    DeclineVoting { account, decline } => account::decline_voting(store, account, *decline),
    Follow { follower, followed, unfollow } => account::follow(store, follower, followed, *unfollow),
    WitnessVote { voter, witness, approve } => account::witness_vote(store, voter, witness, *approve),
    RequestAccountRecovery { recovery_account, account_to_recover, new_owner_key } => {
      account::request_recovery(store, recovery_account, account_to_recover, new_owner_key, now)
    }
    RecoverAccount { account_to_recover, new_owner_key } => account::recover(store, account_to_recover, new_owner_key, now),
    ResetAccount { reset_account, account, new_owner_key } => account::reset(store, reset_account, account, new_owner_key, now),
    ActivityReward { account, amount } => account::activity_reward(store, account, amount),

    Transfer { from, to, amount, memo: _ } => balances::transfer(store, from, to, amount),
    ClaimReward { account, amount } => balances::claim_reward(store, account, amount),
    Stake { account, symbol, amount } => balances::stake(store, account, symbol, *amount),
    Unstake { account, symbol, amount } => balances::unstake(store, account, symbol, *amount, now),
    ToSavings { from, to, amount, memo: _ } => balances::to_savings(store, from, to, amount),
    FromSavings { account, to, amount, memo, request_id } => {
      balances::from_savings(store, account, to, amount, memo, *request_id, now)
    }
    DelegateAsset { delegator, delegatee, symbol, amount } => {
      balances::delegate(store, delegator, delegatee, symbol, *amount, now)
    }
    UndelegateAsset { delegator, delegatee, symbol } => balances::undelegate(store, delegator, delegatee, symbol, now),

    Comment { author, permlink, parent_author, parent_permlink, reach, max_accepted_payout, percent_for_curators, allow_curation_rewards, allow_votes, allow_views, allow_shares, beneficiaries } => {
      content::comment(
        store, author, permlink, parent_author.as_ref(), parent_permlink.as_deref(), *reach,
        max_accepted_payout.clone(), *percent_for_curators, *allow_curation_rewards, *allow_votes, *allow_views,
        *allow_shares, beneficiaries.clone(), now,
      )
    }
    CommentVote { voter, author, permlink, weight_percent } => content::vote(store, voter, author, permlink, *weight_percent, now),
    CommentView { viewer, author, permlink } => content::view(store, viewer, author, permlink, now),
    CommentShare { sharer, author, permlink } => content::share(store, sharer, author, permlink, now),
    CommentModeration { moderator, author, permlink, tag } => content::moderate(store, moderator, author, permlink, tag),

    LimitOrderCreate { owner: o, order_id, for_sale, min_to_receive, expiration, fill_or_kill } => {
      trading::limit_order_create(store, o, *order_id, for_sale, min_to_receive, *expiration, *fill_or_kill, now)
    }
    LimitOrderCancel { owner: o, order_id } => trading::limit_order_cancel(store, o, *order_id),
    MarginOrderCreate { owner: o, order_id, collateral, debt, sell, receive } => {
      trading::margin_order_create(store, o, *order_id, collateral, debt, sell, receive, now)
    }
    MarginOrderClose { owner: o, order_id } => trading::margin_order_close(store, o, *order_id, now),
    CallOrderUpdate { owner: o, collateral_delta, debt_delta, target_collateral_ratio } => {
      trading::call_order_update(store, o, collateral_delta, debt_delta, *target_collateral_ratio, now)
    }
    AuctionOrderCreate { owner: o, for_sale, min_to_receive } => trading::auction_order_create(store, o, for_sale, min_to_receive, now),
    OptionOrderCreate { owner: o, pool_underlying, pool_strike, collateral } => {
      trading::option_order_create(store, o, pool_underlying, pool_strike, collateral, now)
    }

    LiquidityPoolCreate { creator, symbol_a, symbol_b, amount_a, amount_b } => {
      pools::liquidity_pool_create(store, creator, symbol_a, symbol_b, *amount_a, *amount_b, now)
    }
    LiquidityPoolExchange { trader, pool_a, pool_b, amount_in, limit_price, interface } => {
      pools::liquidity_pool_exchange(store, trader, pool_a, pool_b, amount_in, *limit_price, interface.as_ref(), now)
    }
    LiquidityPoolFund { provider, pool_a, pool_b, amount_a, amount_b } => {
      pools::liquidity_pool_fund(store, provider, pool_a, pool_b, *amount_a, *amount_b)
    }
    LiquidityPoolWithdraw { provider, pool_a, pool_b, shares } => {
      pools::liquidity_pool_withdraw(store, provider, pool_a, pool_b, *shares)
    }
    CreditPoolCollateral { owner: o, symbol, amount } => pools::credit_pool_collateral(store, o, symbol, *amount, now),
    CreditPoolBorrow { owner: o, loan_id, debt_symbol, amount, collateral_symbol, collateral, is_flash } => {
      pools::credit_pool_borrow(store, o, *loan_id, debt_symbol, *amount, collateral_symbol, *collateral, *is_flash, now)
    }
    CreditPoolLend { lender, base_symbol, amount } => pools::credit_pool_lend(store, lender, base_symbol, *amount),
    CreditPoolWithdraw { lender, base_symbol, shares } => pools::credit_pool_withdraw(store, lender, base_symbol, *shares),
    PredictionPoolCreate { creator, collateral_symbol, outcome_symbols, outcome_time } => {
      pools::prediction_pool_create(store, creator, collateral_symbol, outcome_symbols, *outcome_time, now)
    }
    PredictionPoolExchange { trader, pool, collateral_amount, redeem } => {
      pools::prediction_pool_exchange(store, trader, *pool, *collateral_amount, *redeem)
    }
    PredictionPoolResolve { voter, pool, outcome, bond_staked } => {
      pools::prediction_pool_resolve(store, voter, *pool, outcome, *bond_staked, now)
    }

    AssetCreate { issuer, symbol, kind, max_supply, market_fee_percent, permissions, backing_asset } => {
      asset::create(store, issuer, symbol, *kind, *max_supply, *market_fee_percent, *permissions, backing_asset.as_ref(), now)
    }
    AssetUpdate { issuer, symbol, new_flags, new_market_fee_percent } => {
      asset::update(store, issuer, symbol, *new_flags, *new_market_fee_percent)
    }
    AssetIssue { issuer, to, amount } => asset::issue(store, issuer, to, amount),
    AssetReserve { owner: o, amount } => asset::reserve(store, o, amount),
    AssetUpdateIssuer { issuer, symbol, new_issuer } => asset::update_issuer(store, issuer, symbol, new_issuer),
    PublishFeed { publisher, symbol, settlement_price_num, settlement_price_den, maintenance_collateral_ratio } => {
      asset::publish_feed(store, publisher, symbol, *settlement_price_num, *settlement_price_den, *maintenance_collateral_ratio, now)
    }
    UpdateFeedProducers { issuer, symbol, producers } => asset::update_feed_producers(store, issuer, symbol, producers.clone()),
    GlobalSettle { issuer, symbol } => asset::global_settle(store, issuer, symbol),
    ForceSettle { owner: o, symbol, amount } => asset::force_settle(store, o, symbol, *amount, now),
    CollateralBid { bidder, symbol, collateral, debt_covered } => asset::collateral_bid(store, bidder, symbol, *collateral, *debt_covered, now),

    EscrowTransfer { from, to, agent, escrow_id, amount, fee, ratification_deadline, escrow_expiration } => {
      marketplace::escrow_transfer(store, from, to, agent, *escrow_id, amount, fee, *ratification_deadline, *escrow_expiration)
    }
    EscrowApprove { who, escrow_id, approve } => marketplace::escrow_approve(store, who, *escrow_id, *approve),
    EscrowDispute { who, escrow_id } => marketplace::escrow_dispute(store, who, *escrow_id),
    EscrowRelease { who, escrow_id, receiver, amount } => marketplace::escrow_release(store, who, *escrow_id, receiver, amount),

    ProducerUpdate { owner: o, signing_key } => producers::producer_update(store, o, signing_key, now),
    ProducerViolation { reporter, producer } => producers::producer_violation(store, reporter, producer),

    CommunityCreate { creator, name } => social::community_create(store, creator, name),
    CommunitySubscribe { account, community, unsubscribe } => social::community_subscribe(store, account, community, *unsubscribe),
    NetworkOfficerVote { voter, officer, approve } => social::network_officer_vote(store, voter, officer, *approve),
    Custom { actor, id, payload } => social::custom(store, actor, id, payload),
  }
}

// Re-exported so `CallOrderId`/`OptionStyle` stay referenced for downstream
// match arms that construct store records directly from op fields.
#[allow(unused_imports)]
use CallOrderId as _CallOrderIdRef;
#[allow(unused_imports)]
use OptionStyle as _OptionStyleRef;
