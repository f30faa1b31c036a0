pub mod table;

use std::collections::BTreeMap;

use common::ChainTime;

use crate::config::{ChainSpec, MedianChainProperties};
use crate::error::{KernelError, StoreError};
use crate::ids::{
  AccountId, AccountName, AssetDelegationExpirationId, AssetId, AssetSymbol, AuctionOrderId,
  CallOrderId, CollateralBidId, CreditCollateralId, CreditLoanId, CreditPoolId, EscrowId,
  LimitOrderId, LiquidityPoolId, MarginOrderId, OptionOrderId, OptionPoolId, PredictionPoolId,
  ProducerId, RecoveryRequestId, SavingsWithdrawId,
};
use crate::objects::*;
use table::Table;

/// One mark per table in the store, taken together at `begin_session` and
/// compared against at `rollback`/`commit` (§4.1 "undo_session").
#[derive(Clone, Copy)]
pub struct Checkpoint {
  accounts: usize,
  account_ids: usize,
  assets: usize,
  asset_ids: usize,
  asset_dynamic: usize,
  bitasset_data: usize,
  equity_data: usize,
  credit_data: usize,
  balances: usize,
  limit_orders: usize,
  margin_orders: usize,
  call_orders: usize,
  auction_orders: usize,
  option_orders: usize,
  liquidity_pools: usize,
  credit_pools: usize,
  option_pools: usize,
  prediction_pools: usize,
  credit_collateral: usize,
  credit_loans: usize,
  comments: usize,
  producers: usize,
  escrows: usize,
  recovery_requests: usize,
  savings_withdraws: usize,
  asset_delegations: usize,
  delegation_expirations: usize,
  collateral_bids: usize,
  follows: usize,
  witness_votes: usize,
  communities: usize,
  community_subscriptions: usize,
  network_officer_votes: usize,
  head_block_num: u64,
  head_time: ChainTime,
  content_reward_pool: u64,
}

/// RAII-style undo scope (§4.1, §9). Nothing is reverted automatically on
/// drop in this implementation — the kernel's transaction/block loop calls
/// `commit` or `rollback` explicitly at every scope exit, matching the
/// explicit-`Result`-propagation design chosen over exception unwinding
/// (§9 "exceptions used for control flow").
#[derive(Clone, Copy)]
pub struct UndoSession {
  mark: Checkpoint,
}

/// The kernel's in-memory object store: one `Table` per record kind, each
/// independently undo-journaled, plus monotonic id counters. Every field is
/// private; all access goes through `Store`'s typed accessors so no caller
/// can bypass the undo discipline (§4.1 contract).
pub struct Store {
  pub chain_spec: ChainSpec,
  head_block_num: u64,
  head_time: ChainTime,
  irreversible_block_num: u64,
  /// The checkpoint taken just before the most recently applied block, so
  /// `pop_block` (§6.6) can undo it. Cleared on pop and overwritten by the
  /// next `apply_block`; only the single most recent block is poppable,
  /// matching the host's "undo the block it just applied" use (§8
  /// "apply(block); pop_block()").
  last_block_mark: Option<Checkpoint>,

  next_account_id: u64,
  accounts: Table<AccountName, Account>,
  account_ids: Table<AccountId, AccountName>,

  next_asset_id: u64,
  assets: Table<AssetSymbol, Asset>,
  asset_ids: Table<AssetId, AssetSymbol>,
  asset_dynamic: Table<AssetSymbol, AssetDynamicData>,
  bitasset_data: Table<AssetSymbol, BitassetData>,
  equity_data: Table<AssetSymbol, EquityData>,
  credit_data: Table<AssetSymbol, CreditData>,

  balances: Table<(AccountName, AssetSymbol), Balance>,

  next_limit_order_id: u64,
  limit_orders: Table<LimitOrderId, LimitOrder>,
  next_margin_order_id: u64,
  margin_orders: Table<MarginOrderId, MarginOrder>,
  next_call_order_id: u64,
  call_orders: Table<CallOrderId, CallOrder>,
  next_auction_order_id: u64,
  auction_orders: Table<AuctionOrderId, AuctionOrder>,
  next_option_order_id: u64,
  option_orders: Table<OptionOrderId, OptionOrder>,

  next_liquidity_pool_id: u64,
  liquidity_pools: Table<(AssetSymbol, AssetSymbol), LiquidityPool>,
  next_credit_pool_id: u64,
  credit_pools: Table<AssetSymbol, CreditPool>,
  next_option_pool_id: u64,
  option_pools: Table<OptionPoolId, OptionPool>,
  next_prediction_pool_id: u64,
  prediction_pools: Table<PredictionPoolId, PredictionPool>,

  credit_collateral: Table<(AccountName, AssetSymbol), CreditCollateral>,
  next_credit_loan_id: u64,
  credit_loans: Table<CreditLoanId, CreditLoan>,

  next_comment_id: u64,
  comments: Table<(AccountName, String), Comment>,

  next_producer_id: u64,
  producers: Table<AccountName, Producer>,
  pub producer_schedule: ProducerSchedule,

  next_escrow_id: u64,
  escrows: Table<EscrowId, Escrow>,
  recovery_requests: Table<AccountName, RecoveryRequest>,
  next_savings_withdraw_id: u64,
  savings_withdraws: Table<SavingsWithdrawId, SavingsWithdraw>,
  asset_delegations: Table<(AccountName, AccountName, AssetSymbol), AssetDelegation>,
  next_delegation_expiration_id: u64,
  delegation_expirations: Table<AssetDelegationExpirationId, AssetDelegationExpiration>,

  next_collateral_bid_id: u64,
  collateral_bids: Table<(AssetSymbol, CollateralBidId), CollateralBid>,

  /// Who follows whom, so `unfollow` only decrements a followed account's
  /// `follower_count` when a follow actually existed (§3.1).
  follows: Table<(AccountName, AccountName), ()>,
  /// Weight each voter last cast for each witness, so a repeat
  /// `witness_vote` adjusts the witness's `vote_weight` by the delta
  /// rather than double-counting (§3.8, §4.11).
  witness_votes: Table<(AccountName, AccountName), u64>,

  communities: Table<String, Community>,
  community_subscriptions: Table<(AccountName, String), ()>,
  /// Whether a voter currently backs a network officer. No vote-weight
  /// aggregation is modeled; that tally is a presentation-layer concern
  /// (§1 Non-goals, governance UI).
  network_officer_votes: Table<(AccountName, AccountName), ()>,

  /// Inflation accumulated for authors/curators since the last cashout
  /// batch drained it (§4.9). Denominated in `chain_spec.native_symbol`.
  content_reward_pool: u64,
  last_reward_fund_accrual: ChainTime,
}

impl Store {
  pub fn new(chain_spec: ChainSpec, genesis_time: ChainTime) -> Self {
    Self {
      chain_spec,
      head_block_num: 0,
      head_time: genesis_time,
      irreversible_block_num: 0,
      last_block_mark: None,
      content_reward_pool: 0,
      last_reward_fund_accrual: genesis_time,
      next_account_id: 1,
      accounts: Table::default(),
      account_ids: Table::default(),
      next_asset_id: 1,
      assets: Table::default(),
      asset_ids: Table::default(),
      asset_dynamic: Table::default(),
      bitasset_data: Table::default(),
      equity_data: Table::default(),
      credit_data: Table::default(),
      balances: Table::default(),
      next_limit_order_id: 1,
      limit_orders: Table::default(),
      next_margin_order_id: 1,
      margin_orders: Table::default(),
      next_call_order_id: 1,
      call_orders: Table::default(),
      next_auction_order_id: 1,
      auction_orders: Table::default(),
      next_option_order_id: 1,
      option_orders: Table::default(),
      next_liquidity_pool_id: 1,
      liquidity_pools: Table::default(),
      next_credit_pool_id: 1,
      credit_pools: Table::default(),
      next_option_pool_id: 1,
      option_pools: Table::default(),
      next_prediction_pool_id: 1,
      prediction_pools: Table::default(),
      credit_collateral: Table::default(),
      next_credit_loan_id: 1,
      credit_loans: Table::default(),
      next_comment_id: 1,
      comments: Table::default(),
      next_producer_id: 1,
      producers: Table::default(),
      producer_schedule: ProducerSchedule::default(),
      next_escrow_id: 1,
      escrows: Table::default(),
      recovery_requests: Table::default(),
      next_savings_withdraw_id: 1,
      savings_withdraws: Table::default(),
      asset_delegations: Table::default(),
      next_delegation_expiration_id: 1,
      delegation_expirations: Table::default(),
      next_collateral_bid_id: 1,
      collateral_bids: Table::default(),
      follows: Table::default(),
      witness_votes: Table::default(),
      communities: Table::default(),
      community_subscriptions: Table::default(),
      network_officer_votes: Table::default(),
    }
  }

  // -- head / irreversibility -------------------------------------------

  pub fn head_block_num(&self) -> u64 {
    self.head_block_num
  }

  pub fn head_time(&self) -> ChainTime {
    self.head_time
  }

  pub fn irreversible_block_num(&self) -> u64 {
    self.irreversible_block_num
  }

  pub fn set_head(&mut self, block_num: u64, time: ChainTime) {
    self.head_block_num = block_num;
    self.head_time = time;
  }

  pub fn set_irreversible(&mut self, block_num: u64) {
    if block_num > self.irreversible_block_num {
      self.irreversible_block_num = block_num;
      self.prune(block_num);
    }
  }

  /// Drop undo history that can never be rolled back to because the block
  /// it belongs to is irreversible (§5). `pop_block` only ever targets the
  /// single most recent block, so once that block (or an earlier one)
  /// becomes irreversible there is nothing left poppable; `Table::log`
  /// itself is left to grow, since this in-memory store never persists or
  /// replays from it.
  fn prune(&mut self, _irreversible_block_num: u64) {
    self.last_block_mark = None;
  }

  // -- undo sessions ------------------------------------------------------

  pub fn begin_session(&self) -> UndoSession {
    UndoSession {
      mark: Checkpoint {
        accounts: self.accounts.checkpoint(),
        account_ids: self.account_ids.checkpoint(),
        assets: self.assets.checkpoint(),
        asset_ids: self.asset_ids.checkpoint(),
        asset_dynamic: self.asset_dynamic.checkpoint(),
        bitasset_data: self.bitasset_data.checkpoint(),
        equity_data: self.equity_data.checkpoint(),
        credit_data: self.credit_data.checkpoint(),
        balances: self.balances.checkpoint(),
        limit_orders: self.limit_orders.checkpoint(),
        margin_orders: self.margin_orders.checkpoint(),
        call_orders: self.call_orders.checkpoint(),
        auction_orders: self.auction_orders.checkpoint(),
        option_orders: self.option_orders.checkpoint(),
        liquidity_pools: self.liquidity_pools.checkpoint(),
        credit_pools: self.credit_pools.checkpoint(),
        option_pools: self.option_pools.checkpoint(),
        prediction_pools: self.prediction_pools.checkpoint(),
        credit_collateral: self.credit_collateral.checkpoint(),
        credit_loans: self.credit_loans.checkpoint(),
        comments: self.comments.checkpoint(),
        producers: self.producers.checkpoint(),
        escrows: self.escrows.checkpoint(),
        recovery_requests: self.recovery_requests.checkpoint(),
        savings_withdraws: self.savings_withdraws.checkpoint(),
        asset_delegations: self.asset_delegations.checkpoint(),
        delegation_expirations: self.delegation_expirations.checkpoint(),
        collateral_bids: self.collateral_bids.checkpoint(),
        follows: self.follows.checkpoint(),
        witness_votes: self.witness_votes.checkpoint(),
        communities: self.communities.checkpoint(),
        community_subscriptions: self.community_subscriptions.checkpoint(),
        network_officer_votes: self.network_officer_votes.checkpoint(),
        head_block_num: self.head_block_num,
        head_time: self.head_time,
        content_reward_pool: self.content_reward_pool,
      },
    }
  }

  /// Commit discards the session marker; mutations remain and are now
  /// visible to (and only revertible by) the enclosing scope.
  pub fn commit(&self, _session: UndoSession) {}

  /// Commits a block-level session while keeping its mark as the one
  /// `pop_block` rolls back to (§6.6). Called once per successfully
  /// applied block; overwrites whatever the previous block left behind,
  /// since only the most recent block is ever poppable.
  pub fn set_last_block_mark(&mut self, session: UndoSession) {
    self.last_block_mark = Some(session.mark);
  }

  pub fn rollback(&mut self, session: UndoSession) {
    self.rollback_to_mark(session.mark);
  }

  fn rollback_to_mark(&mut self, mark: Checkpoint) {
    self.accounts.rollback_to(mark.accounts);
    self.account_ids.rollback_to(mark.account_ids);
    self.assets.rollback_to(mark.assets);
    self.asset_ids.rollback_to(mark.asset_ids);
    self.asset_dynamic.rollback_to(mark.asset_dynamic);
    self.bitasset_data.rollback_to(mark.bitasset_data);
    self.equity_data.rollback_to(mark.equity_data);
    self.credit_data.rollback_to(mark.credit_data);
    self.balances.rollback_to(mark.balances);
    self.limit_orders.rollback_to(mark.limit_orders);
    self.margin_orders.rollback_to(mark.margin_orders);
    self.call_orders.rollback_to(mark.call_orders);
    self.auction_orders.rollback_to(mark.auction_orders);
    self.option_orders.rollback_to(mark.option_orders);
    self.liquidity_pools.rollback_to(mark.liquidity_pools);
    self.credit_pools.rollback_to(mark.credit_pools);
    self.option_pools.rollback_to(mark.option_pools);
    self.prediction_pools.rollback_to(mark.prediction_pools);
    self.credit_collateral.rollback_to(mark.credit_collateral);
    self.credit_loans.rollback_to(mark.credit_loans);
    self.comments.rollback_to(mark.comments);
    self.producers.rollback_to(mark.producers);
    self.escrows.rollback_to(mark.escrows);
    self.recovery_requests.rollback_to(mark.recovery_requests);
    self.savings_withdraws.rollback_to(mark.savings_withdraws);
    self.asset_delegations.rollback_to(mark.asset_delegations);
    self.delegation_expirations.rollback_to(mark.delegation_expirations);
    self.collateral_bids.rollback_to(mark.collateral_bids);
    self.follows.rollback_to(mark.follows);
    self.witness_votes.rollback_to(mark.witness_votes);
    self.communities.rollback_to(mark.communities);
    self.community_subscriptions.rollback_to(mark.community_subscriptions);
    self.network_officer_votes.rollback_to(mark.network_officer_votes);
    self.head_block_num = mark.head_block_num;
    self.head_time = mark.head_time;
    self.content_reward_pool = mark.content_reward_pool;
  }

  /// Undoes the most recently applied block (§6.6, §8 "apply(block);
  /// pop_block()"). Fails if no block is poppable: none has been applied
  /// yet, the last one was already popped, or it has since become
  /// irreversible and its undo history was pruned.
  pub fn pop_block(&mut self) -> Result<(), StoreError> {
    if self.head_block_num <= self.irreversible_block_num {
      return Err(StoreError::NoActiveSession);
    }
    let mark = self.last_block_mark.take().ok_or(StoreError::NoActiveSession)?;
    self.rollback_to_mark(mark);
    Ok(())
  }

  // -- accounts ------------------------------------------------------------

  pub fn create_account(&mut self, account: Account) -> Result<&Account, StoreError> {
    let name = account.name.clone();
    if self.accounts.contains(&name) {
      return Err(StoreError::AlreadyExists { kind: "account", key: name.to_string() });
    }
    self.account_ids.insert(account.id, name.clone());
    Ok(self.accounts.insert(name, account))
  }

  pub fn alloc_account_id(&mut self) -> AccountId {
    let id = AccountId(self.next_account_id);
    self.next_account_id += 1;
    id
  }

  pub fn find_account(&self, name: &AccountName) -> Option<&Account> {
    self.accounts.get(name)
  }

  pub fn get_account(&self, name: &AccountName) -> Result<&Account, KernelError> {
    self
      .find_account(name)
      .ok_or_else(|| KernelError::not_found("account", name.to_string()))
  }

  pub fn find_account_by_id(&self, id: AccountId) -> Option<&Account> {
    self.account_ids.get(&id).and_then(|name| self.accounts.get(name))
  }

  pub fn modify_account(
    &mut self,
    name: &AccountName,
    f: impl FnOnce(&mut Account),
  ) -> Result<(), StoreError> {
    self
      .accounts
      .modify(name, f)
      .ok_or_else(|| StoreError::NotFound { kind: "account", key: name.to_string() })
  }

  pub fn accounts_range(
    &self,
  ) -> impl DoubleEndedIterator<Item = (&AccountName, &Account)> {
    self.accounts.iter()
  }

  // -- assets ---------------------------------------------------------------

  pub fn alloc_asset_id(&mut self) -> AssetId {
    let id = AssetId(self.next_asset_id);
    self.next_asset_id += 1;
    id
  }

  pub fn create_asset(
    &mut self,
    asset: Asset,
    dynamic: AssetDynamicData,
  ) -> Result<&Asset, StoreError> {
    let symbol = asset.symbol.clone();
    if self.assets.contains(&symbol) {
      return Err(StoreError::AlreadyExists { kind: "asset", key: symbol.to_string() });
    }
    self.asset_ids.insert(asset.id, symbol.clone());
    self.asset_dynamic.insert(symbol.clone(), dynamic);
    Ok(self.assets.insert(symbol, asset))
  }

  pub fn find_asset(&self, symbol: &AssetSymbol) -> Option<&Asset> {
    self.assets.get(symbol)
  }

  pub fn get_asset(&self, symbol: &AssetSymbol) -> Result<&Asset, KernelError> {
    self
      .find_asset(symbol)
      .ok_or_else(|| KernelError::not_found("asset", symbol.to_string()))
  }

  pub fn modify_asset(
    &mut self,
    symbol: &AssetSymbol,
    f: impl FnOnce(&mut Asset),
  ) -> Result<(), StoreError> {
    self
      .assets
      .modify(symbol, f)
      .ok_or_else(|| StoreError::NotFound { kind: "asset", key: symbol.to_string() })
  }

  /// Creates an empty dynamic-data record for `symbol` if one is not
  /// already present. Asset creation always seeds this via
  /// `create_asset`; this entry point exists for the native currency
  /// asset and genesis/test setup that never runs through `asset_create`.
  pub fn ensure_asset_dynamic(&mut self, symbol: &AssetSymbol) {
    if !self.asset_dynamic.contains(symbol) {
      self.asset_dynamic.insert(symbol.clone(), AssetDynamicData::default());
    }
  }

  pub fn get_dynamic(&self, symbol: &AssetSymbol) -> Result<&AssetDynamicData, KernelError> {
    self
      .asset_dynamic
      .get(symbol)
      .ok_or_else(|| KernelError::not_found("asset_dynamic_data", symbol.to_string()))
  }

  pub fn modify_dynamic(
    &mut self,
    symbol: &AssetSymbol,
    f: impl FnOnce(&mut AssetDynamicData),
  ) -> Result<(), StoreError> {
    self
      .asset_dynamic
      .modify(symbol, f)
      .ok_or_else(|| StoreError::NotFound { kind: "asset_dynamic_data", key: symbol.to_string() })
  }

  pub fn create_bitasset_data(&mut self, data: BitassetData) {
    self.bitasset_data.insert(data.symbol.clone(), data);
  }

  pub fn find_bitasset_data(&self, symbol: &AssetSymbol) -> Option<&BitassetData> {
    self.bitasset_data.get(symbol)
  }

  pub fn get_bitasset_data(&self, symbol: &AssetSymbol) -> Result<&BitassetData, KernelError> {
    self
      .find_bitasset_data(symbol)
      .ok_or_else(|| KernelError::not_found("bitasset_data", symbol.to_string()))
  }

  pub fn modify_bitasset_data(
    &mut self,
    symbol: &AssetSymbol,
    f: impl FnOnce(&mut BitassetData),
  ) -> Result<(), StoreError> {
    self
      .bitasset_data
      .modify(symbol, f)
      .ok_or_else(|| StoreError::NotFound { kind: "bitasset_data", key: symbol.to_string() })
  }

  pub fn create_equity_data(&mut self, symbol: AssetSymbol, data: EquityData) {
    self.equity_data.insert(symbol, data);
  }

  pub fn find_equity_data(&self, symbol: &AssetSymbol) -> Option<&EquityData> {
    self.equity_data.get(symbol)
  }

  pub fn modify_equity_data(
    &mut self,
    symbol: &AssetSymbol,
    f: impl FnOnce(&mut EquityData),
  ) -> Result<(), StoreError> {
    self
      .equity_data
      .modify(symbol, f)
      .ok_or_else(|| StoreError::NotFound { kind: "equity_data", key: symbol.to_string() })
  }

  pub fn create_credit_data(&mut self, symbol: AssetSymbol, data: CreditData) {
    self.credit_data.insert(symbol, data);
  }

  pub fn find_credit_data(&self, symbol: &AssetSymbol) -> Option<&CreditData> {
    self.credit_data.get(symbol)
  }

  pub fn assets_range(&self) -> impl DoubleEndedIterator<Item = (&AssetSymbol, &Asset)> {
    self.assets.iter()
  }

  // -- balances ---------------------------------------------------------------

  pub fn find_balance(&self, owner: &AccountName, symbol: &AssetSymbol) -> Option<&Balance> {
    self.balances.get(&(owner.clone(), symbol.clone()))
  }

  /// Every balance mutation in the kernel funnels through here: if no
  /// record exists yet for `(owner, symbol)` one is created on demand with
  /// all sub-balances at zero, matching the original's "get-or-create"
  /// balance-object convention (§3.3, §4.4).
  pub fn balance_mut(
    &mut self,
    owner: &AccountName,
    symbol: &AssetSymbol,
    f: impl FnOnce(&mut Balance),
  ) {
    let key = (owner.clone(), symbol.clone());
    if !self.balances.contains(&key) {
      self.balances.insert(key.clone(), Balance::new(owner.clone(), symbol.clone()));
    }
    self.balances.modify(&key, f).expect("balance just ensured present");
  }

  pub fn balances_for_account(
    &self,
    owner: &AccountName,
  ) -> impl Iterator<Item = (&(AccountName, AssetSymbol), &Balance)> {
    let lo = (owner.clone(), AssetSymbol::new(""));
    let hi = (owner.clone(), AssetSymbol::new("\u{10FFFF}"));
    self.balances.range(lo..=hi)
  }

  // -- limit orders -----------------------------------------------------------

  pub fn alloc_limit_order_id(&mut self) -> LimitOrderId {
    let id = LimitOrderId(self.next_limit_order_id);
    self.next_limit_order_id += 1;
    id
  }

  pub fn create_limit_order(&mut self, order: LimitOrder) -> &LimitOrder {
    self.limit_orders.insert(order.id, order)
  }

  pub fn find_limit_order(&self, id: LimitOrderId) -> Option<&LimitOrder> {
    self.limit_orders.get(&id)
  }

  pub fn modify_limit_order(&mut self, id: LimitOrderId, f: impl FnOnce(&mut LimitOrder)) {
    self.limit_orders.modify(&id, f);
  }

  pub fn remove_limit_order(&mut self, id: LimitOrderId) -> Option<LimitOrder> {
    self.limit_orders.remove(&id)
  }

  pub fn limit_orders_for_pair(
    &self,
    sell: &AssetSymbol,
    receive: &AssetSymbol,
  ) -> Vec<&LimitOrder> {
    self
      .limit_orders
      .iter()
      .filter(|(_, o)| &o.for_sale.symbol == sell && &o.min_to_receive.symbol == receive)
      .map(|(_, o)| o)
      .collect()
  }

  pub fn all_limit_orders(&self) -> impl DoubleEndedIterator<Item = (&LimitOrderId, &LimitOrder)> {
    self.limit_orders.iter()
  }

  // -- margin orders ------------------------------------------------------------

  pub fn alloc_margin_order_id(&mut self) -> MarginOrderId {
    let id = MarginOrderId(self.next_margin_order_id);
    self.next_margin_order_id += 1;
    id
  }

  pub fn create_margin_order(&mut self, order: MarginOrder) -> &MarginOrder {
    self.margin_orders.insert(order.id, order)
  }

  pub fn find_margin_order(&self, id: MarginOrderId) -> Option<&MarginOrder> {
    self.margin_orders.get(&id)
  }

  pub fn modify_margin_order(&mut self, id: MarginOrderId, f: impl FnOnce(&mut MarginOrder)) {
    self.margin_orders.modify(&id, f);
  }

  pub fn remove_margin_order(&mut self, id: MarginOrderId) -> Option<MarginOrder> {
    self.margin_orders.remove(&id)
  }

  pub fn all_margin_orders(
    &self,
  ) -> impl DoubleEndedIterator<Item = (&MarginOrderId, &MarginOrder)> {
    self.margin_orders.iter()
  }

  // -- call orders ------------------------------------------------------------

  pub fn alloc_call_order_id(&mut self) -> CallOrderId {
    let id = CallOrderId(self.next_call_order_id);
    self.next_call_order_id += 1;
    id
  }

  pub fn create_call_order(&mut self, order: CallOrder) -> &CallOrder {
    self.call_orders.insert(order.id, order)
  }

  pub fn find_call_order_by_owner(
    &self,
    owner: &AccountName,
    debt_symbol: &AssetSymbol,
  ) -> Option<(&CallOrderId, &CallOrder)> {
    self
      .call_orders
      .iter()
      .find(|(_, o)| &o.owner == owner && &o.debt.symbol == debt_symbol)
  }

  pub fn modify_call_order(&mut self, id: CallOrderId, f: impl FnOnce(&mut CallOrder)) {
    self.call_orders.modify(&id, f);
  }

  pub fn remove_call_order(&mut self, id: CallOrderId) -> Option<CallOrder> {
    self.call_orders.remove(&id)
  }

  pub fn call_orders_for_debt_asset(&self, debt_symbol: &AssetSymbol) -> Vec<(&CallOrderId, &CallOrder)> {
    self.call_orders.iter().filter(|(_, o)| &o.debt.symbol == debt_symbol).collect()
  }

  // -- auction orders -----------------------------------------------------------

  pub fn alloc_auction_order_id(&mut self) -> AuctionOrderId {
    let id = AuctionOrderId(self.next_auction_order_id);
    self.next_auction_order_id += 1;
    id
  }

  pub fn create_auction_order(&mut self, order: AuctionOrder) -> &AuctionOrder {
    self.auction_orders.insert(order.id, order)
  }

  pub fn remove_auction_order(&mut self, id: AuctionOrderId) -> Option<AuctionOrder> {
    self.auction_orders.remove(&id)
  }

  pub fn auction_orders_for_pair(
    &self,
    sell: &AssetSymbol,
    receive: &AssetSymbol,
  ) -> Vec<(&AuctionOrderId, &AuctionOrder)> {
    self
      .auction_orders
      .iter()
      .filter(|(_, o)| &o.for_sale.symbol == sell && &o.min_to_receive.symbol == receive)
      .collect()
  }

  pub fn all_auction_orders(
    &self,
  ) -> impl DoubleEndedIterator<Item = (&AuctionOrderId, &AuctionOrder)> {
    self.auction_orders.iter()
  }

  // -- option orders -----------------------------------------------------------

  pub fn alloc_option_order_id(&mut self) -> OptionOrderId {
    let id = OptionOrderId(self.next_option_order_id);
    self.next_option_order_id += 1;
    id
  }

  pub fn create_option_order(&mut self, order: OptionOrder) -> &OptionOrder {
    self.option_orders.insert(order.id, order)
  }

  pub fn find_option_order(&self, id: OptionOrderId) -> Option<&OptionOrder> {
    self.option_orders.get(&id)
  }

  pub fn remove_option_order(&mut self, id: OptionOrderId) -> Option<OptionOrder> {
    self.option_orders.remove(&id)
  }

  pub fn all_option_orders(&self) -> impl DoubleEndedIterator<Item = (&OptionOrderId, &OptionOrder)> {
    self.option_orders.iter()
  }

  // -- liquidity pools -----------------------------------------------------------

  fn pool_key(a: &AssetSymbol, b: &AssetSymbol) -> (AssetSymbol, AssetSymbol) {
    if a.as_str() <= b.as_str() {
      (a.clone(), b.clone())
    } else {
      (b.clone(), a.clone())
    }
  }

  pub fn alloc_liquidity_pool_id(&mut self) -> LiquidityPoolId {
    let id = LiquidityPoolId(self.next_liquidity_pool_id);
    self.next_liquidity_pool_id += 1;
    id
  }

  pub fn create_liquidity_pool(&mut self, pool: LiquidityPool) -> Result<&LiquidityPool, StoreError> {
    let key = Self::pool_key(&pool.symbol_a, &pool.symbol_b);
    if self.liquidity_pools.contains(&key) {
      return Err(StoreError::AlreadyExists { kind: "liquidity_pool", key: format!("{key:?}") });
    }
    Ok(self.liquidity_pools.insert(key, pool))
  }

  pub fn find_liquidity_pool(&self, a: &AssetSymbol, b: &AssetSymbol) -> Option<&LiquidityPool> {
    self.liquidity_pools.get(&Self::pool_key(a, b))
  }

  pub fn modify_liquidity_pool(
    &mut self,
    a: &AssetSymbol,
    b: &AssetSymbol,
    f: impl FnOnce(&mut LiquidityPool),
  ) -> Result<(), StoreError> {
    let key = Self::pool_key(a, b);
    self
      .liquidity_pools
      .modify(&key, f)
      .ok_or_else(|| StoreError::NotFound { kind: "liquidity_pool", key: format!("{key:?}") })
  }

  pub fn liquidity_pools_range(
    &self,
  ) -> impl DoubleEndedIterator<Item = (&(AssetSymbol, AssetSymbol), &LiquidityPool)> {
    self.liquidity_pools.iter()
  }

  // -- credit pools -----------------------------------------------------------

  pub fn alloc_credit_pool_id(&mut self) -> CreditPoolId {
    let id = CreditPoolId(self.next_credit_pool_id);
    self.next_credit_pool_id += 1;
    id
  }

  pub fn create_credit_pool(&mut self, pool: CreditPool) -> Result<&CreditPool, StoreError> {
    let key = pool.base_asset.clone();
    if self.credit_pools.contains(&key) {
      return Err(StoreError::AlreadyExists { kind: "credit_pool", key: key.to_string() });
    }
    Ok(self.credit_pools.insert(key, pool))
  }

  pub fn find_credit_pool(&self, base: &AssetSymbol) -> Option<&CreditPool> {
    self.credit_pools.get(base)
  }

  pub fn get_credit_pool(&self, base: &AssetSymbol) -> Result<&CreditPool, KernelError> {
    self
      .find_credit_pool(base)
      .ok_or_else(|| KernelError::not_found("credit_pool", base.to_string()))
  }

  pub fn modify_credit_pool(
    &mut self,
    base: &AssetSymbol,
    f: impl FnOnce(&mut CreditPool),
  ) -> Result<(), StoreError> {
    self
      .credit_pools
      .modify(base, f)
      .ok_or_else(|| StoreError::NotFound { kind: "credit_pool", key: base.to_string() })
  }

  // -- option pools -----------------------------------------------------------

  pub fn alloc_option_pool_id(&mut self) -> OptionPoolId {
    let id = OptionPoolId(self.next_option_pool_id);
    self.next_option_pool_id += 1;
    id
  }

  pub fn create_option_pool(&mut self, pool: OptionPool) -> &OptionPool {
    self.option_pools.insert(pool.id, pool)
  }

  pub fn find_option_pool(&self, id: OptionPoolId) -> Option<&OptionPool> {
    self.option_pools.get(&id)
  }

  pub fn modify_option_pool(&mut self, id: OptionPoolId, f: impl FnOnce(&mut OptionPool)) -> Option<()> {
    self.option_pools.modify(&id, f)
  }

  pub fn all_option_pools(&self) -> impl DoubleEndedIterator<Item = (&OptionPoolId, &OptionPool)> {
    self.option_pools.iter()
  }

  // -- prediction pools -----------------------------------------------------------

  pub fn alloc_prediction_pool_id(&mut self) -> PredictionPoolId {
    let id = PredictionPoolId(self.next_prediction_pool_id);
    self.next_prediction_pool_id += 1;
    id
  }

  pub fn create_prediction_pool(&mut self, pool: PredictionPool) -> &PredictionPool {
    self.prediction_pools.insert(pool.id, pool)
  }

  pub fn find_prediction_pool(&self, id: PredictionPoolId) -> Option<&PredictionPool> {
    self.prediction_pools.get(&id)
  }

  pub fn get_prediction_pool(&self, id: PredictionPoolId) -> Result<&PredictionPool, KernelError> {
    self
      .find_prediction_pool(id)
      .ok_or_else(|| KernelError::not_found("prediction_pool", id.to_string()))
  }

  pub fn modify_prediction_pool(
    &mut self,
    id: PredictionPoolId,
    f: impl FnOnce(&mut PredictionPool),
  ) -> Result<(), StoreError> {
    self
      .prediction_pools
      .modify(&id, f)
      .ok_or_else(|| StoreError::NotFound { kind: "prediction_pool", key: id.to_string() })
  }

  pub fn all_prediction_pools(
    &self,
  ) -> impl DoubleEndedIterator<Item = (&PredictionPoolId, &PredictionPool)> {
    self.prediction_pools.iter()
  }

  // -- credit collateral & loans -----------------------------------------------------------

  pub fn find_credit_collateral(
    &self,
    owner: &AccountName,
    symbol: &AssetSymbol,
  ) -> Option<&CreditCollateral> {
    self.credit_collateral.get(&(owner.clone(), symbol.clone()))
  }

  pub fn credit_collateral_mut(
    &mut self,
    owner: &AccountName,
    symbol: &AssetSymbol,
    id: CreditCollateralId,
    f: impl FnOnce(&mut CreditCollateral),
  ) {
    let key = (owner.clone(), symbol.clone());
    if !self.credit_collateral.contains(&key) {
      self.credit_collateral.insert(
        key.clone(),
        CreditCollateral { id, owner: owner.clone(), collateral: crate::amount::Amount::zero(symbol.clone()), created: self.head_time },
      );
    }
    self.credit_collateral.modify(&key, f).expect("collateral just ensured present");
  }

  pub fn remove_credit_collateral(&mut self, owner: &AccountName, symbol: &AssetSymbol) -> Option<CreditCollateral> {
    self.credit_collateral.remove(&(owner.clone(), symbol.clone()))
  }

  pub fn alloc_credit_loan_id(&mut self) -> CreditLoanId {
    let id = CreditLoanId(self.next_credit_loan_id);
    self.next_credit_loan_id += 1;
    id
  }

  pub fn create_credit_loan(&mut self, loan: CreditLoan) -> &CreditLoan {
    self.credit_loans.insert(loan.id, loan)
  }

  pub fn find_credit_loan(&self, id: CreditLoanId) -> Option<&CreditLoan> {
    self.credit_loans.get(&id)
  }

  pub fn modify_credit_loan(&mut self, id: CreditLoanId, f: impl FnOnce(&mut CreditLoan)) {
    self.credit_loans.modify(&id, f);
  }

  pub fn remove_credit_loan(&mut self, id: CreditLoanId) -> Option<CreditLoan> {
    self.credit_loans.remove(&id)
  }

  pub fn loans_for_owner(&self, owner: &AccountName) -> Vec<(&CreditLoanId, &CreditLoan)> {
    self.credit_loans.iter().filter(|(_, l)| &l.owner == owner).collect()
  }

  pub fn all_credit_loans(&self) -> impl DoubleEndedIterator<Item = (&CreditLoanId, &CreditLoan)> {
    self.credit_loans.iter()
  }

  // -- comments -----------------------------------------------------------

  pub fn alloc_comment_id(&mut self) -> u64 {
    let id = self.next_comment_id;
    self.next_comment_id += 1;
    id
  }

  pub fn create_comment(&mut self, comment: Comment) -> Result<&Comment, StoreError> {
    let key = (comment.author.clone(), comment.permlink.clone());
    if self.comments.contains(&key) {
      return Err(StoreError::AlreadyExists { kind: "comment", key: format!("{key:?}") });
    }
    Ok(self.comments.insert(key, comment))
  }

  pub fn find_comment(&self, author: &AccountName, permlink: &str) -> Option<&Comment> {
    self.comments.get(&(author.clone(), permlink.to_string()))
  }

  pub fn modify_comment(
    &mut self,
    author: &AccountName,
    permlink: &str,
    f: impl FnOnce(&mut Comment),
  ) -> Result<(), StoreError> {
    let key = (author.clone(), permlink.to_string());
    self
      .comments
      .modify(&key, f)
      .ok_or_else(|| StoreError::NotFound { kind: "comment", key: format!("{key:?}") })
  }

  pub fn comments_pending_cashout(&self) -> Vec<(&(AccountName, String), &Comment)> {
    self.comments.iter().filter(|(_, c)| !c.is_paid_out && c.cashout_time.is_some()).collect()
  }

  // -- content reward fund -------------------------------------------------

  pub fn content_reward_pool(&self) -> u64 {
    self.content_reward_pool
  }

  pub fn last_reward_fund_accrual(&self) -> ChainTime {
    self.last_reward_fund_accrual
  }

  pub fn add_to_content_reward_pool(&mut self, amount: u64, now: ChainTime) {
    self.content_reward_pool = self.content_reward_pool.saturating_add(amount);
    self.last_reward_fund_accrual = now;
  }

  /// Drains up to `amount` from the pool, returning what was actually
  /// available (never overdraws, §3.2).
  pub fn take_from_content_reward_pool(&mut self, amount: u64) -> u64 {
    let taken = amount.min(self.content_reward_pool);
    self.content_reward_pool -= taken;
    taken
  }

  // -- producers -----------------------------------------------------------

  pub fn alloc_producer_id(&mut self) -> ProducerId {
    let id = ProducerId(self.next_producer_id);
    self.next_producer_id += 1;
    id
  }

  pub fn create_producer(&mut self, producer: Producer) -> Result<&Producer, StoreError> {
    let key = producer.owner.clone();
    if self.producers.contains(&key) {
      return Err(StoreError::AlreadyExists { kind: "producer", key: key.to_string() });
    }
    Ok(self.producers.insert(key, producer))
  }

  pub fn find_producer(&self, owner: &AccountName) -> Option<&Producer> {
    self.producers.get(owner)
  }

  pub fn modify_producer(
    &mut self,
    owner: &AccountName,
    f: impl FnOnce(&mut Producer),
  ) -> Result<(), StoreError> {
    self
      .producers
      .modify(owner, f)
      .ok_or_else(|| StoreError::NotFound { kind: "producer", key: owner.to_string() })
  }

  pub fn all_producers(&self) -> impl DoubleEndedIterator<Item = (&AccountName, &Producer)> {
    self.producers.iter()
  }

  /// Median across the active producer set's voted `props` (GLOSSARY
  /// "Median chain properties"). Falls back to the genesis defaults when
  /// no producer has voted yet (bootstrapping).
  pub fn median_props(&self) -> MedianChainProperties {
    let mut votes: Vec<&MedianChainProperties> =
      self.producer_schedule.slots.iter().filter_map(|n| self.producers.get(n)).map(|p| &p.props).collect();
    if votes.is_empty() {
      return self.chain_spec.median_props.clone();
    }
    let median_u64 = |mut xs: Vec<u64>| -> u64 {
      xs.sort_unstable();
      xs[xs.len() / 2]
    };
    votes.sort_by_key(|p| p.credit_open_ratio);
    MedianChainProperties {
      credit_open_ratio: median_u64(votes.iter().map(|p| p.credit_open_ratio).collect()),
      credit_liquidation_ratio: median_u64(votes.iter().map(|p| p.credit_liquidation_ratio).collect()),
      margin_open_ratio: median_u64(votes.iter().map(|p| p.margin_open_ratio).collect()),
      credit_min_interest: median_u64(votes.iter().map(|p| p.credit_min_interest).collect()),
      credit_variable_interest: median_u64(votes.iter().map(|p| p.credit_variable_interest).collect()),
      bitasset_mcr: median_u64(votes.iter().map(|p| p.bitasset_mcr).collect()),
      liquidity_pool_fee: median_u64(votes.iter().map(|p| p.liquidity_pool_fee).collect()),
      vote_curation_decay: median_u64(votes.iter().map(|p| p.vote_curation_decay).collect()),
      view_curation_decay: median_u64(votes.iter().map(|p| p.view_curation_decay).collect()),
      share_curation_decay: median_u64(votes.iter().map(|p| p.share_curation_decay).collect()),
      comment_curation_decay: median_u64(votes.iter().map(|p| p.comment_curation_decay).collect()),
      content_reward_fund_per_day: median_u64(votes.iter().map(|p| p.content_reward_fund_per_day).collect()),
      account_creation_fee: median_u64(votes.iter().map(|p| p.account_creation_fee).collect()),
    }
  }

  // -- escrow / recovery / savings / delegation -----------------------------------------------------------

  pub fn alloc_escrow_id(&mut self) -> EscrowId {
    let id = EscrowId(self.next_escrow_id);
    self.next_escrow_id += 1;
    id
  }

  pub fn create_escrow(&mut self, escrow: Escrow) -> &Escrow {
    self.escrows.insert(escrow.id, escrow)
  }

  pub fn find_escrow(&self, id: EscrowId) -> Option<&Escrow> {
    self.escrows.get(&id)
  }

  pub fn modify_escrow(&mut self, id: EscrowId, f: impl FnOnce(&mut Escrow)) {
    self.escrows.modify(&id, f);
  }

  pub fn remove_escrow(&mut self, id: EscrowId) -> Option<Escrow> {
    self.escrows.remove(&id)
  }

  pub fn create_recovery_request(&mut self, req: RecoveryRequest) {
    self.recovery_requests.insert(req.account_to_recover.clone(), req);
  }

  pub fn find_recovery_request(&self, account: &AccountName) -> Option<&RecoveryRequest> {
    self.recovery_requests.get(account)
  }

  pub fn remove_recovery_request(&mut self, account: &AccountName) -> Option<RecoveryRequest> {
    self.recovery_requests.remove(account)
  }

  pub fn alloc_savings_withdraw_id(&mut self) -> SavingsWithdrawId {
    let id = SavingsWithdrawId(self.next_savings_withdraw_id);
    self.next_savings_withdraw_id += 1;
    id
  }

  pub fn create_savings_withdraw(&mut self, w: SavingsWithdraw) {
    self.savings_withdraws.insert(w.id, w);
  }

  pub fn remove_savings_withdraw(&mut self, id: SavingsWithdrawId) -> Option<SavingsWithdraw> {
    self.savings_withdraws.remove(&id)
  }

  pub fn due_savings_withdraws(&self, now: ChainTime) -> Vec<(&SavingsWithdrawId, &SavingsWithdraw)> {
    self.savings_withdraws.iter().filter(|(_, w)| w.complete.is_past(now)).collect()
  }

  pub fn create_asset_delegation(&mut self, d: AssetDelegation) {
    let key = (d.delegator.clone(), d.delegatee.clone(), d.amount.symbol.clone());
    self.asset_delegations.insert(key, d);
  }

  pub fn find_asset_delegation(
    &self,
    delegator: &AccountName,
    delegatee: &AccountName,
    symbol: &AssetSymbol,
  ) -> Option<&AssetDelegation> {
    self.asset_delegations.get(&(delegator.clone(), delegatee.clone(), symbol.clone()))
  }

  pub fn modify_asset_delegation(
    &mut self,
    delegator: &AccountName,
    delegatee: &AccountName,
    symbol: &AssetSymbol,
    f: impl FnOnce(&mut AssetDelegation),
  ) {
    self.asset_delegations.modify(&(delegator.clone(), delegatee.clone(), symbol.clone()), f);
  }

  pub fn remove_asset_delegation(
    &mut self,
    delegator: &AccountName,
    delegatee: &AccountName,
    symbol: &AssetSymbol,
  ) -> Option<AssetDelegation> {
    self.asset_delegations.remove(&(delegator.clone(), delegatee.clone(), symbol.clone()))
  }

  pub fn alloc_delegation_expiration_id(&mut self) -> AssetDelegationExpirationId {
    let id = AssetDelegationExpirationId(self.next_delegation_expiration_id);
    self.next_delegation_expiration_id += 1;
    id
  }

  pub fn create_delegation_expiration(&mut self, e: AssetDelegationExpiration) {
    self.delegation_expirations.insert(e.id, e);
  }

  pub fn remove_delegation_expiration(
    &mut self,
    id: AssetDelegationExpirationId,
  ) -> Option<AssetDelegationExpiration> {
    self.delegation_expirations.remove(&id)
  }

  pub fn due_delegation_expirations(
    &self,
    now: ChainTime,
  ) -> Vec<(&AssetDelegationExpirationId, &AssetDelegationExpiration)> {
    self.delegation_expirations.iter().filter(|(_, e)| e.expiration.is_past(now)).collect()
  }

  // -- collateral bids -----------------------------------------------------------

  pub fn alloc_collateral_bid_id(&mut self) -> CollateralBidId {
    let id = CollateralBidId(self.next_collateral_bid_id);
    self.next_collateral_bid_id += 1;
    id
  }

  pub fn create_collateral_bid(&mut self, symbol: AssetSymbol, bid: CollateralBid) {
    self.collateral_bids.insert((symbol, bid.id), bid);
  }

  pub fn collateral_bids_for_asset(&self, symbol: &AssetSymbol) -> Vec<(&CollateralBidId, &CollateralBid)> {
    let lo = (symbol.clone(), CollateralBidId(0));
    let hi = (symbol.clone(), CollateralBidId(u64::MAX));
    self.collateral_bids.range(lo..=hi).map(|((_, id), bid)| (id, bid)).collect()
  }

  pub fn clear_collateral_bids_for_asset(&mut self, symbol: &AssetSymbol) {
    let ids: Vec<_> = self.collateral_bids_for_asset(symbol).into_iter().map(|(id, _)| *id).collect();
    for id in ids {
      self.collateral_bids.remove(&(symbol.clone(), id));
    }
  }

  // -- follows / witness votes -----------------------------------------------------------

  pub fn is_following(&self, follower: &AccountName, followed: &AccountName) -> bool {
    self.follows.contains(&(follower.clone(), followed.clone()))
  }

  pub fn create_follow(&mut self, follower: &AccountName, followed: &AccountName) {
    self.follows.insert((follower.clone(), followed.clone()), ());
  }

  pub fn remove_follow(&mut self, follower: &AccountName, followed: &AccountName) -> Option<()> {
    self.follows.remove(&(follower.clone(), followed.clone()))
  }

  pub fn find_witness_vote(&self, voter: &AccountName, witness: &AccountName) -> Option<u64> {
    self.witness_votes.get(&(voter.clone(), witness.clone())).copied()
  }

  pub fn set_witness_vote(&mut self, voter: &AccountName, witness: &AccountName, weight: u64) {
    let key = (voter.clone(), witness.clone());
    if self.witness_votes.contains(&key) {
      self.witness_votes.modify(&key, |w| *w = weight);
    } else {
      self.witness_votes.insert(key, weight);
    }
  }

  pub fn remove_witness_vote(&mut self, voter: &AccountName, witness: &AccountName) -> Option<u64> {
    self.witness_votes.remove(&(voter.clone(), witness.clone()))
  }

  // -- communities -----------------------------------------------------------

  pub fn create_community(&mut self, community: Community) -> Result<&Community, StoreError> {
    let name = community.name.clone();
    if self.communities.contains(&name) {
      return Err(StoreError::AlreadyExists { kind: "community", key: name });
    }
    Ok(self.communities.insert(name, community))
  }

  pub fn find_community(&self, name: &str) -> Option<&Community> {
    self.communities.get(&name.to_string())
  }

  pub fn modify_community(&mut self, name: &str, f: impl FnOnce(&mut Community)) -> Result<(), StoreError> {
    self
      .communities
      .modify(&name.to_string(), f)
      .ok_or_else(|| StoreError::NotFound { kind: "community", key: name.to_string() })
  }

  pub fn is_subscribed(&self, account: &AccountName, community: &str) -> bool {
    self.community_subscriptions.contains(&(account.clone(), community.to_string()))
  }

  pub fn create_community_subscription(&mut self, account: &AccountName, community: &str) {
    self.community_subscriptions.insert((account.clone(), community.to_string()), ());
  }

  pub fn remove_community_subscription(&mut self, account: &AccountName, community: &str) -> Option<()> {
    self.community_subscriptions.remove(&(account.clone(), community.to_string()))
  }

  // -- network officer votes -----------------------------------------------------------

  pub fn is_voting_for_officer(&self, voter: &AccountName, officer: &AccountName) -> bool {
    self.network_officer_votes.contains(&(voter.clone(), officer.clone()))
  }

  pub fn create_network_officer_vote(&mut self, voter: &AccountName, officer: &AccountName) {
    self.network_officer_votes.insert((voter.clone(), officer.clone()), ());
  }

  pub fn remove_network_officer_vote(&mut self, voter: &AccountName, officer: &AccountName) -> Option<()> {
    self.network_officer_votes.remove(&(voter.clone(), officer.clone()))
  }

  // -- misc helpers -----------------------------------------------------------

  /// Asset symbols whose dynamic data is out of balance (§8 Universal
  /// Invariant 1), used by tests and by the block-boundary consistency
  /// check. Empty in correct operation.
  pub fn unbalanced_assets(&self) -> Vec<AssetSymbol> {
    self
      .asset_dynamic
      .iter()
      .filter(|(_, d)| !d.is_balanced())
      .map(|(s, _)| s.clone())
      .collect()
  }
}

/// Grouping used by range queries that need "every balance this account
/// holds" without scanning the whole table; exposed for evaluators that
/// enumerate an account's portfolio (e.g. reward-claim dividend routing).
pub fn balances_by_account(store: &Store, owner: &AccountName) -> BTreeMap<AssetSymbol, Balance> {
  store
    .balances_for_account(owner)
    .map(|((_, symbol), balance)| (symbol.clone(), balance.clone()))
    .collect()
}
