//! AMM liquidity pool, credit pool, and prediction pool evaluators (§3.5,
//! §4.6/§4.7/§4.10.1 taxonomy row "Pools"). Each pool kind parks the
//! reserves it is currently not lending or trading out in the relevant
//! asset's `pending_supply` accumulator, mirroring the order-book park/
//! unpark convention in `trading.rs`.

use common::{ChainTime, RingBuffer};

use crate::amount::{mul_div_u128, Amount};
use crate::balance_engine::{self, SubBalance};
use crate::config;
use crate::error::{KernelError, KernelResult};
use crate::ids::{AccountName, AssetSymbol, CreditCollateralId, CreditLoanId, CreditPoolId, PredictionPoolId};
use crate::objects::{Asset, AssetDynamicData, AssetKind, AssetPermissions, CreditLoan, CreditPool, LiquidityPool, PredictionPool};
use crate::store::Store;
use crate::virtual_op::VirtualOp;

// -- shared helpers -----------------------------------------------------------

/// Values `amount` (in `amount.symbol`) in terms of `target`, through the
/// pair's AMM hour median (§4.6 "Price oracle"; §4.7.1 collateral pricing).
/// `target == amount.symbol` is the identity case (1:1).
pub(crate) fn value_in(store: &Store, amount: &Amount, target: &AssetSymbol) -> KernelResult<u64> {
  let units = amount.value.max(0) as u64;
  if amount.symbol == *target {
    return Ok(units);
  }
  let pool = store
    .find_liquidity_pool(&amount.symbol, target)
    .ok_or_else(|| KernelError::not_found("liquidity_pool", format!("{}/{}", amount.symbol, target)))?;
  // hour_median_num/den is the price of symbol_a in terms of symbol_b; flip
  // the ratio when `amount.symbol` is the pool's `b` side.
  if pool.symbol_a == amount.symbol {
    mul_div_u128(units, pool.hour_median_num.max(1), pool.hour_median_den.max(1))
  } else {
    mul_div_u128(units, pool.hour_median_den.max(1), pool.hour_median_num.max(1))
  }
}

/// `credit_check` (§4.7.1 helper): true iff the given collateral, priced
/// through the pair's AMM hour-median, covers `debt` at least `open_ratio`.
fn credit_check(store: &Store, debt: &Amount, collateral: &Amount, open_ratio: u64) -> KernelResult<bool> {
  if debt.value <= 0 {
    return Ok(true);
  }
  let collateral_value = value_in(store, collateral, &debt.symbol)?;
  let ratio = (collateral_value as u128 * config::PERCENT_100 as u128 / debt.value.max(1) as u128) as u64;
  Ok(ratio >= open_ratio)
}

fn park(store: &mut Store, owner: &AccountName, amount: &Amount) -> KernelResult<()> {
  balance_engine::adjust_balance(store, owner, &amount.symbol, SubBalance::Liquid, -amount.value)?;
  store.modify_dynamic(&amount.symbol, |d| d.pending_supply = d.pending_supply.saturating_add(amount.value as u64))?;
  Ok(())
}

fn unpark(store: &mut Store, owner: &AccountName, symbol: &AssetSymbol, value: u64) -> KernelResult<()> {
  store.modify_dynamic(symbol, |d| d.pending_supply = d.pending_supply.saturating_sub(value))?;
  balance_engine::adjust_balance(store, owner, symbol, SubBalance::Liquid, value as i128)?;
  Ok(())
}

// -- liquidity pools -----------------------------------------------------------

#[allow(clippy::too_many_arguments)]
pub fn liquidity_pool_create(
  store: &mut Store,
  creator: &AccountName,
  symbol_a: &AssetSymbol,
  symbol_b: &AssetSymbol,
  amount_a: u64,
  amount_b: u64,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(creator)?;
  if symbol_a == symbol_b {
    return Err(KernelError::precondition("a pool requires two distinct assets"));
  }
  if amount_a == 0 || amount_b == 0 {
    return Err(KernelError::precondition("initial pool funding must be nonzero on both sides"));
  }
  let asset_a = store.get_asset(symbol_a)?;
  if !asset_a.is_liquid_enabled() {
    return Err(KernelError::precondition(format!("{symbol_a} is not liquid-enabled")));
  }
  let asset_b = store.get_asset(symbol_b)?;
  if !asset_b.is_liquid_enabled() {
    return Err(KernelError::precondition(format!("{symbol_b} is not liquid-enabled")));
  }
  if store.find_liquidity_pool(symbol_a, symbol_b).is_some() {
    return Err(KernelError::precondition("a pool for this pair already exists"));
  }

  let (lo, hi) = if symbol_a.as_str() <= symbol_b.as_str() {
    (symbol_a.clone(), symbol_b.clone())
  } else {
    (symbol_b.clone(), symbol_a.clone())
  };
  let (balance_a, balance_b) = if lo == *symbol_a { (amount_a, amount_b) } else { (amount_b, amount_a) };

  let share_symbol = AssetSymbol::liquidity_pool_symbol(&lo, &hi);
  if store.find_asset(&share_symbol).is_some() {
    return Err(KernelError::precondition(format!("{share_symbol} already exists")));
  }
  let share_id = store.alloc_asset_id();
  store.create_asset(
    Asset {
      id: share_id,
      symbol: share_symbol.clone(),
      kind: AssetKind::LiquidityPool,
      issuer: None,
      max_supply: u64::MAX,
      stake_intervals: 1,
      unstake_intervals: 1,
      market_fee_percent: 0,
      permissions: AssetPermissions::LIQUID_ENABLED,
      flags: AssetPermissions::LIQUID_ENABLED,
      created: now,
    },
    AssetDynamicData::default(),
  )?;

  balance_engine::adjust_balance(store, creator, &lo, SubBalance::Liquid, -(balance_a as i128))?;
  balance_engine::adjust_balance(store, creator, &hi, SubBalance::Liquid, -(balance_b as i128))?;
  store.modify_dynamic(&lo, |d| d.pending_supply = d.pending_supply.saturating_add(balance_a))?;
  store.modify_dynamic(&hi, |d| d.pending_supply = d.pending_supply.saturating_add(balance_b))?;

  let shares = balance_a.max(balance_b);
  let id = store.alloc_liquidity_pool_id();
  let mut pool = LiquidityPool {
    id,
    symbol_a: lo,
    symbol_b: hi,
    balance_a,
    balance_b,
    share_asset: share_symbol.clone(),
    share_supply: shares,
    fee_basis_points: store.median_props().liquidity_pool_fee,
    hour_history: RingBuffer::new(config::HOUR_PRICE_SAMPLES),
    day_history: RingBuffer::new(config::DAY_PRICE_SAMPLES),
    hour_median_num: 0,
    hour_median_den: 0,
    day_median_num: 0,
    day_median_den: 0,
    created: now,
  };
  pool.record_sample(now);
  store.create_liquidity_pool(pool)?;
  balance_engine::mint_liquid(store, creator, &share_symbol, shares)?;
  Ok(Vec::new())
}

pub fn liquidity_pool_exchange(
  store: &mut Store,
  trader: &AccountName,
  pool_a: &AssetSymbol,
  pool_b: &AssetSymbol,
  amount_in: &Amount,
  limit_price: Option<(u64, u64)>,
  interface: Option<&AccountName>,
  _now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(trader)?;
  if let Some(account) = interface {
    store.get_account(account)?;
  }
  crate::matching::validate_nonzero(amount_in, "amount_in")?;
  let pool = store
    .find_liquidity_pool(pool_a, pool_b)
    .cloned()
    .ok_or_else(|| KernelError::not_found("liquidity_pool", format!("{pool_a}/{pool_b}")))?;

  let (input_reserve, output_reserve, output_symbol) = if amount_in.symbol == pool.symbol_a {
    (pool.balance_a, pool.balance_b, pool.symbol_b.clone())
  } else if amount_in.symbol == pool.symbol_b {
    (pool.balance_b, pool.balance_a, pool.symbol_a.clone())
  } else {
    return Err(KernelError::precondition(format!("{} is not in this pool", amount_in.symbol)));
  };

  let amount_in_units = amount_in.value.max(0) as u64;
  let gross_out = mul_div_u128(output_reserve, amount_in_units, input_reserve.saturating_add(amount_in_units))?;
  let fee = mul_div_u128(gross_out, pool.fee_basis_points, config::PERCENT_100)?;
  let net_out = gross_out.saturating_sub(fee);
  if net_out == 0 {
    return Err(KernelError::precondition("exchange would produce zero output"));
  }

  if let Some((limit_num, limit_den)) = limit_price {
    // Realized price of the input asset in terms of the output asset must
    // not exceed the caller's limit (more output required per input unit
    // than the limit allows is fine; less is a slippage violation).
    let realized = (net_out as u128) * (limit_den.max(1) as u128);
    let bound = (amount_in_units as u128) * (limit_num.max(1) as u128);
    if realized < bound {
      return Err(KernelError::precondition("exchange would cross the limit price"));
    }
  }

  let interface_cut = match interface {
    Some(_) => mul_div_u128(fee, config::POOL_INTERFACE_FEE_SHARE_PERCENT, config::PERCENT_100)?,
    None => 0,
  };
  let burned_fee = fee.saturating_sub(interface_cut);

  balance_engine::adjust_balance(store, trader, &amount_in.symbol, SubBalance::Liquid, -(amount_in_units as i128))?;
  balance_engine::adjust_balance(store, trader, &output_symbol, SubBalance::Liquid, net_out as i128)?;
  if let Some(account) = interface {
    balance_engine::adjust_balance(store, account, &output_symbol, SubBalance::Liquid, interface_cut as i128)?;
  }
  // The traded-in asset grows the pool's reserve (pending_supply); the
  // traded-out asset leaves it. Keeps `AssetDynamicData::is_balanced()`
  // true across the reserve/liquid-balance shift.
  store.modify_dynamic(&amount_in.symbol, |d| d.pending_supply = d.pending_supply.saturating_add(amount_in_units))?;
  store.modify_dynamic(&output_symbol, |d| d.pending_supply = d.pending_supply.saturating_sub(gross_out))?;
  if burned_fee > 0 {
    store.modify_dynamic(&output_symbol, |d| {
      d.total_supply = d.total_supply.saturating_sub(burned_fee);
      d.accumulated_fees = d.accumulated_fees.saturating_add(burned_fee);
    })?;
  }

  store.modify_liquidity_pool(&pool.symbol_a, &pool.symbol_b, |p| {
    if amount_in.symbol == p.symbol_a {
      p.balance_a = p.balance_a.saturating_add(amount_in_units);
      p.balance_b = p.balance_b.saturating_sub(gross_out);
    } else {
      p.balance_b = p.balance_b.saturating_add(amount_in_units);
      p.balance_a = p.balance_a.saturating_sub(gross_out);
    }
  })?;

  Ok(vec![VirtualOp::PoolExchanged {
    trader: trader.clone(),
    pool_a: pool.symbol_a,
    pool_b: pool.symbol_b,
    paid: amount_in.clone(),
    received: Amount::new(net_out as i128, output_symbol),
    fee: Amount::new(fee as i128, amount_in.symbol.clone()),
  }])
}

pub fn liquidity_pool_fund(
  store: &mut Store,
  provider: &AccountName,
  pool_a: &AssetSymbol,
  pool_b: &AssetSymbol,
  amount_a: u64,
  amount_b: u64,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(provider)?;
  if amount_a == 0 || amount_b == 0 {
    return Err(KernelError::precondition("funding both reserves requires nonzero amounts"));
  }
  let pool = store
    .find_liquidity_pool(pool_a, pool_b)
    .cloned()
    .ok_or_else(|| KernelError::not_found("liquidity_pool", format!("{pool_a}/{pool_b}")))?;

  let shares_from_a = mul_div_u128(amount_a, pool.share_supply, pool.balance_a.max(1))?;
  let shares_from_b = mul_div_u128(amount_b, pool.share_supply, pool.balance_b.max(1))?;
  let shares = shares_from_a.min(shares_from_b);
  if shares == 0 {
    return Err(KernelError::precondition("deposit is too small to mint any shares"));
  }

  balance_engine::adjust_balance(store, provider, &pool.symbol_a, SubBalance::Liquid, -(amount_a as i128))?;
  balance_engine::adjust_balance(store, provider, &pool.symbol_b, SubBalance::Liquid, -(amount_b as i128))?;
  store.modify_dynamic(&pool.symbol_a, |d| d.pending_supply = d.pending_supply.saturating_add(amount_a))?;
  store.modify_dynamic(&pool.symbol_b, |d| d.pending_supply = d.pending_supply.saturating_add(amount_b))?;
  store.modify_liquidity_pool(&pool.symbol_a, &pool.symbol_b, |p| {
    p.balance_a = p.balance_a.saturating_add(amount_a);
    p.balance_b = p.balance_b.saturating_add(amount_b);
    p.share_supply = p.share_supply.saturating_add(shares);
  })?;
  balance_engine::mint_liquid(store, provider, &pool.share_asset, shares)?;
  Ok(Vec::new())
}

pub fn liquidity_pool_withdraw(
  store: &mut Store,
  provider: &AccountName,
  pool_a: &AssetSymbol,
  pool_b: &AssetSymbol,
  shares: u64,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(provider)?;
  if shares == 0 {
    return Err(KernelError::precondition("withdrawal requires a nonzero share amount"));
  }
  let pool = store
    .find_liquidity_pool(pool_a, pool_b)
    .cloned()
    .ok_or_else(|| KernelError::not_found("liquidity_pool", format!("{pool_a}/{pool_b}")))?;
  if shares > pool.share_supply {
    return Err(KernelError::precondition("cannot withdraw more shares than exist"));
  }

  let out_a = mul_div_u128(shares, pool.balance_a, pool.share_supply.max(1))?;
  let out_b = mul_div_u128(shares, pool.balance_b, pool.share_supply.max(1))?;
  if out_a == 0 || out_b == 0 {
    return Err(KernelError::precondition("withdrawal would return zero of a reserve"));
  }
  if pool.balance_a <= out_a || pool.balance_b <= out_b {
    return Err(KernelError::precondition("a pool reserve may never be fully drained"));
  }

  balance_engine::burn_liquid(store, provider, &pool.share_asset, shares)?;
  store.modify_liquidity_pool(&pool.symbol_a, &pool.symbol_b, |p| {
    p.balance_a -= out_a;
    p.balance_b -= out_b;
    p.share_supply -= shares;
  })?;
  store.modify_dynamic(&pool.symbol_a, |d| d.pending_supply = d.pending_supply.saturating_sub(out_a))?;
  store.modify_dynamic(&pool.symbol_b, |d| d.pending_supply = d.pending_supply.saturating_sub(out_b))?;
  balance_engine::adjust_balance(store, provider, &pool.symbol_a, SubBalance::Liquid, out_a as i128)?;
  balance_engine::adjust_balance(store, provider, &pool.symbol_b, SubBalance::Liquid, out_b as i128)?;
  Ok(Vec::new())
}

// -- credit pools -----------------------------------------------------------

pub fn credit_pool_collateral(
  store: &mut Store,
  owner: &AccountName,
  symbol: &AssetSymbol,
  amount: u64,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(owner)?;
  let old = store.find_credit_collateral(owner, symbol).map(|c| c.collateral.value.max(0) as u64).unwrap_or(0);
  let delta = amount as i128 - old as i128;
  if delta == 0 {
    return Ok(Vec::new());
  }

  if delta > 0 {
    let mut pledge = delta as u64;
    let native = store.chain_spec.native_symbol.clone();
    if *symbol == native {
      let account = store.get_account(owner)?.clone();
      if account.loan_default_balance > 0 {
        let paydown = account.loan_default_balance.min(pledge);
        store.modify_account(owner, |a| a.loan_default_balance = a.loan_default_balance.saturating_sub(paydown))?;
        pledge -= paydown;
        balance_engine::adjust_balance(store, owner, symbol, SubBalance::Liquid, -(paydown as i128))?;
      }
    }
    if pledge > 0 {
      park(store, owner, &Amount::new(pledge as i128, symbol.clone()))?;
      store.credit_collateral_mut(owner, symbol, CreditCollateralId(0), |c| c.collateral.value += pledge as i128);
    }
  } else {
    let give_back = (-delta) as u64;
    unpark(store, owner, symbol, give_back)?;
    store.credit_collateral_mut(owner, symbol, CreditCollateralId(0), |c| c.collateral.value -= give_back as i128);
  }

  if amount == 0 {
    store.remove_credit_collateral(owner, symbol);
  }
  Ok(Vec::new())
}

fn pledged_collateral(store: &Store, owner: &AccountName, symbol: &AssetSymbol) -> u64 {
  store.find_credit_collateral(owner, symbol).map(|c| c.collateral.value.max(0) as u64).unwrap_or(0)
}

/// Accrues interest on `loan` at `pool`'s current rate and folds it into
/// both the loan's debt and the pool's `borrowed_balance`, resetting
/// `last_interest_time` (§4.7.1 "Adjust"/"Close" shared first step).
fn accrue(store: &mut Store, loan_id: CreditLoanId, debt_symbol: &AssetSymbol, pool: &CreditPool, now: ChainTime) -> KernelResult<(CreditLoan, Option<VirtualOp>)> {
  let loan = store.find_credit_loan(loan_id).cloned().expect("loan exists");
  let interest = loan.accrued_interest(now, pool.interest_rate());
  if interest == 0 {
    return Ok((loan, None));
  }
  let network_fee = mul_div_u128(interest, config::INTEREST_FEE_PERCENT, config::PERCENT_100)?;
  store.modify_credit_loan(loan_id, |l| {
    l.debt.value += interest as i128;
    l.last_interest_time = now;
  });
  store.modify_credit_pool(debt_symbol, |p| p.borrowed_balance = p.borrowed_balance.saturating_add(interest))?;
  let op = VirtualOp::LoanInterestAccrued {
    owner: loan.owner.clone(),
    loan_id,
    interest: Amount::new(interest as i128, debt_symbol.clone()),
    network_fee: Amount::new(network_fee as i128, debt_symbol.clone()),
  };
  let loan = store.find_credit_loan(loan_id).cloned().expect("just modified");
  Ok((loan, Some(op)))
}

#[allow(clippy::too_many_arguments)]
pub fn credit_pool_borrow(
  store: &mut Store,
  owner: &AccountName,
  loan_id: CreditLoanId,
  debt_symbol: &AssetSymbol,
  amount: u64,
  collateral_symbol: &AssetSymbol,
  collateral: u64,
  is_flash: bool,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(owner)?;
  let open_ratio = store.median_props().credit_open_ratio;
  let liquidation_ratio = store.median_props().credit_liquidation_ratio;

  match store.find_credit_loan(loan_id).cloned() {
    None => open_loan(store, owner, loan_id, debt_symbol, amount, collateral_symbol, collateral, is_flash, open_ratio, liquidation_ratio, now),
    Some(loan) => {
      if loan.owner != *owner {
        return Err(KernelError::unauthorized("only the loan's owner may adjust or close it"));
      }
      if loan.debt.symbol != *debt_symbol || loan.collateral.symbol != *collateral_symbol {
        return Err(KernelError::precondition("debt/collateral asset mismatch for this loan id"));
      }
      if amount == 0 && collateral == 0 {
        close_loan(store, owner, loan_id, loan, debt_symbol, now)
      } else if amount == 0 || collateral == 0 {
        Err(KernelError::precondition("closing a loan requires zeroing both amount and collateral"))
      } else if loan.is_flash {
        Err(KernelError::precondition("flash loans can only be opened and closed, never adjusted"))
      } else {
        adjust_loan(store, owner, loan_id, loan, debt_symbol, amount, collateral_symbol, collateral, open_ratio, liquidation_ratio, now)
      }
    }
  }
}

#[allow(clippy::too_many_arguments)]
fn open_loan(
  store: &mut Store,
  owner: &AccountName,
  loan_id: CreditLoanId,
  debt_symbol: &AssetSymbol,
  amount: u64,
  collateral_symbol: &AssetSymbol,
  collateral: u64,
  is_flash: bool,
  open_ratio: u64,
  liquidation_ratio: u64,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  let account = store.get_account(owner)?.clone();
  if account.loan_default_balance > 0 {
    return Err(KernelError::precondition("cannot open a new loan while a default balance is outstanding"));
  }
  if is_flash && collateral != 0 {
    return Err(KernelError::precondition("flash loans cannot pledge collateral"));
  }
  if !is_flash && (collateral == 0 || amount == 0) {
    return Err(KernelError::precondition("a non-flash loan requires nonzero collateral and debt"));
  }
  if amount == 0 && is_flash {
    return Err(KernelError::precondition("a flash loan requires a nonzero debt amount"));
  }

  let pool = store.get_credit_pool(debt_symbol)?.clone();
  if pool.base_balance < amount {
    return Err(KernelError::precondition("credit pool lacks sufficient base balance"));
  }

  let (liq_num, liq_den) = if is_flash {
    (1, 1)
  } else {
    let debt = Amount::new(amount as i128, debt_symbol.clone());
    let pledged = Amount::new(collateral as i128, collateral_symbol.clone());
    if !credit_check(store, &debt, &pledged, open_ratio)? {
      return Err(KernelError::precondition("pledged collateral is below the required open ratio"));
    }
    let value = value_in(store, &pledged, debt_symbol)?;
    let max_debt = mul_div_u128(value, config::PERCENT_100, liquidation_ratio.max(1))?;
    (collateral, max_debt.max(1))
  };

  if !is_flash {
    let held = pledged_collateral(store, owner, collateral_symbol);
    if held < collateral {
      return Err(KernelError::precondition("insufficient pledged collateral for this loan"));
    }
    store.credit_collateral_mut(owner, collateral_symbol, CreditCollateralId(0), |c| c.collateral.value -= collateral as i128);
  }

  store.modify_credit_pool(debt_symbol, |p| {
    p.base_balance = p.base_balance.saturating_sub(amount);
    p.borrowed_balance = p.borrowed_balance.saturating_add(amount);
  })?;
  unpark(store, owner, debt_symbol, amount)?;

  store.create_credit_loan(CreditLoan {
    id: loan_id,
    owner: owner.clone(),
    debt: Amount::new(amount as i128, debt_symbol.clone()),
    collateral: Amount::new(collateral as i128, collateral_symbol.clone()),
    is_flash,
    liquidation_price_num: liq_num,
    liquidation_price_den: liq_den,
    last_interest_time: now,
    created: now,
  });
  Ok(Vec::new())
}

#[allow(clippy::too_many_arguments)]
fn adjust_loan(
  store: &mut Store,
  owner: &AccountName,
  loan_id: CreditLoanId,
  loan: CreditLoan,
  debt_symbol: &AssetSymbol,
  amount: u64,
  collateral_symbol: &AssetSymbol,
  collateral: u64,
  open_ratio: u64,
  liquidation_ratio: u64,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  let pool = store.get_credit_pool(debt_symbol)?.clone();
  let (loan, accrual_op) = accrue(store, loan_id, debt_symbol, &pool, now)?;
  let pool = store.get_credit_pool(debt_symbol)?.clone();

  let old_debt = loan.debt.value.max(0) as u64;
  let old_collateral = loan.collateral.value.max(0) as u64;
  let debt_delta = amount as i128 - old_debt as i128;
  let collateral_delta = collateral as i128 - old_collateral as i128;

  let new_debt = Amount::new(amount as i128, debt_symbol.clone());
  let new_collateral = Amount::new(collateral as i128, collateral_symbol.clone());
  if !credit_check(store, &new_debt, &new_collateral, open_ratio)? {
    return Err(KernelError::precondition("adjusted position would fall below the required open ratio"));
  }
  if debt_delta > 0 && pool.base_balance < debt_delta as u64 {
    return Err(KernelError::precondition("credit pool lacks sufficient base balance for this increase"));
  }
  if collateral_delta > 0 {
    let held = pledged_collateral(store, owner, collateral_symbol);
    if held < collateral_delta as u64 {
      return Err(KernelError::precondition("insufficient pledged collateral for this increase"));
    }
  }

  store.modify_credit_pool(debt_symbol, |p| {
    if debt_delta >= 0 {
      p.base_balance = p.base_balance.saturating_sub(debt_delta as u64);
      p.borrowed_balance = p.borrowed_balance.saturating_add(debt_delta as u64);
    } else {
      let d = (-debt_delta) as u64;
      p.borrowed_balance = p.borrowed_balance.saturating_sub(d);
      p.base_balance = p.base_balance.saturating_add(d);
    }
  })?;
  if debt_delta > 0 {
    unpark(store, owner, debt_symbol, debt_delta as u64)?;
  } else if debt_delta < 0 {
    park(store, owner, &Amount::new(-debt_delta, debt_symbol.clone()))?;
  }

  if collateral_delta > 0 {
    let pledge = collateral_delta as u64;
    store.credit_collateral_mut(owner, collateral_symbol, CreditCollateralId(0), |c| c.collateral.value -= pledge as i128);
  } else if collateral_delta < 0 {
    let give_back = (-collateral_delta) as u64;
    store.credit_collateral_mut(owner, collateral_symbol, CreditCollateralId(0), |c| c.collateral.value += give_back as i128);
  }

  let value = value_in(store, &new_collateral, debt_symbol)?;
  let max_debt = mul_div_u128(value, config::PERCENT_100, liquidation_ratio.max(1))?;

  store.modify_credit_loan(loan_id, |l| {
    l.debt.value = amount as i128;
    l.collateral.value = collateral as i128;
    l.last_interest_time = now;
    l.liquidation_price_num = collateral;
    l.liquidation_price_den = max_debt.max(1);
  });

  let mut ops = Vec::new();
  ops.extend(accrual_op);
  Ok(ops)
}

fn close_loan(
  store: &mut Store,
  owner: &AccountName,
  loan_id: CreditLoanId,
  loan: CreditLoan,
  debt_symbol: &AssetSymbol,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  let pool = store.get_credit_pool(debt_symbol)?.clone();
  let (loan, accrual_op) = accrue(store, loan_id, debt_symbol, &pool, now)?;

  let closing_debt = loan.debt.value.max(0) as u64;
  let interest_fees = if let Some(VirtualOp::LoanInterestAccrued { network_fee, .. }) = &accrual_op {
    network_fee.value.max(0) as u64
  } else {
    0
  };
  let net_to_pool = closing_debt.saturating_sub(interest_fees);

  balance_engine::adjust_balance(store, owner, debt_symbol, SubBalance::Liquid, -(closing_debt as i128))?;
  store.modify_dynamic(debt_symbol, |d| {
    d.pending_supply = d.pending_supply.saturating_add(net_to_pool);
    d.total_supply = d.total_supply.saturating_sub(interest_fees);
    d.fee_pool = d.fee_pool.saturating_add(interest_fees);
  })?;
  store.modify_credit_pool(debt_symbol, |p| {
    p.base_balance = p.base_balance.saturating_add(net_to_pool);
    p.borrowed_balance = p.borrowed_balance.saturating_sub(closing_debt);
  })?;

  let collateral_returned = loan.collateral.clone();
  if !loan.is_flash && loan.collateral.value > 0 {
    let symbol = loan.collateral.symbol.clone();
    let value = loan.collateral.value;
    store.credit_collateral_mut(owner, &symbol, CreditCollateralId(0), |c| c.collateral.value += value);
  }
  store.remove_credit_loan(loan_id);

  let mut ops = Vec::new();
  ops.extend(accrual_op);
  ops.push(VirtualOp::LoanClosed { owner: owner.clone(), loan_id, collateral_returned });
  Ok(ops)
}

pub fn credit_pool_lend(store: &mut Store, lender: &AccountName, base_symbol: &AssetSymbol, amount: u64) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(lender)?;
  if amount == 0 {
    return Err(KernelError::precondition("lend amount must be nonzero"));
  }
  let pool = store.get_credit_pool(base_symbol)?.clone();
  let total = pool.base_balance + pool.borrowed_balance;
  let shares = if pool.share_supply == 0 || total == 0 {
    amount
  } else {
    mul_div_u128(amount, pool.share_supply, total)?
  };
  if shares == 0 {
    return Err(KernelError::precondition("deposit is too small to mint any satellite shares"));
  }

  park(store, lender, &Amount::new(amount as i128, base_symbol.clone()))?;
  store.modify_credit_pool(base_symbol, |p| {
    p.base_balance = p.base_balance.saturating_add(amount);
    p.share_supply = p.share_supply.saturating_add(shares);
  })?;
  update_last_price(store, base_symbol)?;
  balance_engine::mint_liquid(store, lender, &pool.share_asset, shares)?;
  Ok(Vec::new())
}

pub fn credit_pool_withdraw(store: &mut Store, lender: &AccountName, base_symbol: &AssetSymbol, shares: u64) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(lender)?;
  if shares == 0 {
    return Err(KernelError::precondition("withdraw amount must be nonzero"));
  }
  let pool = store.get_credit_pool(base_symbol)?.clone();
  if shares > pool.share_supply {
    return Err(KernelError::precondition("cannot withdraw more shares than exist"));
  }
  let total = pool.base_balance + pool.borrowed_balance;
  let redeemed = mul_div_u128(shares, total, pool.share_supply.max(1))?;
  if redeemed == 0 {
    return Err(KernelError::precondition("redemption is too small to return any base asset"));
  }
  if pool.base_balance < redeemed {
    return Err(KernelError::precondition("base balance cannot cover this redemption; funds are on loan"));
  }

  balance_engine::burn_liquid(store, lender, &pool.share_asset, shares)?;
  store.modify_credit_pool(base_symbol, |p| {
    p.base_balance = p.base_balance.saturating_sub(redeemed);
    p.share_supply = p.share_supply.saturating_sub(shares);
  })?;
  update_last_price(store, base_symbol)?;
  unpark(store, lender, base_symbol, redeemed)?;
  Ok(Vec::new())
}

fn update_last_price(store: &mut Store, base_symbol: &AssetSymbol) -> KernelResult<()> {
  let pool = store.get_credit_pool(base_symbol)?.clone();
  let total = pool.base_balance + pool.borrowed_balance;
  let (num, den) = if pool.share_supply == 0 { (1, 1) } else { (total, pool.share_supply) };
  store.modify_credit_pool(base_symbol, |p| {
    p.last_price_num = num;
    p.last_price_den = den.max(1);
  })?;
  Ok(())
}

/// Opens `base_symbol`'s credit pool the first time it's lent against
/// (§3.5, §4.7 "per debt asset"); called by the host alongside
/// `asset::create`, mirroring `liquidity_pool_create`'s implicit share
/// asset registration.
pub fn credit_pool_open(store: &mut Store, base_symbol: &AssetSymbol, now: ChainTime) -> KernelResult<()> {
  store.get_asset(base_symbol)?;
  if store.find_credit_pool(base_symbol).is_some() {
    return Err(KernelError::precondition(format!("a credit pool for {base_symbol} already exists")));
  }
  let share_symbol = AssetSymbol::credit_pool_symbol(base_symbol);
  if store.find_asset(&share_symbol).is_some() {
    return Err(KernelError::precondition(format!("{share_symbol} already exists")));
  }
  let id = store.alloc_asset_id();
  store.create_asset(
    Asset {
      id,
      symbol: share_symbol.clone(),
      kind: AssetKind::CreditPool,
      issuer: None,
      max_supply: u64::MAX,
      stake_intervals: 1,
      unstake_intervals: 1,
      market_fee_percent: 0,
      permissions: AssetPermissions::LIQUID_ENABLED,
      flags: AssetPermissions::LIQUID_ENABLED,
      created: now,
    },
    AssetDynamicData::default(),
  )?;
  let props = store.median_props();
  let id = store.alloc_credit_pool_id();
  store.create_credit_pool(CreditPool {
    id,
    base_asset: base_symbol.clone(),
    share_asset: share_symbol,
    base_balance: 0,
    borrowed_balance: 0,
    share_supply: 0,
    last_price_num: 1,
    last_price_den: 1,
    min_interest_rate: props.credit_min_interest,
    variable_interest_rate: props.credit_variable_interest,
    created: now,
  })?;
  Ok(())
}

// -- prediction pools -----------------------------------------------------------

pub fn prediction_pool_create(
  store: &mut Store,
  creator: &AccountName,
  collateral_symbol: &AssetSymbol,
  outcome_symbols: &[AssetSymbol],
  outcome_time: ChainTime,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(creator)?;
  store.get_asset(collateral_symbol)?;
  if outcome_symbols.len() < 2 {
    return Err(KernelError::precondition("a prediction pool requires at least two outcomes"));
  }

  let id = store.alloc_prediction_pool_id();
  let invalid_asset = AssetSymbol::new(format!("{}{}.INVALID", crate::ids::PREDICTION_ASSET_PREFIX, id.0));

  for symbol in outcome_symbols.iter().chain(std::iter::once(&invalid_asset)) {
    if store.find_asset(symbol).is_some() {
      return Err(KernelError::precondition(format!("{symbol} already exists")));
    }
  }
  for symbol in outcome_symbols.iter().chain(std::iter::once(&invalid_asset)) {
    let asset_id = store.alloc_asset_id();
    store.create_asset(
      Asset {
        id: asset_id,
        symbol: symbol.clone(),
        kind: AssetKind::Prediction,
        issuer: Some(creator.clone()),
        max_supply: u64::MAX,
        stake_intervals: 1,
        unstake_intervals: 1,
        market_fee_percent: 0,
        permissions: AssetPermissions::LIQUID_ENABLED,
        flags: AssetPermissions::LIQUID_ENABLED,
        created: now,
      },
      AssetDynamicData::default(),
    )?;
  }

  let resolution_time = outcome_time.saturating_add_secs(config::PREDICTION_RESOLUTION_DELAY_SECONDS);
  store.create_prediction_pool(PredictionPool {
    id,
    collateral_asset: collateral_symbol.clone(),
    outcome_assets: outcome_symbols.to_vec(),
    invalid_asset,
    collateral_pool: 0,
    bond_pool: 0,
    outcome_time,
    resolution_time,
    staked_votes: Vec::new(),
    resolved_outcome: None,
    created: now,
  });
  Ok(Vec::new())
}

pub fn prediction_pool_exchange(
  store: &mut Store,
  trader: &AccountName,
  pool: PredictionPoolId,
  collateral_amount: u64,
  redeem: bool,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(trader)?;
  if collateral_amount == 0 {
    return Err(KernelError::precondition("exchange amount must be nonzero"));
  }
  let p = store.get_prediction_pool(pool)?.clone();
  let now = store.head_time();

  if p.is_resolved() {
    if !redeem {
      return Err(KernelError::precondition("cannot mint a full set after resolution"));
    }
    let winner = p.resolved_outcome.clone().expect("is_resolved");
    balance_engine::burn_liquid(store, trader, &winner, collateral_amount)?;
    store.modify_prediction_pool(pool, |pp| pp.collateral_pool = pp.collateral_pool.saturating_sub(collateral_amount))?;
    balance_engine::adjust_balance(store, trader, &p.collateral_asset, SubBalance::Liquid, collateral_amount as i128)?;
    return Ok(Vec::new());
  }

  if !redeem {
    if p.outcome_time.is_past(now) {
      return Err(KernelError::precondition("cannot mint a full set after outcome_time"));
    }
    balance_engine::adjust_balance(store, trader, &p.collateral_asset, SubBalance::Liquid, -(collateral_amount as i128))?;
    store.modify_prediction_pool(pool, |pp| pp.collateral_pool = pp.collateral_pool.saturating_add(collateral_amount))?;
    for symbol in p.outcome_assets.iter().chain(std::iter::once(&p.invalid_asset)) {
      balance_engine::mint_liquid(store, trader, symbol, collateral_amount)?;
    }
  } else {
    for symbol in p.outcome_assets.iter().chain(std::iter::once(&p.invalid_asset)) {
      balance_engine::burn_liquid(store, trader, symbol, collateral_amount)?;
    }
    store.modify_prediction_pool(pool, |pp| pp.collateral_pool = pp.collateral_pool.saturating_sub(collateral_amount))?;
    balance_engine::adjust_balance(store, trader, &p.collateral_asset, SubBalance::Liquid, collateral_amount as i128)?;
  }
  Ok(Vec::new())
}

pub fn prediction_pool_resolve(
  store: &mut Store,
  voter: &AccountName,
  pool: PredictionPoolId,
  outcome: &AssetSymbol,
  bond_staked: u64,
  now: ChainTime,
) -> KernelResult<Vec<VirtualOp>> {
  store.get_account(voter)?;
  let p = store.get_prediction_pool(pool)?.clone();
  if p.is_resolved() {
    return Err(KernelError::precondition("prediction pool has already resolved"));
  }
  if !p.outcome_time.is_past(now) {
    return Err(KernelError::precondition("cannot vote on a resolution before outcome_time"));
  }
  if *outcome != p.invalid_asset && !p.outcome_assets.contains(outcome) {
    return Err(KernelError::precondition(format!("{outcome} is not an outcome of this pool")));
  }
  if bond_staked == 0 {
    return Err(KernelError::precondition("a resolution vote requires a nonzero bond stake"));
  }

  balance_engine::adjust_balance(store, voter, &p.collateral_asset, SubBalance::Liquid, -(bond_staked as i128))?;
  store.modify_prediction_pool(pool, |pp| {
    pp.bond_pool = pp.bond_pool.saturating_add(bond_staked);
    match pp.staked_votes.iter_mut().find(|(symbol, _)| symbol == outcome) {
      Some(entry) => entry.1 += bond_staked,
      None => pp.staked_votes.push((outcome.clone(), bond_staked)),
    }
  })?;

  let mut ops = Vec::new();
  let p = store.get_prediction_pool(pool)?.clone();
  if p.resolution_time.is_past(now) {
    if let Some(winner) = p.leading_outcome().cloned() {
      let invalid = winner == p.invalid_asset;
      store.modify_prediction_pool(pool, |pp| pp.resolved_outcome = Some(winner.clone()))?;
      ops.push(VirtualOp::PredictionResolved { pool, outcome: winner, invalid });
    }
  }
  Ok(ops)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ChainSpec;
  use crate::ids::AssetSymbol;
  use crate::objects::AssetDynamicData;

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  fn sym(s: &str) -> AssetSymbol {
    AssetSymbol::new(s)
  }

  fn setup() -> Store {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    for s in ["COIN", "USD"] {
      store.ensure_asset_dynamic(&sym(s));
      let id = store.alloc_asset_id();
      let _ = store.create_asset(
        Asset {
          id,
          symbol: sym(s),
          kind: AssetKind::Standard,
          issuer: None,
          max_supply: u64::MAX,
          stake_intervals: 1,
          unstake_intervals: 1,
          market_fee_percent: 0,
          permissions: AssetPermissions::LIQUID_ENABLED,
          flags: AssetPermissions::LIQUID_ENABLED,
          created: ChainTime::from_unix(0),
        },
        AssetDynamicData::default(),
      );
    }
    store
  }

  fn fund(store: &mut Store, owner: &AccountName, symbol: &AssetSymbol, amount: u64) {
    balance_engine::mint_liquid(store, owner, symbol, amount).unwrap();
  }

  #[test]
  fn liquidity_pool_create_canonicalizes_pair_and_mints_shares() {
    let mut store = setup();
    let alice = name("alice");
    fund(&mut store, &alice, &sym("COIN"), 1_000);
    fund(&mut store, &alice, &sym("USD"), 2_000);
    liquidity_pool_create(&mut store, &alice, &sym("USD"), &sym("COIN"), 2_000, 1_000, ChainTime::from_unix(0)).unwrap();

    let pool = store.find_liquidity_pool(&sym("COIN"), &sym("USD")).unwrap();
    assert_eq!(pool.symbol_a, sym("COIN"));
    assert_eq!(pool.symbol_b, sym("USD"));
    assert_eq!(pool.balance_a, 1_000);
    assert_eq!(pool.balance_b, 2_000);
    assert_eq!(pool.share_supply, 2_000);
    assert_eq!(store.find_balance(&alice, &sym("COIN")).unwrap().liquid, 0);
  }

  #[test]
  fn liquidity_pool_exchange_respects_limit_price() {
    let mut store = setup();
    let alice = name("alice");
    let bob = name("bob");
    fund(&mut store, &alice, &sym("COIN"), 1_000);
    fund(&mut store, &alice, &sym("USD"), 1_000);
    liquidity_pool_create(&mut store, &alice, &sym("COIN"), &sym("USD"), 1_000, 1_000, ChainTime::from_unix(0)).unwrap();

    fund(&mut store, &bob, &sym("COIN"), 100);
    let err = liquidity_pool_exchange(
      &mut store,
      &bob,
      &sym("COIN"),
      &sym("USD"),
      &Amount::new(100, sym("COIN")),
      Some((1, 1_000)), // absurdly tight bound: 1000 USD required per COIN
      None,
      ChainTime::from_unix(0),
    );
    assert!(err.is_err());

    let ok = liquidity_pool_exchange(
      &mut store,
      &bob,
      &sym("COIN"),
      &sym("USD"),
      &Amount::new(100, sym("COIN")),
      None,
      None,
      ChainTime::from_unix(0),
    );
    assert!(ok.is_ok());
    assert!(store.find_balance(&bob, &sym("USD")).unwrap().liquid > 0);
  }

  #[test]
  fn liquidity_pool_withdraw_rejects_full_drain() {
    let mut store = setup();
    let alice = name("alice");
    fund(&mut store, &alice, &sym("COIN"), 1_000);
    fund(&mut store, &alice, &sym("USD"), 1_000);
    liquidity_pool_create(&mut store, &alice, &sym("COIN"), &sym("USD"), 1_000, 1_000, ChainTime::from_unix(0)).unwrap();
    let shares = store.find_liquidity_pool(&sym("COIN"), &sym("USD")).unwrap().share_supply;
    let err = liquidity_pool_withdraw(&mut store, &alice, &sym("COIN"), &sym("USD"), shares);
    assert!(err.is_err());
  }

  #[test]
  fn credit_pool_lend_then_borrow_then_close_roundtrips() {
    let mut store = setup();
    let lender = name("lender");
    let borrower = name("borrower");
    credit_pool_open(&mut store, &sym("COIN"), ChainTime::from_unix(0)).unwrap();
    fund(&mut store, &lender, &sym("COIN"), 10_000);
    credit_pool_lend(&mut store, &lender, &sym("COIN"), 10_000).unwrap();

    fund(&mut store, &borrower, &sym("USD"), 2_000);
    fund(&mut store, &alice_for_pricing(&mut store), &sym("COIN"), 0);
    // seed a COIN/USD pool so collateral can be valued
    fund(&mut store, &borrower, &sym("COIN"), 0);
    let pricer = name("pricer");
    fund(&mut store, &pricer, &sym("COIN"), 10_000);
    fund(&mut store, &pricer, &sym("USD"), 10_000);
    liquidity_pool_create(&mut store, &pricer, &sym("COIN"), &sym("USD"), 10_000, 10_000, ChainTime::from_unix(0)).unwrap();

    credit_pool_collateral(&mut store, &borrower, &sym("USD"), 2_000, ChainTime::from_unix(0)).unwrap();
    credit_pool_borrow(&mut store, &borrower, CreditLoanId(1), &sym("COIN"), 1_000, &sym("USD"), 2_000, false, ChainTime::from_unix(0)).unwrap();
    assert_eq!(store.find_balance(&borrower, &sym("COIN")).unwrap().liquid, 1_000);

    let later = ChainTime::from_unix(common::SECONDS_PER_DAY);
    fund(&mut store, &borrower, &sym("COIN"), 100); // cover accrued interest
    credit_pool_borrow(&mut store, &borrower, CreditLoanId(1), &sym("COIN"), 0, &sym("USD"), 0, false, later).unwrap();
    assert!(store.find_credit_loan(CreditLoanId(1)).is_none());
    assert_eq!(store.find_credit_collateral(&borrower, &sym("USD")).unwrap().collateral.value, 2_000);
  }

  fn alice_for_pricing(_store: &mut Store) -> AccountName {
    name("alice")
  }

  #[test]
  fn prediction_pool_exchange_mints_and_burns_full_sets() {
    let mut store = setup();
    let creator = name("creator");
    let trader = name("trader");
    prediction_pool_create(
      &mut store,
      &creator,
      &sym("COIN"),
      &[sym("PREDICTION.YES"), sym("PREDICTION.NO")],
      ChainTime::from_unix(1_000),
      ChainTime::from_unix(0),
    )
    .unwrap();
    let pool_id = store.all_prediction_pools().next().unwrap().0;

    fund(&mut store, &trader, &sym("COIN"), 500);
    prediction_pool_exchange(&mut store, &trader, *pool_id, 500, false).unwrap();
    assert_eq!(store.find_balance(&trader, &sym("PREDICTION.YES")).unwrap().liquid, 500);
    assert_eq!(store.find_balance(&trader, &sym("COIN")).unwrap().liquid, 0);

    prediction_pool_exchange(&mut store, &trader, *pool_id, 500, true).unwrap();
    assert_eq!(store.find_balance(&trader, &sym("COIN")).unwrap().liquid, 500);
  }
}
