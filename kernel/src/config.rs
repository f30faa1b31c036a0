use serde::{Deserialize, Serialize};

use common::SECONDS_PER_DAY;

use crate::ids::AssetSymbol;

/// Basis-points denominator used throughout the kernel (100.00% == 10_000).
pub const PERCENT_100: u64 = crate::amount::PERCENT_100;

pub const MAX_SIG_CHECK_DEPTH: u8 = 3;
pub const OWNER_UPDATE_LIMIT_SECONDS: u64 = SECONDS_PER_DAY;
pub const MIN_VOTE_INTERVAL_SEC: u64 = 3;
pub const MIN_VIEW_INTERVAL_SEC: u64 = 3;
pub const MIN_SHARE_INTERVAL_SEC: u64 = 3;
pub const MIN_ROOT_POST_INTERVAL_SEC: u64 = 60;
pub const MIN_COMMENT_INTERVAL_SEC: u64 = 15;
pub const STAKE_WITHDRAW_INTERVAL_SECONDS: u64 = SECONDS_PER_DAY / 24; // hourly tranche
pub const SAVINGS_WITHDRAW_DELAY_SECONDS: u64 = 3 * SECONDS_PER_DAY;
pub const INTEREST_FEE_PERCENT: u64 = 2000; // 20.00% of accrued interest
pub const REWARD_STAKED_PERCENT: u64 = 5000; // 50.00% of claimed reward is staked
pub const IRREVERSIBLE_THRESHOLD: usize = 15;
pub const CURATION_AUCTION_WINDOW_SECONDS: u64 = 10 * 60;
pub const CASHOUT_WINDOW_SECONDS: u64 = 7 * SECONDS_PER_DAY;
pub const FORCE_SETTLEMENT_DELAY_SECONDS: u64 = SECONDS_PER_DAY;
pub const PREDICTION_RESOLUTION_DELAY_SECONDS: u64 = 7 * SECONDS_PER_DAY;
/// Share of a liquidity pool exchange's fee routed to the trade's
/// `interface` account rather than burned to `accumulated_fees` (§4.6.1).
pub const POOL_INTERFACE_FEE_SHARE_PERCENT: u64 = 2000; // 20.00% of the fee
pub const AUCTION_ORDER_INTERVAL_SECONDS: u64 = SECONDS_PER_DAY;
pub const FEED_MAX_AGE_SECONDS: u64 = SECONDS_PER_DAY;
pub const HOUR_PRICE_SAMPLES: usize = 60;
pub const DAY_PRICE_SAMPLES: usize = 1_440;
/// Time for a fully-spent voting/viewing/sharing/commenting power pool to
/// regenerate back to `PERCENT_100` (§3.7 "regenerating").
pub const POWER_REGENERATION_SECONDS: u64 = 5 * SECONDS_PER_DAY;
/// Confirmed violations before a producer is automatically deactivated
/// (§3.8, §4.11 "slashing").
pub const PRODUCER_VIOLATION_DEACTIVATION_THRESHOLD: u64 = 3;
/// Lifetime of an option pool auto-opened on first `option_order_create`
/// for a not-yet-seen underlying/strike pair (§3.4, §4.10).
pub const OPTION_POOL_DEFAULT_DURATION_SECONDS: u64 = 30 * SECONDS_PER_DAY;

/// Producer-voted parameters, taken as the per-slot median across the
/// active producer set (§3.8, GLOSSARY "Median chain properties"). Bounds
/// are hardcoded consensus constants; the value in between is whatever the
/// producers currently vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianChainProperties {
  /// Minimum collateralization ratio (basis points) required to open a new
  /// credit loan. Default 125.00%.
  pub credit_open_ratio: u64,
  /// Collateralization ratio (basis points) below which a loan is subject
  /// to liquidation. Default 110.00%.
  pub credit_liquidation_ratio: u64,
  /// Collateralization ratio (basis points) required to open a margin
  /// order. Default 150.00%.
  pub margin_open_ratio: u64,
  /// Credit pool base interest rate (basis points per year) at zero
  /// utilization.
  pub credit_min_interest: u64,
  /// Credit pool additional interest rate (basis points per year) at 100%
  /// utilization, added on top of `credit_min_interest`.
  pub credit_variable_interest: u64,
  /// Minimum collateralization ratio for bitasset call orders (basis
  /// points). Default 175.00%.
  pub bitasset_mcr: u64,
  /// AMM pool exchange fee (basis points).
  pub liquidity_pool_fee: u64,
  /// Curation decay constant used in `geometric_count_decay` (§4.9).
  pub vote_curation_decay: u64,
  pub view_curation_decay: u64,
  pub share_curation_decay: u64,
  pub comment_curation_decay: u64,
  /// Inflation available to the content reward fund per day, in the core
  /// asset's smallest unit.
  pub content_reward_fund_per_day: u64,
  pub account_creation_fee: u64,
}

impl Default for MedianChainProperties {
  fn default() -> Self {
    Self {
      credit_open_ratio: 12_500,
      credit_liquidation_ratio: 11_000,
      margin_open_ratio: 15_000,
      credit_min_interest: 200,
      credit_variable_interest: 2_000,
      bitasset_mcr: 17_500,
      liquidity_pool_fee: 30, // 0.30%
      vote_curation_decay: 604_800,
      view_curation_decay: 604_800,
      share_curation_decay: 1_209_600,
      comment_curation_decay: 2_592_000,
      content_reward_fund_per_day: 1_000_000 * crate::amount::PRECISION_FACTOR,
      account_creation_fee: crate::amount::PRECISION_FACTOR,
    }
  }
}

/// The chain-id-seeding, hardcoded half of the consensus constants (§6.5).
/// Implementations must agree on these exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
  pub chain_id: [u8; 32],
  pub block_interval_seconds: u64,
  pub median_props: MedianChainProperties,
  /// Symbol of the chain's native currency asset (issuer-less, §3.2),
  /// the one the content reward fund and producer rewards are denominated
  /// in.
  pub native_symbol: AssetSymbol,
}

impl Default for ChainSpec {
  fn default() -> Self {
    Self {
      chain_id: [0u8; 32],
      block_interval_seconds: 3,
      median_props: MedianChainProperties::default(),
      native_symbol: AssetSymbol::new("COIN"),
    }
  }
}
