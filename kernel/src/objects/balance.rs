use serde::{Deserialize, Serialize};

use common::ChainTime;

use crate::ids::{AccountName, AssetSymbol};

/// One tranche of an in-progress unstake, released over
/// `unstake_intervals` evenly spaced withdrawals (§3.3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnstakeCursor {
  pub total_unstaking: u64,
  pub already_withdrawn: u64,
  pub intervals_total: u32,
  pub intervals_withdrawn: u32,
  pub next_withdrawal: ChainTime,
}

/// Per-account, per-asset balance record. Keyed by `(AccountName,
/// AssetSymbol)` in the owning store so every sub-balance for a holder and
/// asset lives in one record (§3.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
  pub owner: AccountName,
  pub symbol: AssetSymbol,
  pub liquid: u64,
  pub staked: u64,
  pub unstaking: u64,
  pub received_delegations: u64,
  pub delegated_out: u64,
  pub savings: u64,
  pub reward_pending: u64,
  pub unstake_cursor: Option<UnstakeCursor>,
}

impl Balance {
  pub fn new(owner: AccountName, symbol: AssetSymbol) -> Self {
    Self {
      owner,
      symbol,
      liquid: 0,
      staked: 0,
      unstaking: 0,
      received_delegations: 0,
      delegated_out: 0,
      savings: 0,
      reward_pending: 0,
      unstake_cursor: None,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.liquid == 0
      && self.staked == 0
      && self.unstaking == 0
      && self.received_delegations == 0
      && self.delegated_out == 0
      && self.savings == 0
      && self.reward_pending == 0
  }

  /// Effective weight for voting/governance: own stake plus stake
  /// delegated in, minus stake delegated out (§4.4, GLOSSARY "Vote
  /// weight").
  pub fn effective_stake(&self) -> u64 {
    self.staked + self.received_delegations - self.delegated_out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sym() -> AssetSymbol {
    AssetSymbol::new("COIN")
  }

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  #[test]
  fn effective_stake_nets_delegations() {
    let mut b = Balance::new(name("alice"), sym());
    b.staked = 100;
    b.received_delegations = 20;
    b.delegated_out = 30;
    assert_eq!(b.effective_stake(), 90);
  }

  #[test]
  fn fresh_balance_is_empty() {
    assert!(Balance::new(name("alice"), sym()).is_empty());
  }
}
