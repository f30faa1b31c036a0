use serde::{Deserialize, Serialize};

use common::ChainTime;

use crate::amount::Amount;
use crate::ids::{AccountName, AssetDelegationExpirationId, EscrowId, SavingsWithdrawId};

/// A third-party-mediated transfer held until release, dispute, or
/// expiration (§3.9, taxonomy row "Marketplace").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
  pub id: EscrowId,
  pub from: AccountName,
  pub to: AccountName,
  pub agent: AccountName,
  pub amount: Amount,
  pub fee: Amount,
  pub ratification_deadline: ChainTime,
  pub escrow_expiration: ChainTime,
  pub to_approved: bool,
  pub agent_approved: bool,
  pub is_disputed: bool,
}

impl Escrow {
  pub fn is_approved(&self) -> bool {
    self.to_approved && self.agent_approved
  }
}

/// An in-flight owner-authority recovery request, filed by `recovery_account`
/// on behalf of `account_to_recover` (§3.1, §3.9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRequest {
  pub account_to_recover: AccountName,
  pub new_owner_key: String,
  pub expiration: ChainTime,
}

/// A scheduled `from_savings` withdrawal, released to `to` once `complete`
/// passes maintenance (§3.9, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsWithdraw {
  pub id: SavingsWithdrawId,
  pub from: AccountName,
  pub to: AccountName,
  pub amount: Amount,
  pub memo: String,
  pub request_id: u32,
  pub complete: ChainTime,
}

/// Voting/usage power delegated from `staked` at `delegator` to `receiving`
/// at `delegatee`, returned to the delegator after `expiration` (§4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDelegation {
  pub delegator: AccountName,
  pub delegatee: AccountName,
  pub amount: Amount,
  pub min_delegation_time: ChainTime,
}

/// An expiring record of asset delegation that is being wound down; holds
/// the power until `expiration` so the delegatee cannot immediately redelegate
/// the same power elsewhere (§4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDelegationExpiration {
  pub id: AssetDelegationExpirationId,
  pub delegator: AccountName,
  pub amount: Amount,
  pub expiration: ChainTime,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ids::AssetSymbol;

  #[test]
  fn escrow_requires_both_approvals() {
    let e = Escrow {
      id: EscrowId(1),
      from: AccountName::new("alice").unwrap(),
      to: AccountName::new("bob").unwrap(),
      agent: AccountName::new("carol").unwrap(),
      amount: Amount::new(100, AssetSymbol::new("COIN")),
      fee: Amount::zero(AssetSymbol::new("COIN")),
      ratification_deadline: ChainTime::from_unix(10),
      escrow_expiration: ChainTime::from_unix(100),
      to_approved: true,
      agent_approved: false,
      is_disputed: false,
    };
    assert!(!e.is_approved());
  }
}
