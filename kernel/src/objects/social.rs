use serde::{Deserialize, Serialize};

use common::ChainTime;

use crate::ids::AccountName;

/// A named community accounts can subscribe to (§3.1 "Communities" row).
/// Deliberately thin: moderation roles and community-scoped permissions are
/// a presentation-layer concern layered on top of this record, not modeled
/// by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
  pub name: String,
  pub creator: AccountName,
  pub subscriber_count: u64,
  pub created: ChainTime,
}

impl Community {
  pub fn new(name: String, creator: AccountName, now: ChainTime) -> Self {
    Self { name, creator, subscriber_count: 0, created: now }
  }
}
