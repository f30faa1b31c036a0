use serde::{Deserialize, Serialize};

use common::ChainTime;

use crate::config::MedianChainProperties;
use crate::ids::{AccountName, ProducerId};

/// A registered block producer candidate, ranked by vote weight for
/// inclusion in the active schedule (§3.8, §4.11).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
  pub id: ProducerId,
  pub owner: AccountName,
  pub signing_key: String,
  pub vote_weight: u64,
  pub total_missed: u64,
  pub last_confirmed_block: u64,
  pub props: MedianChainProperties,
  pub is_active: bool,
  pub created: ChainTime,
}

impl Producer {
  pub fn new(id: ProducerId, owner: AccountName, signing_key: String, now: ChainTime) -> Self {
    Self {
      id,
      owner,
      signing_key,
      vote_weight: 0,
      total_missed: 0,
      last_confirmed_block: 0,
      props: MedianChainProperties::default(),
      is_active: true,
      created: now,
    }
  }
}

/// The active producer set for the current round, in scheduled slot
/// order (§4.11). Rebuilt at the top of each maintenance pass from the
/// `vote_weight`-ranked candidate list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProducerSchedule {
  pub slots: Vec<AccountName>,
  pub current_shuffle_seed: u64,
}

impl ProducerSchedule {
  pub fn slot_for(&self, slot_number: u64) -> Option<&AccountName> {
    if self.slots.is_empty() {
      return None;
    }
    self.slots.get((slot_number as usize) % self.slots.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn schedule_wraps_around_slots() {
    let schedule = ProducerSchedule {
      slots: vec![
        AccountName::new("producer1").unwrap(),
        AccountName::new("producer2").unwrap(),
      ],
      current_shuffle_seed: 0,
    };
    assert_eq!(schedule.slot_for(0), schedule.slot_for(2));
    assert_ne!(schedule.slot_for(0), schedule.slot_for(1));
  }

  #[test]
  fn empty_schedule_has_no_slot() {
    let schedule = ProducerSchedule::default();
    assert_eq!(schedule.slot_for(0), None);
  }
}
