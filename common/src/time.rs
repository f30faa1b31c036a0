use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Chain time: whole seconds since the Unix epoch. Every timestamp the kernel
/// reasons about (block head time, order expiration, feed age, cashout time)
/// is a `ChainTime`, never a wall-clock read directly from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ChainTime(pub u64);

impl ChainTime {
  pub fn from_unix(seconds: u64) -> Self {
    Self(seconds)
  }

  pub fn as_unix(&self) -> u64 {
    self.0
  }

  pub fn saturating_add_secs(&self, secs: u64) -> Self {
    Self(self.0.saturating_add(secs))
  }

  pub fn saturating_sub_secs(&self, secs: u64) -> Self {
    Self(self.0.saturating_sub(secs))
  }

  /// Whole seconds elapsed from `self` to `later`; zero if `later` precedes `self`.
  pub fn elapsed_since(&self, earlier: Self) -> u64 {
    self.0.saturating_sub(earlier.0)
  }

  pub fn is_past(&self, now: Self) -> bool {
    *self <= now
  }
}

impl fmt::Display for ChainTime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl Add<u64> for ChainTime {
  type Output = ChainTime;
  fn add(self, rhs: u64) -> ChainTime {
    ChainTime(self.0 + rhs)
  }
}

impl Sub<u64> for ChainTime {
  type Output = ChainTime;
  fn sub(self, rhs: u64) -> ChainTime {
    ChainTime(self.0 - rhs)
  }
}

pub const SECONDS_PER_MINUTE: u64 = 60;
pub const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
pub const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn elapsed_since_saturates_instead_of_overflowing() {
    let earlier = ChainTime::from_unix(100);
    let later = ChainTime::from_unix(50);
    assert_eq!(later.elapsed_since(earlier), 0);
  }

  #[test]
  fn add_and_sub_seconds() {
    let t = ChainTime::from_unix(1_000);
    assert_eq!(t.saturating_add_secs(SECONDS_PER_DAY).as_unix(), 1_000 + SECONDS_PER_DAY);
    assert_eq!(t.saturating_sub_secs(2_000).as_unix(), 0);
  }
}
