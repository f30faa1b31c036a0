use std::collections::BTreeMap;

/// One entry in a table's undo log. Every mutation of a `Table` appends
/// exactly one of these; rolling back to an earlier mark replays them in
/// reverse (§4.1, §9 "object mutation via lambdas passed into modify").
enum Change<K, V> {
  Created(K),
  Modified(K, V),
  Removed(K, V),
}

/// What happened to the primary table during a rollback, so the owning
/// domain store can mirror the same change into its secondary indices
/// without separately journaling them (every secondary key in this kernel
/// is part of a record's identity, fixed at creation — see DESIGN.md).
pub enum RollbackEvent<K, V> {
  /// The record at `K` no longer exists in the table.
  Vanished(K, V),
  /// The record at `K` exists in the table with the given value (created,
  /// restored after a removal, or reverted to a prior value in place).
  Present(K, V),
}

/// A BTreeMap-backed primary store for one object kind, with an append-only
/// undo log. Iteration order is the key's `Ord`, which is how the kernel
/// satisfies the determinism requirement in §4.1 — never insertion order.
pub struct Table<K: Ord + Clone, V: Clone> {
  records: BTreeMap<K, V>,
  log: Vec<Change<K, V>>,
}

impl<K: Ord + Clone, V: Clone> Default for Table<K, V> {
  fn default() -> Self {
    Self { records: BTreeMap::new(), log: Vec::new() }
  }
}

impl<K: Ord + Clone, V: Clone> Table<K, V> {
  pub fn get(&self, key: &K) -> Option<&V> {
    self.records.get(key)
  }

  pub fn contains(&self, key: &K) -> bool {
    self.records.contains_key(key)
  }

  pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> {
    self.records.iter()
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn range<R>(&self, range: R) -> impl DoubleEndedIterator<Item = (&K, &V)>
  where
    R: std::ops::RangeBounds<K>,
  {
    self.records.range(range)
  }

  pub fn insert(&mut self, key: K, value: V) -> &V {
    self.records.insert(key.clone(), value);
    self.log.push(Change::Created(key.clone()));
    self.records.get(&key).expect("just inserted")
  }

  pub fn modify(&mut self, key: &K, f: impl FnOnce(&mut V)) -> Option<()> {
    let before = self.records.get(key)?.clone();
    let rec = self.records.get_mut(key)?;
    f(rec);
    self.log.push(Change::Modified(key.clone(), before));
    Some(())
  }

  pub fn remove(&mut self, key: &K) -> Option<V> {
    let removed = self.records.remove(key)?;
    self.log.push(Change::Removed(key.clone(), removed.clone()));
    Some(removed)
  }

  /// Current log length; pass this to `rollback_to` to undo everything
  /// done since this call.
  pub fn checkpoint(&self) -> usize {
    self.log.len()
  }

  /// Revert every change made since `mark` and report each affected key so
  /// the domain store can keep secondary indices in sync.
  pub fn rollback_to(&mut self, mark: usize) -> Vec<RollbackEvent<K, V>> {
    let mut events = Vec::new();
    while self.log.len() > mark {
      match self.log.pop().expect("len > mark implies non-empty") {
        Change::Created(k) => {
          let removed = self.records.remove(&k).expect("created key must be present");
          events.push(RollbackEvent::Vanished(k, removed));
        }
        Change::Modified(k, before) => {
          self.records.insert(k.clone(), before.clone());
          events.push(RollbackEvent::Present(k, before));
        }
        Change::Removed(k, before) => {
          self.records.insert(k.clone(), before.clone());
          events.push(RollbackEvent::Present(k, before));
        }
      }
    }
    events
  }

  /// Discard log entries below `mark` that will never be rolled back
  /// because the enclosing scope already committed past them. Called once
  /// a block becomes irreversible (§5).
  pub fn prune_before(&mut self, mark: usize) {
    if mark == 0 {
      return;
    }
    // Only Created/Modified/Removed entries carry no information needed by
    // outer scopes once they're below every live mark, so a straight
    // truncate-from-the-front is safe; we keep it simple with drain.
    let keep_from = mark.min(self.log.len());
    self.log.drain(0..keep_from);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rollback_undoes_create_modify_remove_in_order() {
    let mut t: Table<u64, i32> = Table::default();
    t.insert(1, 10);
    let mark = t.checkpoint();
    t.modify(&1, |v| *v += 5);
    t.insert(2, 20);
    t.remove(&1);
    assert_eq!(t.get(&1), None);
    assert_eq!(t.get(&2), Some(&20));

    t.rollback_to(mark);
    assert_eq!(t.get(&1), Some(&10));
    assert_eq!(t.get(&2), None);
  }

  #[test]
  fn nested_rollback_only_undoes_inner_scope() {
    let mut t: Table<u64, i32> = Table::default();
    t.insert(1, 10);
    let outer = t.checkpoint();
    t.modify(&1, |v| *v = 20);
    let inner = t.checkpoint();
    t.modify(&1, |v| *v = 30);
    t.rollback_to(inner);
    assert_eq!(t.get(&1), Some(&20));
    t.rollback_to(outer);
    assert_eq!(t.get(&1), Some(&10));
  }
}
