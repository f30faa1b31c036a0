//! The transaction/block apply loop (§5, §6.1, §6.3): wires authority
//! verification, per-operation dispatch, and undo-scope nesting (block >
//! transaction > operation) together. This is the one place that owns the
//! "apply atomically, roll back on any failure" contract described in §4.1
//! and §7.

use std::collections::BTreeSet;

use common::ChainTime;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::authority::verify_authorities;
use crate::error::{KernelError, KernelResult};
use crate::ids::AccountName;
use crate::maintenance;
use crate::operations::{apply_operation, required_authorities, Operation};
use crate::store::Store;
use crate::virtual_op::VirtualOp;

/// A signed transaction (§6.1). `ref_block_num`/`ref_block_prefix` are
/// replay-protection fields the kernel does not itself interpret (that is
/// the host's TaPoS check); they are carried so a full wire transaction
/// round-trips through this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
  pub ref_block_num: u16,
  pub ref_block_prefix: u32,
  pub expiration: ChainTime,
  pub operations: Vec<Operation>,
  pub signature_keys: BTreeSet<String>,
}

/// A block (§6.3). Header fields beyond what the kernel needs to advance
/// `head_time`/`head_block_num` (producer signature, merkle root) are the
/// producer/consensus layer's concern and are not modeled here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
  pub block_num: u64,
  pub timestamp: ChainTime,
  pub producer: AccountName,
  pub transactions: Vec<Transaction>,
}

/// Applies one transaction inside its own undo scope (§4.1, §4.3 step 7):
/// checks expiration, verifies every operation's required authority against
/// the supplied signature keys (§4.2), then dispatches each operation in
/// order. Any failure rolls back every mutation the transaction made; none
/// of its operations are partially applied.
pub fn apply_transaction(store: &mut Store, tx: &Transaction, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  if tx.expiration.is_past(now) {
    return Err(KernelError::Expired { what: "transaction", at: tx.expiration.as_unix(), now: now.as_unix() });
  }

  let session = store.begin_session();
  match apply_transaction_inner(store, tx, now) {
    Ok(ops) => {
      store.commit(session);
      Ok(ops)
    }
    Err(e) => {
      warn!("transaction rejected, rolling back: {e}");
      store.rollback(session);
      Err(e)
    }
  }
}

fn apply_transaction_inner(store: &mut Store, tx: &Transaction, now: ChainTime) -> KernelResult<Vec<VirtualOp>> {
  let mut ops = Vec::new();
  for op in &tx.operations {
    let required = required_authorities(op);
    verify_authorities(store, &required, &tx.signature_keys)?;

    let op_session = store.begin_session();
    match apply_operation(store, op, now) {
      Ok(produced) => {
        store.commit(op_session);
        ops.extend(produced);
      }
      Err(e) => {
        store.rollback(op_session);
        return Err(e);
      }
    }
  }
  Ok(ops)
}

/// Applies a block atomically (§4.1, §5): advances `head_time`/
/// `head_block_num`, applies every transaction in declared order inside the
/// block's own undo scope, and runs scheduled maintenance once the block's
/// transactions have all committed. Any transaction's failure aborts the
/// whole block and reverts it to its pre-apply state (§7 "a block whose
/// apply fails is rejected; the chain stays on its prior head").
pub fn apply_block(store: &mut Store, block: &Block) -> KernelResult<Vec<VirtualOp>> {
  debug!("applying block {} with {} transactions", block.block_num, block.transactions.len());
  let session = store.begin_session();
  match apply_block_inner(store, block) {
    Ok(ops) => {
      store.set_last_block_mark(session);
      info!("block {} applied, head_time now {}", block.block_num, store.head_time().as_unix());
      Ok(ops)
    }
    Err(e) => {
      warn!("block {} rejected, rolling back: {e}", block.block_num);
      store.rollback(session);
      Err(e)
    }
  }
}

fn apply_block_inner(store: &mut Store, block: &Block) -> KernelResult<Vec<VirtualOp>> {
  store.set_head(block.block_num, block.timestamp);

  let mut ops = Vec::new();
  for tx in &block.transactions {
    ops.extend(apply_transaction(store, tx, block.timestamp)?);
  }

  ops.extend(maintenance::run_maintenance(store, block.timestamp)?);
  Ok(ops)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::amount::Amount;
  use crate::config::ChainSpec;
  use crate::ids::AssetSymbol;
  use crate::objects::{Account, Asset, AssetKind};

  fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
  }

  fn keys(ks: &[&str]) -> BTreeSet<String> {
    ks.iter().map(|k| k.to_string()).collect()
  }

  fn setup() -> Store {
    let mut store = Store::new(ChainSpec::default(), ChainTime::from_unix(0));
    let native = store.chain_spec.native_symbol.clone();
    store.ensure_asset_dynamic(&native);
    store
      .create_asset(
        Asset {
          id: store.alloc_asset_id(),
          symbol: native.clone(),
          kind: AssetKind::Currency,
          issuer: None,
          max_supply: u64::MAX,
          stake_intervals: 1,
          unstake_intervals: 4,
          market_fee_percent: 0,
          permissions: u32::MAX,
          flags: u32::MAX,
          created: ChainTime::from_unix(0),
        },
        Default::default(),
      )
      .unwrap();
    for n in ["alice", "bob"] {
      let id = store.alloc_account_id();
      store.create_account(Account::new(id, name(n), format!("{n}-key"), ChainTime::from_unix(0))).unwrap();
    }
    store
  }

  #[test]
  fn transfer_transaction_commits_on_success() {
    let mut store = setup();
    let native = store.chain_spec.native_symbol.clone();
    crate::balance_engine::mint_liquid(&mut store, &name("alice"), &native, 1000).unwrap();
    let tx = Transaction {
      ref_block_num: 0,
      ref_block_prefix: 0,
      expiration: ChainTime::from_unix(100),
      operations: vec![Operation::Transfer { from: name("alice"), to: name("bob"), amount: Amount::new(400, native.clone()), memo: String::new() }],
      signature_keys: keys(&["alice-key"]),
    };
    apply_transaction(&mut store, &tx, ChainTime::from_unix(0)).unwrap();
    assert_eq!(store.find_balance(&name("alice"), &native).unwrap().liquid, 600);
    assert_eq!(store.find_balance(&name("bob"), &native).unwrap().liquid, 400);
  }

  #[test]
  fn transaction_past_expiration_is_rejected() {
    let mut store = setup();
    let native = store.chain_spec.native_symbol.clone();
    let tx = Transaction {
      ref_block_num: 0,
      ref_block_prefix: 0,
      expiration: ChainTime::from_unix(5),
      operations: vec![Operation::Transfer { from: name("alice"), to: name("bob"), amount: Amount::new(1, native), memo: String::new() }],
      signature_keys: keys(&["alice-key"]),
    };
    let err = apply_transaction(&mut store, &tx, ChainTime::from_unix(10));
    assert!(matches!(err, Err(KernelError::Expired { .. })));
  }

  #[test]
  fn failed_operation_rolls_back_whole_transaction() {
    let mut store = setup();
    let native = store.chain_spec.native_symbol.clone();
    crate::balance_engine::mint_liquid(&mut store, &name("alice"), &native, 100).unwrap();
    let tx = Transaction {
      ref_block_num: 0,
      ref_block_prefix: 0,
      expiration: ChainTime::from_unix(100),
      operations: vec![
        Operation::Transfer { from: name("alice"), to: name("bob"), amount: Amount::new(50, native.clone()), memo: String::new() },
        Operation::Transfer { from: name("alice"), to: name("bob"), amount: Amount::new(1_000_000, native.clone()), memo: String::new() },
      ],
      signature_keys: keys(&["alice-key"]),
    };
    let err = apply_transaction(&mut store, &tx, ChainTime::from_unix(0));
    assert!(err.is_err());
    assert_eq!(store.find_balance(&name("alice"), &native).unwrap().liquid, 100);
    assert_eq!(store.find_balance(&name("bob"), &native).map(|b| b.liquid).unwrap_or(0), 0);
  }

  #[test]
  fn block_apply_advances_head_and_runs_maintenance() {
    let mut store = setup();
    let native = store.chain_spec.native_symbol.clone();
    crate::balance_engine::mint_liquid(&mut store, &name("alice"), &native, 1000).unwrap();
    let block = Block {
      block_num: 1,
      timestamp: ChainTime::from_unix(10),
      producer: name("alice"),
      transactions: vec![Transaction {
        ref_block_num: 0,
        ref_block_prefix: 0,
        expiration: ChainTime::from_unix(100),
        operations: vec![Operation::Transfer { from: name("alice"), to: name("bob"), amount: Amount::new(100, native.clone()), memo: String::new() }],
        signature_keys: keys(&["alice-key"]),
      }],
    };
    apply_block(&mut store, &block).unwrap();
    assert_eq!(store.head_block_num(), 1);
    assert_eq!(store.head_time(), ChainTime::from_unix(10));
    assert_eq!(store.find_balance(&name("bob"), &native).unwrap().liquid, 100);
  }

  #[test]
  fn pop_block_reverts_to_pre_block_state() {
    let mut store = setup();
    let native = store.chain_spec.native_symbol.clone();
    crate::balance_engine::mint_liquid(&mut store, &name("alice"), &native, 1000).unwrap();
    let snapshot_alice = store.find_balance(&name("alice"), &native).unwrap().liquid;
    let block = Block {
      block_num: 1,
      timestamp: ChainTime::from_unix(10),
      producer: name("alice"),
      transactions: vec![Transaction {
        ref_block_num: 0,
        ref_block_prefix: 0,
        expiration: ChainTime::from_unix(100),
        operations: vec![Operation::Transfer { from: name("alice"), to: name("bob"), amount: Amount::new(100, native.clone()), memo: String::new() }],
        signature_keys: keys(&["alice-key"]),
      }],
    };
    apply_block(&mut store, &block).unwrap();
    assert_eq!(store.head_block_num(), 1);

    store.pop_block().unwrap();
    assert_eq!(store.head_block_num(), 0);
    assert_eq!(store.find_balance(&name("alice"), &native).unwrap().liquid, snapshot_alice);
    assert_eq!(store.find_balance(&name("bob"), &native).map(|b| b.liquid).unwrap_or(0), 0);

    assert!(store.pop_block().is_err());
  }

  #[test]
  fn irreversible_block_cannot_be_popped() {
    let mut store = setup();
    let native = store.chain_spec.native_symbol.clone();
    crate::balance_engine::mint_liquid(&mut store, &name("alice"), &native, 1000).unwrap();
    let block = Block {
      block_num: 1,
      timestamp: ChainTime::from_unix(10),
      producer: name("alice"),
      transactions: vec![Transaction {
        ref_block_num: 0,
        ref_block_prefix: 0,
        expiration: ChainTime::from_unix(100),
        operations: vec![Operation::Transfer { from: name("alice"), to: name("bob"), amount: Amount::new(100, native.clone()), memo: String::new() }],
        signature_keys: keys(&["alice-key"]),
      }],
    };
    apply_block(&mut store, &block).unwrap();
    store.set_irreversible(1);
    assert!(store.pop_block().is_err());
  }

  #[test]
  fn unsigned_transfer_is_rejected() {
    let mut store = setup();
    let native = store.chain_spec.native_symbol.clone();
    crate::balance_engine::mint_liquid(&mut store, &name("alice"), &native, 1000).unwrap();
    let tx = Transaction {
      ref_block_num: 0,
      ref_block_prefix: 0,
      expiration: ChainTime::from_unix(100),
      operations: vec![Operation::Transfer { from: name("alice"), to: name("bob"), amount: Amount::new(400, native), memo: String::new() }],
      signature_keys: BTreeSet::new(),
    };
    let err = apply_transaction(&mut store, &tx, ChainTime::from_unix(0));
    assert!(err.is_err());
  }
}
