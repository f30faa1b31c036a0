//! Virtual operations (§4.3 step 6, §4.5 step 3): informational receipts an
//! evaluator emits alongside its store mutations. They are never replayed
//! and carry no authority of their own — purely a log for the host's
//! receipts stream (payouts, fills, liquidations, settlements).

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::ids::{
  AccountName, AssetSymbol, CallOrderId, CreditLoanId, LimitOrderId, MarginOrderId, PredictionPoolId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualOp {
  FillOrder {
    taker: AccountName,
    maker: AccountName,
    maker_order_id: Option<LimitOrderId>,
    taker_paid: Amount,
    taker_received: Amount,
  },
  LimitOrderCancelled {
    owner: AccountName,
    order_id: LimitOrderId,
    returned: Amount,
  },
  CallOrderLiquidated {
    owner: AccountName,
    order_id: CallOrderId,
    collateral_returned: Amount,
    debt_closed: Amount,
  },
  MarginCalled {
    owner: AccountName,
    order_id: MarginOrderId,
    collateral_liquidated: Amount,
    debt_repaid: Amount,
  },
  LoanInterestAccrued {
    owner: AccountName,
    loan_id: CreditLoanId,
    interest: Amount,
    network_fee: Amount,
  },
  LoanLiquidated {
    owner: AccountName,
    loan_id: CreditLoanId,
    shortfall: Amount,
  },
  GlobalSettlement {
    symbol: AssetSymbol,
    settlement_price_num: u64,
    settlement_price_den: u64,
  },
  ForceSettlement {
    owner: AccountName,
    symbol: AssetSymbol,
    amount: Amount,
  },
  CommentPayout {
    author: AccountName,
    permlink: String,
    author_reward: Amount,
    curator_reward: Amount,
    beneficiary_reward: Amount,
  },
  CurationReward {
    curator: AccountName,
    author: AccountName,
    permlink: String,
    reward: Amount,
  },
  ProducerReward {
    producer: AccountName,
    reward: Amount,
  },
  ProducerSlashed {
    producer: AccountName,
  },
  ChainBecameIrreversible {
    block_num: u64,
  },
  /// A trade against an AMM liquidity pool, parallel to `FillOrder` for
  /// book trades (§4.6).
  PoolExchanged {
    trader: AccountName,
    pool_a: AssetSymbol,
    pool_b: AssetSymbol,
    paid: Amount,
    received: Amount,
    fee: Amount,
  },
  /// A credit loan reaching maintenance-triggered liquidation at open/adjust
  /// time is covered by `LoanLiquidated`; this covers a borrower-initiated
  /// close so the interest/fee split is visible even when no liquidation
  /// occurred (§4.7.1).
  LoanClosed {
    owner: AccountName,
    loan_id: CreditLoanId,
    collateral_returned: Amount,
  },
  /// A prediction pool reaching a final outcome (§4.10.1).
  PredictionResolved {
    pool: PredictionPoolId,
    outcome: AssetSymbol,
    invalid: bool,
  },
}
