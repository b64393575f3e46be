//! Execution Port - On-chain Position Management
//!
//! Deposits, withdrawals and harvests are delegated to an execution
//! adapter. The strategy manager never mutates chain state itself.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::domain::error::AggregatorResult;
use crate::domain::network::NetworkId;

/// Pool a position instruction applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionTarget {
  /// Network id.
  pub network: NetworkId,
  /// Protocol name.
  pub protocol: String,
  /// Pool contract.
  pub pool: Address,
}

/// Result of a deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
  /// Whether the transaction succeeded.
  pub success: bool,
  /// LP tokens received (deposit) or burned (withdrawal).
  pub lp_token_amount: U256,
  /// Transaction hash, when submitted.
  pub tx_hash: Option<String>,
}

/// Result of a harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOutcome {
  /// Whether the harvest succeeded.
  pub success: bool,
  /// Rewards claimed (base units).
  pub rewards_claimed: U256,
  /// Whether the rewards were reinvested.
  pub reinvested: bool,
  /// Transaction hash, when submitted.
  pub tx_hash: Option<String>,
}

/// Trait for execution providers.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync + 'static {
  /// Deposit `amount` base units on behalf of `user`.
  async fn deposit(
    &self,
    target: &PositionTarget,
    user: Address,
    amount: U256,
  ) -> AggregatorResult<TransactionResult>;

  /// Withdraw `amount` base units to `user`.
  async fn withdraw(
    &self,
    target: &PositionTarget,
    user: Address,
    amount: U256,
  ) -> AggregatorResult<TransactionResult>;

  /// Claim rewards and reinvest or realize them.
  async fn harvest(&self, target: &PositionTarget) -> AggregatorResult<HarvestOutcome>;

  /// Rewards accrued but not yet claimed (base units).
  async fn pending_rewards(&self, target: &PositionTarget) -> AggregatorResult<U256>;
}
