//! Execution adapter placeholder.
//!
//! No transaction signer is wired; every instruction answers
//! `Unimplemented` so callers can tell "not wired" from "failed".

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::domain::error::{AggregatorError, AggregatorResult};
use crate::ports::execution::{ExecutionAdapter, HarvestOutcome, PositionTarget, TransactionResult};

/// Execution adapter that is not wired to a signer.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnwiredExecution;

fn unwired(action: &str, target: &PositionTarget) -> AggregatorError {
    AggregatorError::Unimplemented(format!(
        "{action} on {} pool {} (network {})",
        target.protocol, target.pool, target.network
    ))
}

#[async_trait]
impl ExecutionAdapter for UnwiredExecution {
    async fn deposit(&self, target: &PositionTarget, _user: Address, _amount: U256) -> AggregatorResult<TransactionResult> {
        Err(unwired("deposit", target))
    }

    async fn withdraw(&self, target: &PositionTarget, _user: Address, _amount: U256) -> AggregatorResult<TransactionResult> {
        Err(unwired("withdrawal", target))
    }

    async fn harvest(&self, target: &PositionTarget) -> AggregatorResult<HarvestOutcome> {
        Err(unwired("harvest", target))
    }

    async fn pending_rewards(&self, target: &PositionTarget) -> AggregatorResult<U256> {
        Err(unwired("reward query", target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_instruction_is_unimplemented() {
        let target = PositionTarget {
            network: 1,
            protocol: "Aave".into(),
            pool: Address::ZERO,
        };
        let exec = UnwiredExecution;

        assert!(exec.deposit(&target, Address::ZERO, U256::from(1u64)).await.unwrap_err().is_unimplemented());
        assert!(exec.withdraw(&target, Address::ZERO, U256::from(1u64)).await.unwrap_err().is_unimplemented());
        assert!(exec.harvest(&target).await.unwrap_err().is_unimplemented());
        assert!(exec.pending_rewards(&target).await.unwrap_err().is_unimplemented());
    }
}
