//! Chain Client Port - Per-network RPC Access
//!
//! Defines the trait for reading EVM network state. One client exists
//! per connected network. Used by the gas oracle and by the on-chain
//! price-feed source. Implemented with alloy-rs.

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;

use crate::domain::network::NetworkId;

/// Read access to one EVM network.
///
/// Every call is expected to carry the configured RPC timeout.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
  /// Network this client is connected to.
  fn network_id(&self) -> NetworkId;

  /// Suggested gas price in wei.
  async fn suggest_gas_price(&self) -> anyhow::Result<U256>;

  /// Execute a read-only `eth_call` against `to`.
  async fn call(&self, to: Address, calldata: Bytes) -> anyhow::Result<Bytes>;

  /// Check if the RPC connection is healthy.
  async fn is_healthy(&self) -> bool;
}
