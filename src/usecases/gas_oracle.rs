//! Gas Oracle - Per-network Gas Gate for Maintenance Transactions
//!
//! Queries the suggested gas price on every connected network and
//! compares it with the registry ceiling. Harvests are skipped while a
//! network is above its ceiling.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::U256;
use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::domain::network::{NetworkId, NetworkRegistry};
use crate::ports::chain_client::ChainClient;

const WEI_PER_GWEI: f64 = 1_000_000_000.0;

/// Gas gate over every connected network.
pub struct GasOracle {
  registry: Arc<NetworkRegistry>,
  clients: HashMap<NetworkId, Arc<dyn ChainClient>>,
  /// Last observed gas price per network, gwei × 1000.
  cached_milli_gwei: HashMap<NetworkId, AtomicU64>,
}

impl GasOracle {
  /// Create an oracle over the given clients.
  pub fn new(
    registry: Arc<NetworkRegistry>,
    clients: impl IntoIterator<Item = Arc<dyn ChainClient>>,
  ) -> Self {
    let clients: HashMap<_, _> = clients.into_iter().map(|c| (c.network_id(), c)).collect();
    let cached_milli_gwei = clients.keys().map(|id| (*id, AtomicU64::new(0))).collect();

    Self {
      registry,
      clients,
      cached_milli_gwei,
    }
  }

  /// Current gas price on `network` in gwei.
  ///
  /// # Errors
  /// Fails if no client is connected for the network or the RPC call fails.
  #[instrument(skip(self))]
  pub async fn gas_price_gwei(&self, network: NetworkId) -> Result<f64> {
    let client = self
      .clients
      .get(&network)
      .with_context(|| format!("no chain client for network {network}"))?;

    let wei = client
      .suggest_gas_price()
      .await
      .with_context(|| format!("failed to query gas price on network {network}"))?;
    let gwei = wei_to_gwei(wei);

    if let Some(cached) = self.cached_milli_gwei.get(&network) {
      cached.store((gwei * 1000.0) as u64, Ordering::Relaxed);
    }

    debug!(gas_gwei = gwei, "Gas price updated");
    Ok(gwei)
  }

  /// Last observed gas price without an RPC call; `None` before the first query.
  pub fn cached_gas_gwei(&self, network: NetworkId) -> Option<f64> {
    self
      .cached_milli_gwei
      .get(&network)
      .map(|c| c.load(Ordering::Relaxed))
      .filter(|v| *v > 0)
      .map(|v| v as f64 / 1000.0)
  }

  /// Whether gas on `network` is at or below the registry ceiling.
  ///
  /// Networks without a client, or whose price cannot be read, are
  /// reported as acceptable so the gate never blocks harvests on its
  /// own failure.
  pub async fn is_gas_acceptable(&self, network: NetworkId) -> bool {
    let Ok(config) = self.registry.get(network) else {
      return true;
    };
    if !self.clients.contains_key(&network) {
      return true;
    }

    match self.gas_price_gwei(network).await {
      Ok(gwei) => {
        let acceptable = gwei <= config.max_gas_price_gwei;
        if !acceptable {
          debug!(network, gas_gwei = gwei, max_gwei = config.max_gas_price_gwei, "Gas above ceiling");
        }
        acceptable
      }
      Err(e) => {
        warn!(network, error = %e, "Gas price unavailable, not gating");
        true
      }
    }
  }

  /// Networks with a connected client.
  pub fn networks(&self) -> Vec<NetworkId> {
    let mut ids: Vec<_> = self.clients.keys().copied().collect();
    ids.sort_unstable();
    ids
  }
}

fn wei_to_gwei(wei: U256) -> f64 {
  u128::try_from(wei).map_or(f64::MAX, |w| w as f64 / WEI_PER_GWEI)
}

#[cfg(test)]
mod tests {
  use super::*;
  use alloy::primitives::{Address, Bytes};
  use async_trait::async_trait;

  struct FixedGas {
    network: NetworkId,
    wei: u64,
  }

  #[async_trait]
  impl ChainClient for FixedGas {
    fn network_id(&self) -> NetworkId {
      self.network
    }

    async fn suggest_gas_price(&self) -> anyhow::Result<U256> {
      Ok(U256::from(self.wei))
    }

    async fn call(&self, _to: Address, _calldata: Bytes) -> anyhow::Result<Bytes> {
      anyhow::bail!("not used")
    }

    async fn is_healthy(&self) -> bool {
      true
    }
  }

  fn oracle(network: NetworkId, gwei: u64) -> GasOracle {
    let client: Arc<dyn ChainClient> = Arc::new(FixedGas {
      network,
      wei: gwei * 1_000_000_000,
    });
    GasOracle::new(Arc::new(NetworkRegistry::builtin()), [client])
  }

  #[tokio::test]
  async fn test_gas_below_ceiling_is_acceptable() {
    let gas = oracle(1, 30);
    assert!(gas.is_gas_acceptable(1).await);
    assert_eq!(gas.cached_gas_gwei(1), Some(30.0));
  }

  #[tokio::test]
  async fn test_gas_above_ceiling_is_gated() {
    let gas = oracle(1, 150);
    assert!(!gas.is_gas_acceptable(1).await);
  }

  #[tokio::test]
  async fn test_unconnected_network_is_not_gated() {
    let gas = oracle(1, 150);
    assert!(gas.is_gas_acceptable(137).await);
    assert_eq!(gas.cached_gas_gwei(137), None);
  }
}
