//! Pool Catalog Use Case - Multi-network Pool Discovery and Ranking
//!
//! Scans every registered network concurrently. Each network invokes the
//! scanner of every protocol it lists; a network's pool list is replaced
//! atomically once its scan succeeds. A network whose wired scanners all
//! failed keeps its previous list.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use futures_util::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::domain::error::{AggregatorError, AggregatorResult};
use crate::domain::network::{NetworkConfig, NetworkId, NetworkRegistry};
use crate::domain::pool::{Pool, rank_by_risk_adjusted_yield};
use crate::ports::protocol_scanner::ProtocolScanner;

/// Outcome of a full scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
  /// Pools stored per successfully scanned network.
  pub scanned: BTreeMap<NetworkId, usize>,
  /// Networks whose scan failed; their previous lists were kept.
  pub failed: Vec<NetworkId>,
}

impl ScanReport {
  /// Total pools stored by this scan.
  pub fn total_pools(&self) -> usize {
    self.scanned.values().sum()
  }
}

/// Pool catalog keyed by network.
pub struct PoolCatalog {
  registry: Arc<NetworkRegistry>,
  /// Scanners keyed by lowercase protocol name.
  scanners: HashMap<String, Arc<dyn ProtocolScanner>>,
  pools: RwLock<HashMap<NetworkId, Arc<Vec<Pool>>>>,
  /// One full scan at a time.
  scan_lock: Mutex<()>,
}

impl PoolCatalog {
  /// Create a catalog over `registry`. Protocols without a scanner
  /// behave as not wired and contribute no pools.
  pub fn new(
    registry: Arc<NetworkRegistry>,
    scanners: impl IntoIterator<Item = Arc<dyn ProtocolScanner>>,
  ) -> Self {
    let scanners = scanners
      .into_iter()
      .map(|s| (s.protocol().to_ascii_lowercase(), s))
      .collect();

    Self {
      registry,
      scanners,
      pools: RwLock::new(HashMap::new()),
      scan_lock: Mutex::new(()),
    }
  }

  /// Rebuild the pool lists of every registered network.
  ///
  /// Individual network failures are logged and reported, never
  /// propagated.
  ///
  /// # Errors
  /// Currently infallible; the result type leaves room for
  /// catalog-wide failures.
  #[instrument(skip(self))]
  pub async fn scan_all_networks(&self) -> AggregatorResult<ScanReport> {
    let _guard = self.scan_lock.lock().await;

    let scans = self
      .registry
      .iter()
      .map(|network| async move { (network.id, self.scan_network(network).await) });
    let results = join_all(scans).await;

    let mut report = ScanReport::default();
    for (network, result) in results {
      match result {
        Ok(pools) => {
          let count = pools.len();
          self.pools.write().await.insert(network, Arc::new(pools));
          report.scanned.insert(network, count);
        }
        Err(e) => {
          warn!(network, error = %e, "Network scan failed, keeping previous pools");
          report.failed.push(network);
        }
      }
    }

    info!(
      networks = report.scanned.len(),
      failed = report.failed.len(),
      pools = report.total_pools(),
      "Catalog scan complete"
    );
    Ok(report)
  }

  /// Ranked pools on `network` within `risk_tolerance`.
  ///
  /// Pools are filtered by `0 < risk_score <= risk_tolerance` and
  /// `apy > 0`, then ordered by `apy / risk_score` descending. The
  /// amount is accepted for future capacity checks and does not affect
  /// the result.
  ///
  /// # Errors
  /// `NotFound` if the network is not registered. A registered network
  /// that was never scanned yields an empty list.
  #[instrument(skip(self, amount), fields(amount = %amount))]
  pub async fn get_optimal_yield(
    &self,
    network: NetworkId,
    amount: U256,
    risk_tolerance: u32,
  ) -> AggregatorResult<Vec<Pool>> {
    self.registry.get(network)?;

    let pools = self.pools(network).await;
    let ranked = rank_by_risk_adjusted_yield(pools.iter(), risk_tolerance);
    debug!(candidates = pools.len(), ranked = ranked.len(), "Pools ranked");
    Ok(ranked)
  }

  /// Current pool list of `network` (empty if never scanned).
  pub async fn pools(&self, network: NetworkId) -> Arc<Vec<Pool>> {
    self
      .pools
      .read()
      .await
      .get(&network)
      .cloned()
      .unwrap_or_default()
  }

  /// Look up a pool by address.
  pub async fn find_pool(&self, network: NetworkId, address: Address) -> Option<Pool> {
    self
      .pools(network)
      .await
      .iter()
      .find(|p| p.address == address)
      .cloned()
  }

  /// Number of pools stored for `network`.
  pub async fn pool_count(&self, network: NetworkId) -> usize {
    self.pools(network).await.len()
  }

  /// Networks with a stored pool list, ascending.
  pub async fn scanned_networks(&self) -> Vec<NetworkId> {
    let mut ids: Vec<_> = self.pools.read().await.keys().copied().collect();
    ids.sort_unstable();
    ids
  }

  /// Run every listed protocol's scanner on one network.
  ///
  /// Fails only when at least one wired scanner ran and all wired
  /// scanners failed.
  async fn scan_network(&self, network: &NetworkConfig) -> AggregatorResult<Vec<Pool>> {
    let mut pools = Vec::new();
    let mut seen = HashSet::new();
    let mut wired = 0usize;
    let mut failed = 0usize;
    let mut last_error = None;

    for protocol in &network.supported_protocols {
      let result = match self.scanners.get(&protocol.to_ascii_lowercase()) {
        Some(scanner) => scanner.scan(network).await,
        None => Err(AggregatorError::Unimplemented(format!("{protocol} scanner"))),
      };

      match result {
        Ok(found) => {
          wired += 1;
          debug!(network = network.id, protocol = %protocol, pools = found.len(), "Protocol scanned");
          pools.extend(
            found
              .into_iter()
              .filter(|p| p.network == network.id)
              .filter(|p| seen.insert(p.id.clone())),
          );
        }
        Err(e) if e.is_unimplemented() => {
          debug!(network = network.id, protocol = %protocol, "Protocol scanner not wired");
        }
        Err(e) => {
          wired += 1;
          failed += 1;
          warn!(network = network.id, protocol = %protocol, error = %e, "Protocol scan failed");
          last_error = Some(e);
        }
      }
    }

    match last_error {
      Some(e) if failed == wired => Err(e),
      _ => Ok(pools),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_unscanned_network_is_empty() {
    let catalog = PoolCatalog::new(Arc::new(NetworkRegistry::builtin()), Vec::new());
    let ranked = catalog.get_optimal_yield(137, U256::ZERO, 5).await.unwrap();
    assert!(ranked.is_empty());
  }

  #[tokio::test]
  async fn test_unknown_network_is_not_found() {
    let catalog = PoolCatalog::new(Arc::new(NetworkRegistry::builtin()), Vec::new());
    let result = catalog.get_optimal_yield(56, U256::ZERO, 5).await;
    assert!(matches!(result, Err(AggregatorError::NotFound { .. })));
  }

  #[tokio::test]
  async fn test_scan_with_no_scanners_stores_empty_lists() {
    let catalog = PoolCatalog::new(Arc::new(NetworkRegistry::builtin()), Vec::new());
    let report = catalog.scan_all_networks().await.unwrap();
    assert_eq!(report.scanned.len(), 4);
    assert!(report.failed.is_empty());
    assert_eq!(catalog.scanned_networks().await, vec![1, 10, 137, 42161]);
  }
}
