//! Protocol Scanner Port - Per-protocol Pool Discovery
//!
//! Turns a network + protocol into the protocol's current pool list.
//! Protocols without an adapter are wired to a scanner that always
//! answers `Unimplemented`, so "no adapter" stays distinguishable
//! from "no pools found".

use async_trait::async_trait;

use crate::domain::error::AggregatorResult;
use crate::domain::network::NetworkConfig;
use crate::domain::pool::Pool;

/// Pool discovery for one protocol.
#[async_trait]
pub trait ProtocolScanner: Send + Sync + 'static {
  /// Protocol name as listed in the network registry.
  fn protocol(&self) -> &str;

  /// Current pools of this protocol on `network`.
  ///
  /// Returns an empty list where the protocol is not deployed.
  ///
  /// # Errors
  /// `Unimplemented` when no adapter exists; `SourceUnavailable` when
  /// the underlying data could not be fetched.
  async fn scan(&self, network: &NetworkConfig) -> AggregatorResult<Vec<Pool>>;
}
