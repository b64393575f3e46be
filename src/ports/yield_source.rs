//! Yield Source Port - Pool Yield Listings
//!
//! A yield-data aggregator publishes one listing of every pool it
//! tracks. The oracle scans it for a single pool's APY and the
//! listing scanner builds catalog pools from it.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::error::AggregatorResult;
use crate::domain::network::NetworkId;

/// One row of the yield listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldPoolRow {
  /// Chain display name, e.g. "Ethereum".
  pub chain: String,
  /// Project slug, e.g. "aave-v3".
  pub project: String,
  /// Current APY. Missing values read as 0 (unknown).
  #[serde(default)]
  pub apy: Option<f64>,
  /// Total value locked (USD).
  #[serde(default)]
  pub tvl_usd: Option<f64>,
  /// Pool contract address (hex string as published).
  #[serde(default)]
  pub address: String,
  /// Aggregator-side pool id.
  #[serde(default)]
  pub pool: Option<String>,
  /// Display symbol.
  #[serde(default)]
  pub symbol: Option<String>,
  /// Reward token contracts.
  #[serde(default)]
  pub reward_tokens: Option<Vec<String>>,
}

/// A provider of the pool yield listing.
#[async_trait]
pub trait YieldSource: Send + Sync + 'static {
  /// Source name for logs and errors.
  fn name(&self) -> &'static str;

  /// The listing's chain name for `network`, if covered.
  fn chain_name(&self, network: NetworkId) -> Option<&'static str>;

  /// Fetch the full listing.
  ///
  /// # Errors
  /// `SourceUnavailable` on network errors or malformed payloads.
  async fn fetch_listing(&self) -> AggregatorResult<Vec<YieldPoolRow>>;
}
