//! Price Source Port - USD Price Providers
//!
//! Each source maps the generic (network, token) key into its own
//! addressing scheme and stamps its own confidence score. The oracle
//! queries sources in priority order and caches the first usable answer.

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::domain::error::AggregatorResult;
use crate::domain::network::NetworkId;
use crate::domain::price::{PriceSourceKind, TokenPrice};

/// A provider of USD token prices.
#[async_trait]
pub trait PriceSource: Send + Sync + 'static {
  /// Which source this is.
  fn kind(&self) -> PriceSourceKind;

  /// Fetch the current price of `token` on `network`.
  ///
  /// # Errors
  /// `SourceUnavailable` on network errors, malformed payloads, or
  /// networks/tokens the source does not cover.
  async fn fetch_price(&self, network: NetworkId, token: Address) -> AggregatorResult<TokenPrice>;
}
