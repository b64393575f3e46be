//! General Market-data Aggregator Source
//!
//! `GET {base}/coins/{platform}/contract/{address}` where the platform
//! slug is derived from the network id. The USD price sits at
//! `market_data.current_price.usd`.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::client::HttpJsonClient;
use crate::domain::error::{AggregatorError, AggregatorResult};
use crate::domain::network::NetworkId;
use crate::domain::price::{PriceSourceKind, TokenPrice};
use crate::ports::price_source::PriceSource;

const ORIGIN: &str = "coingecko";

/// Platform slug for a network id.
pub fn platform(network: NetworkId) -> Option<&'static str> {
  match network {
    1 => Some("ethereum"),
    137 => Some("polygon-pos"),
    42161 => Some("arbitrum-one"),
    10 => Some("optimistic-ethereum"),
    _ => None,
  }
}

/// Contract lookup response (fields we read).
#[derive(Debug, Clone, Deserialize)]
pub struct ContractResponse {
  /// Token symbol, lowercase as published.
  #[serde(default)]
  pub symbol: Option<String>,
  /// Market data block.
  #[serde(default)]
  pub market_data: Option<MarketData>,
}

/// Market data block.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketData {
  /// Price keyed by quote currency.
  #[serde(default)]
  pub current_price: HashMap<String, f64>,
}

impl ContractResponse {
  /// USD price, if present.
  pub fn usd_price(&self) -> Option<f64> {
    self
      .market_data
      .as_ref()
      .and_then(|m| m.current_price.get("usd"))
      .copied()
  }
}

/// Price source backed by the general aggregator API.
pub struct CoinGeckoSource {
  client: Arc<HttpJsonClient>,
  base_url: String,
}

impl CoinGeckoSource {
  /// Create a source against `base_url` (e.g. `https://api.coingecko.com/api/v3`).
  pub fn new(client: Arc<HttpJsonClient>, base_url: impl Into<String>) -> Self {
    Self {
      client,
      base_url: base_url.into().trim_end_matches('/').to_string(),
    }
  }

  fn contract_url(&self, platform: &str, token: Address) -> String {
    format!(
      "{}/coins/{platform}/contract/{}",
      self.base_url,
      token.to_checksum(None)
    )
  }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
  fn kind(&self) -> PriceSourceKind {
    PriceSourceKind::Coingecko
  }

  #[instrument(skip(self), fields(source = ORIGIN))]
  async fn fetch_price(&self, network: NetworkId, token: Address) -> AggregatorResult<TokenPrice> {
    let platform = platform(network).ok_or_else(|| AggregatorError::not_found("coingecko platform", network))?;

    let response: ContractResponse = self
      .client
      .get_json(ORIGIN, &self.contract_url(platform, token))
      .await?;

    let price = response
      .usd_price()
      .ok_or_else(|| AggregatorError::source(ORIGIN, "market_data.current_price.usd missing"))?;

    debug!(price, "Price fetched");
    Ok(TokenPrice::observed_now(
      network,
      token,
      response.symbol.unwrap_or_default().to_uppercase(),
      price,
      PriceSourceKind::Coingecko,
    ))
  }
}
