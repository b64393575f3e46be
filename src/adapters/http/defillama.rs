//! Protocol Market-data and Yield Aggregator Sources
//!
//! Prices: `GET {coins}/prices/current/{chain}:{address}` returning
//! `{"coins": {"{chain}:{address}": {"price", "symbol", "timestamp"}}}`.
//!
//! Yields: `GET {yields}/pools` returning `{"data": [...]}`, one row
//! per tracked pool.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::client::HttpJsonClient;
use crate::domain::error::{AggregatorError, AggregatorResult};
use crate::domain::network::NetworkId;
use crate::domain::price::{PriceSourceKind, TokenPrice};
use crate::ports::price_source::PriceSource;
use crate::ports::yield_source::{YieldPoolRow, YieldSource};

const PRICES_ORIGIN: &str = "defillama";
const YIELDS_ORIGIN: &str = "defillama-yields";

/// Chain prefix used in coin keys.
pub fn coins_chain(network: NetworkId) -> Option<&'static str> {
  match network {
    1 => Some("ethereum"),
    137 => Some("polygon"),
    42161 => Some("arbitrum"),
    10 => Some("optimism"),
    _ => None,
  }
}

/// Chain display name used in the yield listing.
pub fn yields_chain(network: NetworkId) -> Option<&'static str> {
  match network {
    1 => Some("Ethereum"),
    137 => Some("Polygon"),
    42161 => Some("Arbitrum"),
    10 => Some("Optimism"),
    _ => None,
  }
}

/// `{"coins": {...}}` body.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinsResponse {
  /// Quotes keyed by `chain:address`.
  #[serde(default)]
  pub coins: HashMap<String, CoinQuote>,
}

/// One coin quote.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinQuote {
  /// USD price.
  pub price: f64,
  /// Token symbol.
  #[serde(default)]
  pub symbol: String,
  /// Unix seconds of the quote.
  #[serde(default)]
  pub timestamp: Option<i64>,
}

impl CoinsResponse {
  /// Quote for `key`, tolerating address case differences in the echo.
  pub fn quote(&self, key: &str) -> Option<&CoinQuote> {
    self.coins.get(key).or_else(|| {
      self
        .coins
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, quote)| quote)
    })
  }
}

/// Price source backed by the protocol aggregator's coins API.
pub struct DefiLlamaPrices {
  client: Arc<HttpJsonClient>,
  base_url: String,
}

impl DefiLlamaPrices {
  /// Create a source against `base_url` (e.g. `https://coins.llama.fi`).
  pub fn new(client: Arc<HttpJsonClient>, base_url: impl Into<String>) -> Self {
    Self {
      client,
      base_url: base_url.into().trim_end_matches('/').to_string(),
    }
  }
}

#[async_trait]
impl PriceSource for DefiLlamaPrices {
  fn kind(&self) -> PriceSourceKind {
    PriceSourceKind::DefiLlama
  }

  #[instrument(skip(self), fields(source = PRICES_ORIGIN))]
  async fn fetch_price(&self, network: NetworkId, token: Address) -> AggregatorResult<TokenPrice> {
    let chain = coins_chain(network).ok_or_else(|| AggregatorError::not_found("defillama chain", network))?;
    let key = format!("{chain}:{}", token.to_checksum(None));
    let url = format!("{}/prices/current/{key}", self.base_url);

    let response: CoinsResponse = self.client.get_json(PRICES_ORIGIN, &url).await?;
    let quote = response
      .quote(&key)
      .ok_or_else(|| AggregatorError::source(PRICES_ORIGIN, format!("no quote for {key}")))?;

    let mut price = TokenPrice::observed_now(
      network,
      token,
      quote.symbol.clone(),
      quote.price,
      PriceSourceKind::DefiLlama,
    );
    if let Some(at) = quote.timestamp.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)) {
      price.observed_at = at;
    }

    debug!(price = price.price_usd, "Price fetched");
    Ok(price)
  }
}

#[derive(Debug, Deserialize)]
struct PoolsResponse {
  #[serde(default)]
  data: Vec<YieldPoolRow>,
}

/// Yield listing backed by the protocol aggregator's yields API.
pub struct DefiLlamaYields {
  client: Arc<HttpJsonClient>,
  base_url: String,
}

impl DefiLlamaYields {
  /// Create a source against `base_url` (e.g. `https://yields.llama.fi`).
  pub fn new(client: Arc<HttpJsonClient>, base_url: impl Into<String>) -> Self {
    Self {
      client,
      base_url: base_url.into().trim_end_matches('/').to_string(),
    }
  }
}

#[async_trait]
impl YieldSource for DefiLlamaYields {
  fn name(&self) -> &'static str {
    YIELDS_ORIGIN
  }

  fn chain_name(&self, network: NetworkId) -> Option<&'static str> {
    yields_chain(network)
  }

  #[instrument(skip(self), fields(source = YIELDS_ORIGIN))]
  async fn fetch_listing(&self) -> AggregatorResult<Vec<YieldPoolRow>> {
    let url = format!("{}/pools", self.base_url);
    let response: PoolsResponse = self.client.get_json(YIELDS_ORIGIN, &url).await?;
    debug!(rows = response.data.len(), "Yield listing fetched");
    Ok(response.data)
  }
}
