//! Priced observations and the oracle cache key.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::network::NetworkId;

/// Where a price observation came from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSourceKind {
    /// On-chain price-feed aggregator contract.
    Chainlink,
    /// General market-data aggregator.
    Coingecko,
    /// Protocol-specific market-data aggregator.
    DefiLlama,
}

impl PriceSourceKind {
    /// Reliability weight attached to observations from this source.
    pub const fn confidence(self) -> f64 {
        match self {
            Self::Chainlink => 0.99,
            Self::Coingecko => 0.95,
            Self::DefiLlama => 0.90,
        }
    }
}

impl std::fmt::Display for PriceSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chainlink => write!(f, "chainlink"),
            Self::Coingecko => write!(f, "coingecko"),
            Self::DefiLlama => write!(f, "defillama"),
        }
    }
}

/// Addresses exactly one current price in the oracle cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Network id.
    pub network: NetworkId,
    /// Token contract address.
    pub token: Address,
}

impl CacheKey {
    /// Build a key.
    pub const fn new(network: NetworkId, token: Address) -> Self {
        Self { network, token }
    }
}

/// A priced observation. Superseded by newer observations, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    /// Token contract address.
    pub token: Address,
    /// Token symbol, empty when the source does not report it.
    pub symbol: String,
    /// USD price.
    pub price_usd: f64,
    /// Originating source.
    pub source: PriceSourceKind,
    /// Reliability weight in [0, 1].
    pub confidence: f64,
    /// When the observation was produced.
    pub observed_at: DateTime<Utc>,
    /// Network id.
    pub network: NetworkId,
}

impl TokenPrice {
    /// Observation stamped now with the source's default confidence.
    pub fn observed_now(
        network: NetworkId,
        token: Address,
        symbol: impl Into<String>,
        price_usd: f64,
        source: PriceSourceKind,
    ) -> Self {
        Self {
            token,
            symbol: symbol.into(),
            price_usd,
            source,
            confidence: source.confidence(),
            observed_at: Utc::now(),
            network,
        }
    }

    /// Cache key of this observation.
    pub const fn key(&self) -> CacheKey {
        CacheKey::new(self.network, self.token)
    }

    /// A price the oracle may cache and return: finite, positive,
    /// with a confidence in [0, 1].
    pub fn is_usable(&self) -> bool {
        self.price_usd.is_finite()
            && self.price_usd > 0.0
            && (0.0..=1.0).contains(&self.confidence)
    }
}
