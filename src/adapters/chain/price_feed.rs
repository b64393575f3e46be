//! On-chain Price Feeds - Chainlink-style Aggregator Contracts
//!
//! Reads `latestRoundData()` and `decimals()` through raw `eth_call`s.
//! Only tokens with a configured feed are covered; everything else
//! falls through to the off-chain sources.

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, I256, U256, keccak256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::provider::ChainManager;
use crate::config::PriceFeedConfig;
use crate::domain::error::{AggregatorError, AggregatorResult};
use crate::domain::network::NetworkId;
use crate::domain::price::{CacheKey, PriceSourceKind, TokenPrice};
use crate::ports::price_source::PriceSource;

const ORIGIN: &str = "chainlink";
const WORD: usize = 32;

/// One configured feed.
#[derive(Debug, Clone)]
struct FeedEntry {
    feed: Address,
    symbol: String,
    max_age: Duration,
}

/// Decoded `latestRoundData()` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundData {
    /// Signed answer in feed units.
    pub answer: I256,
    /// Unix seconds of the last update.
    pub updated_at: u64,
}

/// Decode the five-word `latestRoundData()` return
/// `(roundId, answer, startedAt, updatedAt, answeredInRound)`.
pub fn decode_round(data: &[u8]) -> AggregatorResult<RoundData> {
    if data.len() < 5 * WORD {
        return Err(AggregatorError::source(
            ORIGIN,
            format!("latestRoundData returned {} bytes", data.len()),
        ));
    }

    let answer = I256::from_raw(U256::from_be_slice(&data[WORD..2 * WORD]));
    let updated_at = U256::from_be_slice(&data[3 * WORD..4 * WORD]);
    let updated_at = u64::try_from(updated_at)
        .map_err(|_| AggregatorError::source(ORIGIN, "updatedAt out of range"))?;

    Ok(RoundData { answer, updated_at })
}

/// Scale a positive feed answer to a float price.
pub fn scale_answer(answer: I256, decimals: u8) -> Option<f64> {
    if answer <= I256::ZERO {
        return None;
    }
    let raw = u128::try_from(answer.into_raw()).ok()? as f64;
    Some(raw / 10f64.powi(i32::from(decimals)))
}

/// Price source reading on-chain aggregator contracts.
pub struct ChainlinkFeedSource {
    chains: ChainManager,
    feeds: HashMap<CacheKey, FeedEntry>,
    decimals: RwLock<HashMap<Address, u8>>,
}

impl ChainlinkFeedSource {
    /// Build from configured feeds.
    pub fn new(chains: ChainManager, feeds: &[PriceFeedConfig]) -> Self {
        let feeds = feeds
            .iter()
            .map(|f| {
                (
                    CacheKey::new(f.network, f.token),
                    FeedEntry {
                        feed: f.feed,
                        symbol: f.symbol.clone(),
                        max_age: Duration::from_secs(f.max_age_secs),
                    },
                )
            })
            .collect();

        Self {
            chains,
            feeds,
            decimals: RwLock::new(HashMap::new()),
        }
    }

    /// Number of configured feeds.
    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    async fn feed_decimals(&self, network: NetworkId, feed: Address) -> AggregatorResult<u8> {
        if let Some(d) = self.decimals.read().await.get(&feed) {
            return Ok(*d);
        }

        let word = self.call(network, feed, b"decimals()").await?;
        if word.len() < WORD {
            return Err(AggregatorError::source(ORIGIN, "decimals() returned a short word"));
        }
        let decimals = u8::try_from(U256::from_be_slice(&word[..WORD]))
            .map_err(|_| AggregatorError::source(ORIGIN, "decimals() out of range"))?;

        self.decimals.write().await.insert(feed, decimals);
        Ok(decimals)
    }

    async fn call(&self, network: NetworkId, to: Address, signature: &[u8]) -> AggregatorResult<Bytes> {
        let client = self.chains.client(network)?;
        let selector = Bytes::copy_from_slice(&keccak256(signature)[..4]);
        client
            .call(to, selector)
            .await
            .map_err(|e| AggregatorError::source(ORIGIN, format!("{e:#}")))
    }
}

#[async_trait]
impl PriceSource for ChainlinkFeedSource {
    fn kind(&self) -> PriceSourceKind {
        PriceSourceKind::Chainlink
    }

    #[instrument(skip(self), fields(source = ORIGIN))]
    async fn fetch_price(&self, network: NetworkId, token: Address) -> AggregatorResult<TokenPrice> {
        let entry = self
            .feeds
            .get(&CacheKey::new(network, token))
            .ok_or_else(|| AggregatorError::not_found("price feed", format!("{token} on {network}")))?;

        let decimals = self.feed_decimals(network, entry.feed).await?;
        let round = decode_round(&self.call(network, entry.feed, b"latestRoundData()").await?)?;

        let price = scale_answer(round.answer, decimals)
            .ok_or_else(|| AggregatorError::source(ORIGIN, format!("non-positive answer {}", round.answer)))?;

        let updated_at = i64::try_from(round.updated_at)
            .ok()
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .ok_or_else(|| AggregatorError::source(ORIGIN, "invalid updatedAt"))?;
        let age = (Utc::now() - updated_at).to_std().unwrap_or_default();
        if age > entry.max_age {
            return Err(AggregatorError::source(
                ORIGIN,
                format!("answer is {}s old, limit {}s", age.as_secs(), entry.max_age.as_secs()),
            ));
        }

        debug!(price, decimals, age_secs = age.as_secs(), "Feed answer read");

        let mut observation = TokenPrice::observed_now(network, token, entry.symbol.clone(), price, PriceSourceKind::Chainlink);
        observation.observed_at = updated_at;
        Ok(observation)
    }
}
