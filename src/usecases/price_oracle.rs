//! Price Oracle Use Case - Multi-source USD Pricing
//!
//! Resolves a USD price for a (network, token) pair:
//! 1. Return the cached observation if it is younger than the TTL
//! 2. Otherwise query sources in fixed priority order
//!    (on-chain feed → general aggregator → protocol aggregator)
//! 3. Cache and return the first usable answer
//! 4. If every source fails, return `PriceUnavailable`; cache untouched
//!
//! Also answers pool APY lookups against the yield listing (never cached).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::domain::error::{AggregatorError, AggregatorResult};
use crate::domain::network::NetworkId;
use crate::domain::price::{CacheKey, TokenPrice};
use crate::ports::price_source::PriceSource;
use crate::ports::yield_source::{YieldPoolRow, YieldSource};

/// Oracle tuning.
#[derive(Debug, Clone, Copy)]
pub struct OracleSettings {
  /// Maximum age of a cached price returned without refetching.
  pub cache_ttl: Duration,
  /// Timeout applied to each individual source fetch.
  pub fetch_timeout: Duration,
}

impl Default for OracleSettings {
  fn default() -> Self {
    Self {
      cache_ttl: Duration::from_secs(30),
      fetch_timeout: Duration::from_secs(10),
    }
  }
}

/// Cache entry with the local time it was stored.
#[derive(Debug, Clone)]
struct CachedPrice {
  price: TokenPrice,
  stored_at: Instant,
}

impl CachedPrice {
  fn is_fresh(&self, ttl: Duration) -> bool {
    self.stored_at.elapsed() < ttl
  }
}

/// Cumulative lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OracleStats {
  /// Lookups answered from the cache.
  pub cache_hits: u64,
  /// Lookups that went to the source pipeline.
  pub cache_misses: u64,
  /// Lookups where every source failed.
  pub unavailable: u64,
  /// Individual source failures (errors, timeouts, unusable answers).
  pub source_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
  cache_hits: AtomicU64,
  cache_misses: AtomicU64,
  unavailable: AtomicU64,
  source_failures: AtomicU64,
}

/// Multi-source price oracle with a TTL cache.
pub struct PriceOracle {
  /// Price sources, sorted by priority.
  sources: Vec<Arc<dyn PriceSource>>,
  /// Yield listing provider.
  yields: Arc<dyn YieldSource>,
  /// Current observation per (network, token).
  cache: RwLock<HashMap<CacheKey, CachedPrice>>,
  settings: OracleSettings,
  counters: Counters,
}

impl PriceOracle {
  /// Create an oracle. Sources are ordered by priority
  /// (`PriceSourceKind` order) regardless of the order given.
  pub fn new(
    mut sources: Vec<Arc<dyn PriceSource>>,
    yields: Arc<dyn YieldSource>,
    settings: OracleSettings,
  ) -> Self {
    sources.sort_by_key(|s| s.kind());

    Self {
      sources,
      yields,
      cache: RwLock::new(HashMap::new()),
      settings,
      counters: Counters::default(),
    }
  }

  /// USD price of `token` on `network`.
  ///
  /// # Errors
  /// `PriceUnavailable` if the cache is stale/empty and every source failed.
  pub async fn get_token_price(&self, network: NetworkId, token: Address) -> AggregatorResult<f64> {
    self.get_token_quote(network, token).await.map(|p| p.price_usd)
  }

  /// Full observation behind [`Self::get_token_price`].
  ///
  /// # Errors
  /// `PriceUnavailable` if the cache is stale/empty and every source failed.
  #[instrument(skip(self))]
  pub async fn get_token_quote(
    &self,
    network: NetworkId,
    token: Address,
  ) -> AggregatorResult<TokenPrice> {
    let key = CacheKey::new(network, token);

    if let Some(hit) = self.fresh_entry(&key).await {
      self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
      debug!(source = %hit.source, price = hit.price_usd, "Price cache hit");
      return Ok(hit);
    }
    self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);

    for source in &self.sources {
      let kind = source.kind();

      match timeout(self.settings.fetch_timeout, source.fetch_price(network, token)).await {
        Ok(Ok(price)) if price.is_usable() && price.key() == key => {
          self.store(price.clone()).await;
          debug!(
            source = %kind,
            price = price.price_usd,
            confidence = price.confidence,
            "Price resolved"
          );
          return Ok(price);
        }
        Ok(Ok(price)) => {
          self.counters.source_failures.fetch_add(1, Ordering::Relaxed);
          debug!(source = %kind, price = price.price_usd, "Unusable price, falling through");
        }
        Ok(Err(e)) => {
          self.counters.source_failures.fetch_add(1, Ordering::Relaxed);
          debug!(source = %kind, error = %e, "Price source failed, falling through");
        }
        Err(_) => {
          self.counters.source_failures.fetch_add(1, Ordering::Relaxed);
          warn!(
            source = %kind,
            timeout_ms = self.settings.fetch_timeout.as_millis(),
            "Price source timed out, falling through"
          );
        }
      }
    }

    self.counters.unavailable.fetch_add(1, Ordering::Relaxed);
    warn!(sources = self.sources.len(), "All price sources exhausted");
    Err(AggregatorError::PriceUnavailable { network, token })
  }

  /// APY of `pool` on `network` from the yield listing. Never cached.
  ///
  /// The address match is exact against the checksummed hex string.
  ///
  /// # Errors
  /// - `NotFound` if the listing does not cover the network or has no row for the pool
  /// - `YieldUnavailable` if the listing could not be fetched
  #[instrument(skip(self))]
  pub async fn get_apy(
    &self,
    protocol: &str,
    pool: Address,
    network: NetworkId,
  ) -> AggregatorResult<f64> {
    let chain = self.yields.chain_name(network).ok_or_else(|| {
      AggregatorError::not_found("network", format!("{network} in {}", self.yields.name()))
    })?;

    let listing = match timeout(self.settings.fetch_timeout, self.yields.fetch_listing()).await {
      Ok(Ok(rows)) => rows,
      Ok(Err(e)) => {
        warn!(source = self.yields.name(), error = %e, "Yield listing unavailable");
        return Err(AggregatorError::YieldUnavailable { network, pool });
      }
      Err(_) => {
        warn!(source = self.yields.name(), "Yield listing fetch timed out");
        return Err(AggregatorError::YieldUnavailable { network, pool });
      }
    };

    find_pool_apy(&listing, chain, pool).ok_or_else(|| {
      AggregatorError::not_found("pool APY", format!("{} on {chain}", pool.to_checksum(None)))
    })
  }

  /// Cached observation regardless of freshness.
  pub async fn peek_cache(&self, network: NetworkId, token: Address) -> Option<TokenPrice> {
    let cache = self.cache.read().await;
    cache
      .get(&CacheKey::new(network, token))
      .map(|entry| entry.price.clone())
  }

  /// Drop the cached observation for one key.
  pub async fn invalidate(&self, network: NetworkId, token: Address) -> bool {
    let mut cache = self.cache.write().await;
    cache.remove(&CacheKey::new(network, token)).is_some()
  }

  /// Evict every entry older than the TTL. Returns the number removed.
  pub async fn purge_expired(&self) -> usize {
    let ttl = self.settings.cache_ttl;
    let mut cache = self.cache.write().await;
    let before = cache.len();
    cache.retain(|_, entry| entry.is_fresh(ttl));
    let removed = before - cache.len();
    if removed > 0 {
      debug!(removed, "Expired prices purged");
    }
    removed
  }

  /// Number of cached entries, fresh or not.
  pub async fn cache_len(&self) -> usize {
    self.cache.read().await.len()
  }

  /// Cumulative lookup counters.
  pub fn stats(&self) -> OracleStats {
    OracleStats {
      cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
      cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
      unavailable: self.counters.unavailable.load(Ordering::Relaxed),
      source_failures: self.counters.source_failures.load(Ordering::Relaxed),
    }
  }

  /// Configured settings.
  pub const fn settings(&self) -> OracleSettings {
    self.settings
  }

  async fn fresh_entry(&self, key: &CacheKey) -> Option<TokenPrice> {
    let cache = self.cache.read().await;
    cache
      .get(key)
      .filter(|entry| entry.is_fresh(self.settings.cache_ttl))
      .map(|entry| entry.price.clone())
  }

  /// Last writer wins.
  async fn store(&self, price: TokenPrice) {
    let mut cache = self.cache.write().await;
    cache.insert(
      price.key(),
      CachedPrice {
        price,
        stored_at: Instant::now(),
      },
    );
  }
}

/// First listing row on `chain` whose address equals the checksummed pool address.
fn find_pool_apy(rows: &[YieldPoolRow], chain: &str, pool: Address) -> Option<f64> {
  let wanted = pool.to_checksum(None);
  rows
    .iter()
    .find(|row| row.chain == chain && row.address == wanted)
    .map(|row| row.apy.unwrap_or(0.0))
}
