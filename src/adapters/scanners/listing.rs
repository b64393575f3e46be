//! Listing-backed Protocol Scanner
//!
//! Builds catalog pools for one protocol from the yield listing: rows
//! are matched by the listing's chain name and the protocol's project
//! slug. The listing itself is memoized briefly and shared by every
//! scanner so a full catalog scan fetches it once.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::config::ProtocolConfig;
use crate::domain::error::AggregatorResult;
use crate::domain::network::{NetworkConfig, NetworkId};
use crate::domain::pool::{Pool, ProtocolKind};
use crate::ports::protocol_scanner::ProtocolScanner;
use crate::ports::yield_source::{YieldPoolRow, YieldSource};

/// Yield listing memoized for a short period.
pub struct SharedListing {
    source: Arc<dyn YieldSource>,
    ttl: Duration,
    /// Held across the fetch so concurrent scanners share one request.
    memo: Mutex<Option<(Instant, Arc<Vec<YieldPoolRow>>)>>,
}

impl SharedListing {
    /// Memoize `source` for `ttl`.
    pub fn new(source: Arc<dyn YieldSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            memo: Mutex::new(None),
        }
    }

    /// The listing's chain name for `network`.
    pub fn chain_name(&self, network: NetworkId) -> Option<&'static str> {
        self.source.chain_name(network)
    }

    /// Current listing, fetched if the memo is older than the TTL.
    ///
    /// # Errors
    /// Propagates the source error; the previous memo is kept.
    pub async fn rows(&self) -> AggregatorResult<Arc<Vec<YieldPoolRow>>> {
        let mut memo = self.memo.lock().await;
        if let Some((at, rows)) = memo.as_ref() {
            if at.elapsed() < self.ttl {
                return Ok(Arc::clone(rows));
            }
        }

        let rows = Arc::new(self.source.fetch_listing().await?);
        *memo = Some((Instant::now(), Arc::clone(&rows)));
        Ok(rows)
    }
}

/// Scanner for one protocol, fed by the yield listing.
pub struct ListingScanner {
    protocol: String,
    project: String,
    kind: ProtocolKind,
    risk_score: u32,
    networks: Option<Vec<NetworkId>>,
    listing: Arc<SharedListing>,
}

impl ListingScanner {
    /// Build from protocol wiring.
    pub fn from_config(config: &ProtocolConfig, listing: Arc<SharedListing>) -> Self {
        Self {
            protocol: config.name.clone(),
            project: config.project.clone(),
            kind: config.kind,
            risk_score: config.risk_score,
            networks: config.networks.clone(),
            listing,
        }
    }

    fn deployed_on(&self, network: NetworkId) -> bool {
        self.networks
            .as_ref()
            .is_none_or(|ids| ids.contains(&network))
    }

    /// Convert one listing row; `None` when its address does not parse.
    fn to_pool(&self, network: NetworkId, row: &YieldPoolRow) -> Option<Pool> {
        let address = Address::from_str(row.address.trim()).ok()?;
        let id = row
            .pool
            .clone()
            .unwrap_or_else(|| format!("{network}:{}:{}", self.protocol.to_lowercase(), address.to_checksum(None)));

        Some(Pool {
            id,
            protocol: self.protocol.clone(),
            kind: self.kind,
            network,
            address,
            symbol: row.symbol.clone().unwrap_or_default(),
            token0: None,
            token1: None,
            apy: finite_or_zero(row.apy),
            tvl_usd: finite_or_zero(row.tvl_usd),
            risk_score: self.risk_score,
            deposited_amount: U256::ZERO,
            reward_tokens: row
                .reward_tokens
                .iter()
                .flatten()
                .filter_map(|t| Address::from_str(t.trim()).ok())
                .collect(),
        })
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[async_trait]
impl ProtocolScanner for ListingScanner {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    #[instrument(skip(self, network), fields(protocol = %self.protocol, network = network.id))]
    async fn scan(&self, network: &NetworkConfig) -> AggregatorResult<Vec<Pool>> {
        if !self.deployed_on(network.id) {
            return Ok(Vec::new());
        }
        let Some(chain) = self.listing.chain_name(network.id) else {
            return Ok(Vec::new());
        };

        let rows = self.listing.rows().await?;
        let pools: Vec<Pool> = rows
            .iter()
            .filter(|row| row.chain == chain && row.project.eq_ignore_ascii_case(&self.project))
            .filter_map(|row| self.to_pool(network.id, row))
            .collect();

        debug!(pools = pools.len(), "Listing scanned");
        Ok(pools)
    }
}
