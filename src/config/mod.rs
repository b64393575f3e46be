//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Endpoints, price-feed contracts, protocol wiring and timing
//! parameters are externalized here; the RPC API key comes from
//! the environment variable named in `[chain]`.

pub mod loader;

use std::time::Duration;

use alloy::primitives::Address;
use serde::Deserialize;

use crate::domain::network::NetworkId;
use crate::domain::pool::ProtocolKind;

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Price oracle parameters and source endpoints.
  pub oracle: OracleConfig,
  /// Chain connections.
  pub chain: ChainConfig,
  /// Pool catalog scanning.
  pub catalog: CatalogConfig,
  /// Strategy monitoring.
  #[serde(default)]
  pub strategies: StrategiesConfig,
  /// Metrics and health probes.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Strategy snapshot persistence.
  #[serde(default)]
  pub persistence: PersistenceConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Price oracle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
  /// Cache time-to-live (seconds).
  #[serde(default = "default_cache_ttl")]
  pub cache_ttl_secs: u64,
  /// Timeout applied to each source fetch (seconds).
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
  /// General market-data aggregator base URL.
  pub coingecko_url: String,
  /// Protocol market-data aggregator base URL.
  pub llama_coins_url: String,
  /// Yield-data aggregator base URL.
  pub llama_yields_url: String,
  /// Outbound request budget shared by the HTTP sources.
  #[serde(default = "default_requests_per_minute")]
  pub max_requests_per_minute: u32,
  /// Retries on 429/5xx.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// On-chain price feeds.
  #[serde(default)]
  pub price_feeds: Vec<PriceFeedConfig>,
}

impl OracleConfig {
  /// Cache TTL as a `Duration`.
  pub const fn cache_ttl(&self) -> Duration {
    Duration::from_secs(self.cache_ttl_secs)
  }

  /// Per-fetch timeout as a `Duration`.
  pub const fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

/// One on-chain price-feed contract.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceFeedConfig {
  /// Network id.
  pub network: NetworkId,
  /// Priced token.
  pub token: Address,
  /// Aggregator contract exposing `latestRoundData()`.
  pub feed: Address,
  /// Token symbol.
  pub symbol: String,
  /// Oldest acceptable answer (seconds).
  #[serde(default = "default_feed_max_age")]
  pub max_age_secs: u64,
}

/// Chain connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
  /// Timeout for each RPC call (seconds).
  #[serde(default = "default_rpc_timeout")]
  pub rpc_timeout_secs: u64,
  /// Environment variable holding the RPC provider API key.
  #[serde(default = "default_api_key_env")]
  pub api_key_env: String,
  /// Networks to connect at startup.
  pub networks: Vec<ChainNetworkConfig>,
}

impl ChainConfig {
  /// RPC timeout as a `Duration`.
  pub const fn rpc_timeout(&self) -> Duration {
    Duration::from_secs(self.rpc_timeout_secs)
  }
}

/// One network to connect.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainNetworkConfig {
  /// Network id (must exist in the registry).
  pub id: NetworkId,
  /// Full RPC URL, overriding the registry template.
  pub rpc_url: Option<String>,
}

/// Pool catalog configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
  /// Interval between full scans (seconds).
  #[serde(default = "default_scan_interval")]
  pub scan_interval_secs: u64,
  /// Protocols backed by the yield listing.
  #[serde(default)]
  pub protocols: Vec<ProtocolConfig>,
}

/// Wiring of one protocol to the yield listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
  /// Protocol name as listed in the network registry.
  pub name: String,
  /// Project slug in the yield listing.
  pub project: String,
  /// Protocol category.
  pub kind: ProtocolKind,
  /// Risk score assigned to the protocol's pools.
  pub risk_score: u32,
  /// Networks the protocol is deployed on; all when absent.
  pub networks: Option<Vec<NetworkId>>,
}

/// Strategy monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategiesConfig {
  /// Interval between monitoring ticks (seconds).
  #[serde(default = "default_monitor_interval")]
  pub monitor_interval_secs: u64,
  /// Harvest interval for strategies that do not set one (seconds).
  #[serde(default = "default_harvest_interval")]
  pub default_harvest_interval_secs: u64,
}

impl Default for StrategiesConfig {
  fn default() -> Self {
    Self {
      monitor_interval_secs: default_monitor_interval(),
      default_harvest_interval_secs: default_harvest_interval(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Save strategies at shutdown and restore them at startup.
  #[serde(default)]
  pub enabled: bool,
  /// Directory for the snapshot file.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      data_dir: default_data_dir(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

const fn default_true() -> bool {
  true
}

const fn default_cache_ttl() -> u64 {
  30
}

const fn default_request_timeout() -> u64 {
  10
}

const fn default_requests_per_minute() -> u32 {
  30
}

const fn default_max_retries() -> u32 {
  2
}

const fn default_feed_max_age() -> u64 {
  3600
}

const fn default_rpc_timeout() -> u64 {
  10
}

fn default_api_key_env() -> String {
  "ALCHEMY_API_KEY".to_string()
}

const fn default_scan_interval() -> u64 {
  300
}

const fn default_monitor_interval() -> u64 {
  60
}

const fn default_harvest_interval() -> u64 {
  86_400
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

const fn default_health_port() -> u16 {
  8080
}

fn default_data_dir() -> String {
  "data".to_string()
}
