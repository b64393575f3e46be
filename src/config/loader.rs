//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use crate::domain::network::NetworkRegistry;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str, registry: &NetworkRegistry) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content, registry)?;

  info!(
    networks = config.chain.networks.len(),
    protocols = config.catalog.protocols.len(),
    price_feeds = config.oracle.price_feeds.len(),
    cache_ttl_secs = config.oracle.cache_ttl_secs,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
///
/// # Errors
/// Parse or validation failure.
pub fn parse_config(content: &str, registry: &NetworkRegistry) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  validate_config(&config, registry)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Positive timeouts, TTLs and intervals
/// - Networks known to the registry, no duplicates
/// - Positive risk scores for wired protocols
/// - Non-empty source endpoints
fn validate_config(config: &AppConfig, registry: &NetworkRegistry) -> Result<()> {
  // Oracle validation
  anyhow::ensure!(
    config.oracle.cache_ttl_secs > 0,
    "oracle.cache_ttl_secs must be positive"
  );
  anyhow::ensure!(
    config.oracle.request_timeout_secs > 0,
    "oracle.request_timeout_secs must be positive"
  );
  anyhow::ensure!(
    config.oracle.max_requests_per_minute > 0,
    "oracle.max_requests_per_minute must be positive"
  );
  for (name, url) in [
    ("coingecko_url", &config.oracle.coingecko_url),
    ("llama_coins_url", &config.oracle.llama_coins_url),
    ("llama_yields_url", &config.oracle.llama_yields_url),
  ] {
    anyhow::ensure!(!url.is_empty(), "oracle.{name} must not be empty");
  }
  for feed in &config.oracle.price_feeds {
    anyhow::ensure!(
      registry.contains(feed.network),
      "Price feed for {} references unknown network {}",
      feed.symbol,
      feed.network
    );
    anyhow::ensure!(
      feed.max_age_secs > 0,
      "Price feed for {} has zero max_age_secs",
      feed.symbol
    );
  }

  // Chain validation
  anyhow::ensure!(
    config.chain.rpc_timeout_secs > 0,
    "chain.rpc_timeout_secs must be positive"
  );
  let mut seen = HashSet::new();
  for network in &config.chain.networks {
    anyhow::ensure!(
      registry.contains(network.id),
      "chain.networks contains unknown network {}",
      network.id
    );
    anyhow::ensure!(
      seen.insert(network.id),
      "chain.networks lists network {} twice",
      network.id
    );
  }

  // Catalog validation
  anyhow::ensure!(
    config.catalog.scan_interval_secs > 0,
    "catalog.scan_interval_secs must be positive"
  );
  for protocol in &config.catalog.protocols {
    anyhow::ensure!(
      protocol.risk_score > 0,
      "Protocol {} must have a positive risk_score",
      protocol.name
    );
    anyhow::ensure!(
      !protocol.project.is_empty(),
      "Protocol {} has empty project slug",
      protocol.name
    );
  }

  // Strategy validation
  anyhow::ensure!(
    config.strategies.monitor_interval_secs > 0,
    "strategies.monitor_interval_secs must be positive"
  );
  anyhow::ensure!(
    config.strategies.default_harvest_interval_secs > 0,
    "strategies.default_harvest_interval_secs must be positive"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  const MINIMAL: &str = r#"
    [service]
    name = "test"

    [oracle]
    coingecko_url = "https://api.coingecko.com/api/v3"
    llama_coins_url = "https://coins.llama.fi"
    llama_yields_url = "https://yields.llama.fi"

    [[oracle.price_feeds]]
    network = 1
    token = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
    feed = "0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419"
    symbol = "WETH"

    [chain]
    networks = [{ id = 1 }, { id = 137 }]

    [catalog]
    [[catalog.protocols]]
    name = "Aave"
    project = "aave-v3"
    kind = "lending"
    risk_score = 2
    networks = [1, 137, 42161]
  "#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml", &NetworkRegistry::builtin());
    assert!(result.is_err());
  }

  #[test]
  fn test_parse_minimal_applies_defaults() {
    let config = parse_config(MINIMAL, &NetworkRegistry::builtin()).unwrap();
    assert_eq!(config.oracle.cache_ttl_secs, 30);
    assert_eq!(config.chain.rpc_timeout_secs, 10);
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.strategies.default_harvest_interval_secs, 86_400);
    assert!(!config.persistence.enabled);
    assert_eq!(config.oracle.price_feeds[0].max_age_secs, 3600);
    assert_eq!(config.catalog.protocols[0].kind, crate::domain::pool::ProtocolKind::Lending);
  }

  #[test]
  fn test_unknown_network_rejected() {
    let bad = MINIMAL.replace("{ id = 137 }", "{ id = 56 }");
    let err = parse_config(&bad, &NetworkRegistry::builtin()).unwrap_err();
    assert!(err.to_string().contains("unknown network 56"));
  }

  #[test]
  fn test_zero_risk_score_rejected() {
    let bad = MINIMAL.replace("risk_score = 2", "risk_score = 0");
    assert!(parse_config(&bad, &NetworkRegistry::builtin()).is_err());
  }
}
