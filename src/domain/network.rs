//! Static registry of supported EVM networks.
//!
//! Reference entries for Ethereum, Polygon, Arbitrum and Optimism.
//! RPC endpoint templates carry a `%s` placeholder for the provider
//! API key, substituted at connection time.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{AggregatorError, AggregatorResult};

/// EIP-155 chain id.
pub type NetworkId = u64;

/// Network classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkKind {
    /// Settlement layer.
    L1,
    /// Rollup or sidechain.
    L2,
    /// Other EVM-compatible chain.
    Evm,
}

/// Static description of one network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Chain id.
    pub id: NetworkId,
    /// Display name.
    pub name: String,
    /// HTTP RPC endpoint template (`%s` = API key).
    pub rpc_url_template: String,
    /// WebSocket endpoint template, if the provider offers one.
    pub ws_url_template: Option<String>,
    /// Native gas token symbol.
    pub native_token: String,
    /// Protocol names the catalog scans on this network.
    pub supported_protocols: Vec<String>,
    /// Highest gas price worth paying for maintenance transactions.
    pub max_gas_price_gwei: f64,
    /// Average block time.
    pub average_block_time: Duration,
    /// Confirmations before a transaction is considered final.
    pub confirmations_required: u32,
    /// Classification.
    pub kind: NetworkKind,
}

impl NetworkConfig {
    /// Resolve the RPC URL template with the given API key.
    pub fn rpc_url(&self, api_key: &str) -> String {
        self.rpc_url_template.replace("%s", api_key)
    }

    /// Whether the catalog should scan the named protocol here.
    pub fn supports_protocol(&self, protocol: &str) -> bool {
        self.supported_protocols
            .iter()
            .any(|p| p.eq_ignore_ascii_case(protocol))
    }
}

/// Registry keyed by network id. Iteration order is by id.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    networks: BTreeMap<NetworkId, NetworkConfig>,
}

impl NetworkRegistry {
    /// Build a registry from explicit entries.
    pub fn new(entries: impl IntoIterator<Item = NetworkConfig>) -> Self {
        Self {
            networks: entries.into_iter().map(|n| (n.id, n)).collect(),
        }
    }

    /// The built-in reference table.
    pub fn builtin() -> Self {
        let protocols = |names: &[&str]| names.iter().map(|s| (*s).to_string()).collect();

        Self::new([
            NetworkConfig {
                id: 1,
                name: "Ethereum".into(),
                rpc_url_template: "https://eth-mainnet.g.alchemy.com/v2/%s".into(),
                ws_url_template: Some("wss://eth-mainnet.g.alchemy.com/v2/%s".into()),
                native_token: "ETH".into(),
                supported_protocols: protocols(&["Aave", "Compound", "Yearn", "Lido", "RocketPool"]),
                max_gas_price_gwei: 100.0,
                average_block_time: Duration::from_secs(12),
                confirmations_required: 12,
                kind: NetworkKind::L1,
            },
            NetworkConfig {
                id: 137,
                name: "Polygon".into(),
                rpc_url_template: "https://polygon-mainnet.g.alchemy.com/v2/%s".into(),
                ws_url_template: None,
                native_token: "MATIC".into(),
                supported_protocols: protocols(&["Aave", "Curve", "Balancer", "QuickSwap"]),
                max_gas_price_gwei: 500.0,
                average_block_time: Duration::from_secs(2),
                confirmations_required: 64,
                kind: NetworkKind::L2,
            },
            NetworkConfig {
                id: 42161,
                name: "Arbitrum".into(),
                rpc_url_template: "https://arb-mainnet.g.alchemy.com/v2/%s".into(),
                ws_url_template: None,
                native_token: "ETH".into(),
                supported_protocols: protocols(&["Aave", "GMX", "Radiant", "JonesDAO", "Socket"]),
                max_gas_price_gwei: 0.1,
                average_block_time: Duration::from_millis(250),
                confirmations_required: 20,
                kind: NetworkKind::L2,
            },
            NetworkConfig {
                id: 10,
                name: "Optimism".into(),
                rpc_url_template: "https://opt-mainnet.g.alchemy.com/v2/%s".into(),
                ws_url_template: None,
                native_token: "ETH".into(),
                supported_protocols: protocols(&["Aave", "Velodrome", "Beefy", "Stargate"]),
                max_gas_price_gwei: 0.001,
                average_block_time: Duration::from_secs(2),
                confirmations_required: 20,
                kind: NetworkKind::L2,
            },
        ])
    }

    /// Look up a network.
    ///
    /// # Errors
    /// `NotFound` if the id is not registered.
    pub fn get(&self, id: NetworkId) -> AggregatorResult<&NetworkConfig> {
        self.networks
            .get(&id)
            .ok_or_else(|| AggregatorError::not_found("network", id))
    }

    /// Whether the id is registered.
    pub fn contains(&self, id: NetworkId) -> bool {
        self.networks.contains_key(&id)
    }

    /// Registered ids, ascending.
    pub fn ids(&self) -> Vec<NetworkId> {
        self.networks.keys().copied().collect()
    }

    /// All registered networks, ascending by id.
    pub fn iter(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.values()
    }

    /// Number of registered networks.
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_reference_entries() {
        let registry = NetworkRegistry::builtin();
        assert_eq!(registry.ids(), vec![1, 10, 137, 42161]);
        assert_eq!(registry.get(137).unwrap().native_token, "MATIC");
        assert_eq!(registry.get(1).unwrap().kind, NetworkKind::L1);
    }

    #[test]
    fn test_unknown_network_is_not_found() {
        let registry = NetworkRegistry::builtin();
        assert!(matches!(
            registry.get(56),
            Err(AggregatorError::NotFound { what: "network", .. })
        ));
    }

    #[test]
    fn test_rpc_url_substitutes_key() {
        let registry = NetworkRegistry::builtin();
        let url = registry.get(10).unwrap().rpc_url("abc");
        assert_eq!(url, "https://opt-mainnet.g.alchemy.com/v2/abc");
    }

    #[test]
    fn test_supports_protocol_case_insensitive() {
        let registry = NetworkRegistry::builtin();
        let eth = registry.get(1).unwrap();
        assert!(eth.supports_protocol("aave"));
        assert!(!eth.supports_protocol("GMX"));
    }
}
