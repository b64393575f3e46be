//! Network RPC Providers - alloy-rs 0.9 Connection Management
//!
//! One HTTP provider per configured network. Each connection validates
//! the remote chain id at startup; a network that fails to connect is
//! skipped without affecting the others. Every RPC call carries the
//! configured timeout.
//!
//! In alloy 0.9, `ProviderBuilder::new().on_http()` returns a complex
//! filler type. We store it as a type-erased `dyn Provider`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::config::ChainConfig;
use crate::domain::error::{AggregatorError, AggregatorResult};
use crate::domain::network::{NetworkConfig, NetworkId, NetworkRegistry};
use crate::ports::chain_client::ChainClient;

/// RPC provider for one network, backed by alloy-rs 0.9.
pub struct NetworkProvider {
    /// Network this provider is connected to.
    network: NetworkId,
    /// The alloy HTTP provider (type-erased).
    provider: Arc<dyn Provider + Send + Sync>,
    /// Timeout applied to every call.
    rpc_timeout: Duration,
}

impl NetworkProvider {
    /// Connect to `rpc_url` and validate that it serves `network`.
    #[instrument(skip_all, fields(network = network.id))]
    pub async fn connect(network: &NetworkConfig, rpc_url: &str, rpc_timeout: Duration) -> Result<Self> {
        // alloy 0.9: on_http() is synchronous, returns impl Provider
        let provider = ProviderBuilder::new().on_http(rpc_url.parse().context("Invalid RPC URL")?);
        let provider: Arc<dyn Provider + Send + Sync> = Arc::new(provider.boxed());

        let chain_id = timeout(rpc_timeout, provider.get_chain_id())
            .await
            .context("Timed out querying chain ID")?
            .context("Failed to query chain ID")?;

        if chain_id != network.id {
            anyhow::bail!("Expected {} (chain_id={}), got {chain_id}", network.name, network.id);
        }

        info!(chain_id, name = %network.name, "Connected to RPC");

        Ok(Self {
            network: network.id,
            provider,
            rpc_timeout,
        })
    }

    /// Get a shared reference to the alloy provider (type-erased).
    pub fn inner(&self) -> Arc<dyn Provider + Send + Sync> {
        Arc::clone(&self.provider)
    }
}

#[async_trait]
impl ChainClient for NetworkProvider {
    fn network_id(&self) -> NetworkId {
        self.network
    }

    async fn suggest_gas_price(&self) -> Result<U256> {
        let wei = timeout(self.rpc_timeout, self.provider.get_gas_price())
            .await
            .context("Timed out querying gas price")?
            .context("Failed to query gas price")?;
        Ok(U256::from(wei))
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().to(to).input(calldata.into());
        timeout(self.rpc_timeout, self.provider.call(&tx))
            .await
            .context("Timed out on eth_call")?
            .with_context(|| format!("eth_call to {to} failed"))
    }

    async fn is_healthy(&self) -> bool {
        matches!(
            timeout(self.rpc_timeout, self.provider.get_block_number()).await,
            Ok(Ok(_))
        )
    }
}

/// Connected chain clients keyed by network id.
#[derive(Default, Clone)]
pub struct ChainManager {
    clients: BTreeMap<NetworkId, Arc<dyn ChainClient>>,
}

impl ChainManager {
    /// Connect every network listed in `config`.
    ///
    /// The RPC URL is the explicit override if set, otherwise the
    /// registry template filled with the API key from the configured
    /// environment variable. Failures are logged and skipped.
    pub async fn connect_all(config: &ChainConfig, registry: &NetworkRegistry) -> Self {
        let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
        let mut clients: BTreeMap<NetworkId, Arc<dyn ChainClient>> = BTreeMap::new();

        for entry in &config.networks {
            let network = match registry.get(entry.id) {
                Ok(network) => network,
                Err(e) => {
                    warn!(network = entry.id, error = %e, "Skipping unregistered network");
                    continue;
                }
            };

            let rpc_url = entry
                .rpc_url
                .clone()
                .unwrap_or_else(|| network.rpc_url(&api_key));

            match NetworkProvider::connect(network, &rpc_url, config.rpc_timeout()).await {
                Ok(provider) => {
                    clients.insert(network.id, Arc::new(provider));
                }
                Err(e) => {
                    warn!(network = network.id, error = %e, "Failed to connect, network skipped");
                }
            }
        }

        info!(connected = clients.len(), configured = config.networks.len(), "Chain connections established");
        Self { clients }
    }

    /// Build from already-connected clients.
    pub fn from_clients(clients: impl IntoIterator<Item = Arc<dyn ChainClient>>) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.network_id(), c)).collect(),
        }
    }

    /// Client for `network`.
    ///
    /// # Errors
    /// `NotFound` if the network is not connected.
    pub fn client(&self, network: NetworkId) -> AggregatorResult<Arc<dyn ChainClient>> {
        self.clients
            .get(&network)
            .cloned()
            .ok_or_else(|| AggregatorError::not_found("chain client", network))
    }

    /// Connected network ids, ascending.
    pub fn connected_networks(&self) -> Vec<NetworkId> {
        self.clients.keys().copied().collect()
    }

    /// All connected clients.
    pub fn clients(&self) -> Vec<Arc<dyn ChainClient>> {
        self.clients.values().cloned().collect()
    }

    /// Whether every connected client answers.
    pub async fn all_healthy(&self) -> bool {
        for client in self.clients.values() {
            if !client.is_healthy().await {
                return false;
            }
        }
        true
    }
}
