//! DeFi Yield Aggregator — Entry Point
//!
//! Initializes configuration, logging, chain connections, the price
//! oracle, the pool catalog and the strategy manager. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config (path from AGGREGATOR_CONFIG, default config.toml) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Connect every configured network (failures skipped)
//! 4. Build price sources: on-chain feeds → general aggregator → protocol aggregator
//! 5. Build the pool catalog from the protocol wiring
//! 6. Build the strategy manager (gas-gated monitors), restore the snapshot
//! 7. Spawn metrics (:9090) and health (/live + /ready) servers
//! 8. Spawn the catalog scan loop and the maintenance loop
//! 9. Wait for SIGINT → stop monitors → save snapshot → exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use defi_yield_aggregator::adapters::chain::{ChainManager, ChainlinkFeedSource};
use defi_yield_aggregator::adapters::execution::UnwiredExecution;
use defi_yield_aggregator::adapters::http::{
  CoinGeckoSource, DefiLlamaPrices, DefiLlamaYields, HttpClientConfig, HttpJsonClient,
};
use defi_yield_aggregator::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use defi_yield_aggregator::adapters::persistence::SnapshotStore;
use defi_yield_aggregator::adapters::scanners::{ListingScanner, SharedListing, UnwiredScanner};
use defi_yield_aggregator::config::{self, AppConfig, CatalogConfig};
use defi_yield_aggregator::domain::network::NetworkRegistry;
use defi_yield_aggregator::ports::price_source::PriceSource;
use defi_yield_aggregator::ports::protocol_scanner::ProtocolScanner;
use defi_yield_aggregator::ports::repository::StrategyRepository;
use defi_yield_aggregator::ports::yield_source::YieldSource;
use defi_yield_aggregator::usecases::{
  GasOracle, ManagerSettings, OracleSettings, PoolCatalog, PriceOracle, StrategyManager,
};

/// How long the yield listing is shared between scanners.
const LISTING_MEMO_TTL: Duration = Duration::from_secs(60);
/// Period of the cache purge / metrics refresh loop.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
  // ── 1. Load configuration ───────────────────────────────
  let registry = Arc::new(NetworkRegistry::builtin());
  let config_path = std::env::var("AGGREGATOR_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
  let config = config::loader::load_config(&config_path, &registry)
    .with_context(|| format!("Failed to load configuration from {config_path}"))?;

  // ── 2. Initialize structured JSON logging ───────────────
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
    )
    .json()
    .init();

  info!(
    name = %config.service.name,
    version = env!("CARGO_PKG_VERSION"),
    networks = registry.len(),
    protocols = config.catalog.protocols.len(),
    price_feeds = config.oracle.price_feeds.len(),
    "Starting DeFi Yield Aggregator"
  );

  let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

  // ── 3. Chain connections ────────────────────────────────
  let chains = ChainManager::connect_all(&config.chain, &registry).await;

  // ── 4. Price oracle ─────────────────────────────────────
  let http = Arc::new(
    HttpJsonClient::new(HttpClientConfig {
      timeout: config.oracle.request_timeout(),
      max_requests_per_minute: config.oracle.max_requests_per_minute,
      max_retries: config.oracle.max_retries,
      ..HttpClientConfig::default()
    })
    .context("Failed to create HTTP client")?,
  );

  let yields: Arc<dyn YieldSource> =
    Arc::new(DefiLlamaYields::new(Arc::clone(&http), &config.oracle.llama_yields_url));
  let sources: Vec<Arc<dyn PriceSource>> = vec![
    Arc::new(ChainlinkFeedSource::new(chains.clone(), &config.oracle.price_feeds)),
    Arc::new(CoinGeckoSource::new(Arc::clone(&http), &config.oracle.coingecko_url)),
    Arc::new(DefiLlamaPrices::new(Arc::clone(&http), &config.oracle.llama_coins_url)),
  ];
  let oracle = Arc::new(PriceOracle::new(
    sources,
    Arc::clone(&yields),
    OracleSettings {
      cache_ttl: config.oracle.cache_ttl(),
      fetch_timeout: config.oracle.request_timeout(),
    },
  ));

  // ── 5. Pool catalog ─────────────────────────────────────
  let listing = Arc::new(SharedListing::new(yields, LISTING_MEMO_TTL));
  let scanners = build_scanners(&config.catalog, &registry, &listing);
  let catalog = Arc::new(PoolCatalog::new(Arc::clone(&registry), scanners));

  // ── 6. Strategy manager ─────────────────────────────────
  let gas = Arc::new(GasOracle::new(Arc::clone(&registry), chains.clients()));
  let manager = Arc::new(
    StrategyManager::new(
      Arc::clone(&registry),
      Arc::clone(&oracle),
      Arc::new(UnwiredExecution),
      ManagerSettings {
        monitor_interval: Duration::from_secs(config.strategies.monitor_interval_secs),
        default_harvest_interval: Duration::from_secs(config.strategies.default_harvest_interval_secs),
      },
    )
    .with_gas_oracle(Arc::clone(&gas)),
  );

  let repository: Option<Arc<dyn StrategyRepository>> = if config.persistence.enabled {
    let store = SnapshotStore::new(&config.persistence.data_dir)
      .await
      .context("Failed to open snapshot store")?;
    Some(Arc::new(store))
  } else {
    None
  };

  if let Some(repo) = &repository {
    match repo.load_snapshot().await {
      Ok(Some(snapshot)) => {
        let loaded = manager.restore(snapshot).await;
        info!(loaded, "Strategies restored from snapshot");
      }
      Ok(None) => {}
      Err(e) => warn!(error = %e, "Failed to load strategy snapshot, starting empty"),
    }
  }

  // ── 7. Metrics + health servers ─────────────────────────
  let health = Arc::new(HealthState::new());
  health
    .chain_healthy
    .store(!chains.connected_networks().is_empty(), Ordering::Relaxed);
  let metrics = if config.metrics.enabled {
    Some(Arc::new(MetricsRegistry::new().context("Failed to register metrics")?))
  } else {
    None
  };

  let mut handles = Vec::new();

  if let Some(metrics) = &metrics {
    let server = Arc::clone(metrics);
    let bind = config.metrics.bind_address.clone();
    let rx = shutdown_tx.subscribe();
    handles.push(tokio::spawn(async move {
      if let Err(e) = server.serve(bind, rx).await {
        error!(error = %e, "Metrics server failed");
      }
    }));
  }

  let health_server = HealthServer::new(Arc::clone(&health), config.metrics.health_port);
  let health_rx = shutdown_tx.subscribe();
  handles.push(tokio::spawn(async move {
    if let Err(e) = health_server.run(health_rx).await {
      error!(error = %e, "Health server failed");
    }
  }));

  // ── 8. Background loops ─────────────────────────────────
  handles.push(tokio::spawn(run_catalog_loop(
    Arc::clone(&catalog),
    Duration::from_secs(config.catalog.scan_interval_secs),
    metrics.clone(),
    Arc::clone(&health),
    shutdown_tx.subscribe(),
  )));

  handles.push(tokio::spawn(run_maintenance_loop(
    config.clone(),
    Arc::clone(&oracle),
    Arc::clone(&manager),
    chains.clone(),
    Arc::clone(&gas),
    metrics.clone(),
    Arc::clone(&health),
    shutdown_tx.subscribe(),
  )));

  info!(connected = ?chains.connected_networks(), "All tasks spawned, aggregator is running");

  // ── 9. Wait for SIGINT ──────────────────────────────────
  if let Err(e) = signal::ctrl_c().await {
    error!(error = %e, "Failed to listen for SIGINT");
  }
  info!("SIGINT received, initiating graceful shutdown");

  // 1. Signal all tasks to stop
  let _ = shutdown_tx.send(());
  // /ready answers 503 from here on
  health.catalog_scanned.store(false, Ordering::Relaxed);

  // 2. Stop every strategy monitor
  manager.shutdown().await;

  // 3. Persist strategies
  if let Some(repo) = &repository {
    if let Err(e) = repo.save_snapshot(&manager.snapshot().await).await {
      error!(error = %e, "Failed to save strategy snapshot");
    }
  }

  // 4. Wait for background tasks (up to 10s)
  let _ = tokio::time::timeout(Duration::from_secs(10), futures_util::future::join_all(handles)).await;

  info!("Shutdown complete");
  Ok(())
}

/// One scanner per protocol named anywhere in the registry: listing
/// scanners for configured protocols, placeholders for the rest.
fn build_scanners(
  catalog: &CatalogConfig,
  registry: &NetworkRegistry,
  listing: &Arc<SharedListing>,
) -> Vec<Arc<dyn ProtocolScanner>> {
  let mut scanners: Vec<Arc<dyn ProtocolScanner>> = Vec::new();
  let mut wired = HashSet::new();

  for protocol in &catalog.protocols {
    if wired.insert(protocol.name.to_ascii_lowercase()) {
      scanners.push(Arc::new(ListingScanner::from_config(protocol, Arc::clone(listing))));
    }
  }

  for network in registry.iter() {
    for protocol in &network.supported_protocols {
      if wired.insert(protocol.to_ascii_lowercase()) {
        scanners.push(Arc::new(UnwiredScanner::new(protocol.clone())));
      }
    }
  }

  info!(
    wired = catalog.protocols.len(),
    total = scanners.len(),
    "Protocol scanners built"
  );
  scanners
}

/// Rescan every network on a fixed period until shutdown.
async fn run_catalog_loop(
  catalog: Arc<PoolCatalog>,
  period: Duration,
  metrics: Option<Arc<MetricsRegistry>>,
  health: Arc<HealthState>,
  mut shutdown_rx: broadcast::Receiver<()>,
) {
  let mut ticker = tokio::time::interval(period);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      biased;
      _ = shutdown_rx.recv() => {
        info!("Catalog loop received shutdown signal");
        break;
      }
      _ = ticker.tick() => {
        let started = Instant::now();
        match catalog.scan_all_networks().await {
          Ok(report) => {
            health.catalog_scanned.store(true, Ordering::Relaxed);
            if let Some(metrics) = &metrics {
              metrics.record_scan(&report, started.elapsed().as_secs_f64());
            }
          }
          Err(e) => warn!(error = %e, "Catalog scan failed"),
        }
      }
    }
  }
}

/// Purge expired prices, refresh chain health and copy counters into
/// the metrics registry until shutdown.
#[allow(clippy::too_many_arguments)]
async fn run_maintenance_loop(
  config: AppConfig,
  oracle: Arc<PriceOracle>,
  manager: Arc<StrategyManager>,
  chains: ChainManager,
  gas: Arc<GasOracle>,
  metrics: Option<Arc<MetricsRegistry>>,
  health: Arc<HealthState>,
  mut shutdown_rx: broadcast::Receiver<()>,
) {
  let connected = chains.connected_networks();
  let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);

  loop {
    tokio::select! {
      biased;
      _ = shutdown_rx.recv() => {
        info!("Maintenance loop received shutdown signal");
        break;
      }
      _ = ticker.tick() => {
        oracle.purge_expired().await;
        let chains_ready = !connected.is_empty() && chains.all_healthy().await;
        health.chain_healthy.store(chains_ready, Ordering::Relaxed);

        let Some(metrics) = &metrics else {
          continue;
        };
        metrics.record_oracle(&oracle.stats(), oracle.cache_len().await);
        metrics.record_strategies(&manager.stats(), manager.active_count().await, manager.monitor_count().await);
        for entry in &config.chain.networks {
          metrics.record_connection(entry.id, connected.contains(&entry.id));
        }
        for network in gas.networks() {
          if let Some(gwei) = gas.cached_gas_gwei(network) {
            metrics.record_gas(network, gwei);
          }
        }
      }
    }
  }
}
