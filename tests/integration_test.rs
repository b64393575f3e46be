//! Integration Tests - End-to-end Aggregator Component Testing
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256, address};
use async_trait::async_trait;
use mockall::mock;
use tokio_test::{assert_err, assert_ok};

use defi_yield_aggregator::adapters::execution::UnwiredExecution;
use defi_yield_aggregator::domain::error::{AggregatorError, AggregatorResult};
use defi_yield_aggregator::domain::network::{NetworkConfig, NetworkId, NetworkRegistry};
use defi_yield_aggregator::domain::pool::{Pool, ProtocolKind};
use defi_yield_aggregator::domain::price::{PriceSourceKind, TokenPrice};
use defi_yield_aggregator::domain::strategy::{StrategyKind, StrategyParams};
use defi_yield_aggregator::domain::fees::FeeSchedule;
use defi_yield_aggregator::ports::chain_client::ChainClient;
use defi_yield_aggregator::ports::execution::{
    ExecutionAdapter, HarvestOutcome, PositionTarget, TransactionResult,
};
use defi_yield_aggregator::ports::price_source::PriceSource;
use defi_yield_aggregator::ports::protocol_scanner::ProtocolScanner;
use defi_yield_aggregator::ports::yield_source::{YieldPoolRow, YieldSource};
use defi_yield_aggregator::usecases::{
    GasOracle, ManagerSettings, OracleSettings, PoolCatalog, PriceOracle, StrategyManager,
};

// ---- Mock Definitions ----

mock! {
    pub Source {}

    #[async_trait::async_trait]
    impl PriceSource for Source {
        fn kind(&self) -> PriceSourceKind;
        async fn fetch_price(&self, network: NetworkId, token: Address) -> AggregatorResult<TokenPrice>;
    }
}

mock! {
    pub Exec {}

    #[async_trait::async_trait]
    impl ExecutionAdapter for Exec {
        async fn deposit(
            &self,
            target: &PositionTarget,
            user: Address,
            amount: U256,
        ) -> AggregatorResult<TransactionResult>;

        async fn withdraw(
            &self,
            target: &PositionTarget,
            user: Address,
            amount: U256,
        ) -> AggregatorResult<TransactionResult>;

        async fn harvest(&self, target: &PositionTarget) -> AggregatorResult<HarvestOutcome>;

        async fn pending_rewards(&self, target: &PositionTarget) -> AggregatorResult<U256>;
    }
}

// ---- Hand-written Stubs ----

/// Yield listing with fixed rows, or a failing fetch.
struct StaticYields {
    rows: Vec<YieldPoolRow>,
    fail: bool,
}

#[async_trait]
impl YieldSource for StaticYields {
    fn name(&self) -> &'static str {
        "static"
    }

    fn chain_name(&self, network: NetworkId) -> Option<&'static str> {
        match network {
            1 => Some("Ethereum"),
            137 => Some("Polygon"),
            _ => None,
        }
    }

    async fn fetch_listing(&self) -> AggregatorResult<Vec<YieldPoolRow>> {
        if self.fail {
            return Err(AggregatorError::source("static", "HTTP 503"));
        }
        Ok(self.rows.clone())
    }
}

/// Price source that never answers within the oracle timeout.
struct SlowSource;

#[async_trait]
impl PriceSource for SlowSource {
    fn kind(&self) -> PriceSourceKind {
        PriceSourceKind::Chainlink
    }

    async fn fetch_price(&self, network: NetworkId, token: Address) -> AggregatorResult<TokenPrice> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(TokenPrice::observed_now(network, token, "SLOW", 1.0, PriceSourceKind::Chainlink))
    }
}

/// Scanner returning fixed pools for one network; can be switched to fail.
struct StubScanner {
    protocol: String,
    network: NetworkId,
    pools: Vec<Pool>,
    failing: AtomicBool,
}

#[async_trait]
impl ProtocolScanner for StubScanner {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    async fn scan(&self, network: &NetworkConfig) -> AggregatorResult<Vec<Pool>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AggregatorError::source(self.protocol.clone(), "rpc down"));
        }
        if network.id != self.network {
            return Ok(Vec::new());
        }
        Ok(self.pools.clone())
    }
}

/// Chain client with a fixed gas price.
struct FixedGas {
    network: NetworkId,
    gwei: u64,
}

#[async_trait]
impl ChainClient for FixedGas {
    fn network_id(&self) -> NetworkId {
        self.network
    }

    async fn suggest_gas_price(&self) -> anyhow::Result<U256> {
        Ok(U256::from(self.gwei) * U256::from(1_000_000_000u64))
    }

    async fn call(&self, _to: Address, _calldata: Bytes) -> anyhow::Result<Bytes> {
        anyhow::bail!("eth_call not supported by FixedGas")
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

// ---- Helpers ----

const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
const AAVE_POLYGON: Address = address!("794a61358D6845594F94dc1DB02A252b5b4814aD");

fn registry() -> Arc<NetworkRegistry> {
    Arc::new(NetworkRegistry::builtin())
}

fn yields(rows: Vec<YieldPoolRow>) -> Arc<dyn YieldSource> {
    Arc::new(StaticYields { rows, fail: false })
}

fn listing_row(chain: &str, pool: Address, apy: f64) -> YieldPoolRow {
    YieldPoolRow {
        chain: chain.to_string(),
        project: "aave-v3".to_string(),
        apy: Some(apy),
        tvl_usd: Some(5.0e8),
        address: pool.to_checksum(None),
        pool: None,
        symbol: Some("USDC".to_string()),
        reward_tokens: None,
    }
}

fn mock_source(kind: PriceSourceKind) -> MockSource {
    let mut source = MockSource::new();
    source.expect_kind().return_const(kind);
    source
}

fn oracle_with(sources: Vec<Arc<dyn PriceSource>>, settings: OracleSettings) -> PriceOracle {
    PriceOracle::new(sources, yields(Vec::new()), settings)
}

fn pool(id: &str, apy: f64, risk: u32) -> Pool {
    Pool {
        id: id.to_string(),
        protocol: "Aave".to_string(),
        kind: ProtocolKind::Lending,
        network: 137,
        address: Address::ZERO,
        symbol: id.to_uppercase(),
        token0: None,
        token1: None,
        apy,
        tvl_usd: 1.0e6,
        risk_score: risk,
        deposited_amount: U256::ZERO,
        reward_tokens: Vec::new(),
    }
}

fn strategy_params(network: NetworkId, pool: Address) -> StrategyParams {
    StrategyParams {
        name: "USDC lending".to_string(),
        kind: StrategyKind::AutoCompound,
        network,
        protocol: "Aave".to_string(),
        pool_address: pool.to_checksum(None),
        expected_apy: 4.0,
        tvl_usd: 1.0e8,
        risk_tolerance: 2,
        min_deposit: U256::from(1u64),
        max_deposit: U256::from(1_000_000_000u64),
        fees: FeeSchedule::default(),
        harvest_interval: Some(Duration::from_secs(3600)),
        deposit_token: None,
        parameters: Default::default(),
    }
}

fn slow_monitors() -> ManagerSettings {
    ManagerSettings {
        monitor_interval: Duration::from_secs(3600),
        default_harvest_interval: Duration::from_secs(86_400),
    }
}

fn fast_monitors() -> ManagerSettings {
    ManagerSettings {
        monitor_interval: Duration::from_millis(20),
        default_harvest_interval: Duration::from_secs(86_400),
    }
}

fn manager_with(executor: Arc<dyn ExecutionAdapter>, settings: ManagerSettings) -> StrategyManager {
    let oracle = Arc::new(oracle_with(Vec::new(), OracleSettings::default()));
    StrategyManager::new(registry(), oracle, executor, settings)
}

// ---- Price Oracle Tests ----

#[tokio::test]
async fn test_cache_hit_skips_sources() {
    let mut source = mock_source(PriceSourceKind::Coingecko);
    source
        .expect_fetch_price()
        .times(1)
        .returning(|network, token| {
            Ok(TokenPrice::observed_now(network, token, "WETH", 1800.5, PriceSourceKind::Coingecko))
        });

    let oracle = oracle_with(vec![Arc::new(source)], OracleSettings::default());

    let first = oracle.get_token_price(1, WETH).await.unwrap();
    let second = oracle.get_token_price(1, WETH).await.unwrap();

    assert!((first - 1800.5).abs() < f64::EPSILON);
    assert!((second - 1800.5).abs() < f64::EPSILON);
    assert_eq!(oracle.stats().cache_hits, 1);
    assert_eq!(oracle.stats().cache_misses, 1);
}

#[tokio::test]
async fn test_fresh_cache_entry_never_reaches_sources() {
    let mut primary = mock_source(PriceSourceKind::Coingecko);
    primary
        .expect_fetch_price()
        .times(1)
        .returning(|network, token| {
            Ok(TokenPrice::observed_now(network, token, "WETH", 1795.0, PriceSourceKind::Coingecko))
        });
    let mut fallback = mock_source(PriceSourceKind::DefiLlama);
    fallback.expect_fetch_price().never();

    let oracle = oracle_with(
        vec![Arc::new(fallback), Arc::new(primary)],
        OracleSettings::default(),
    );

    oracle.get_token_price(1, WETH).await.unwrap();
    for _ in 0..3 {
        assert!((oracle.get_token_price(1, WETH).await.unwrap() - 1795.0).abs() < f64::EPSILON);
    }
}

#[tokio::test]
async fn test_fallback_to_second_source_is_cached() {
    let mut chainlink = mock_source(PriceSourceKind::Chainlink);
    chainlink
        .expect_fetch_price()
        .times(1)
        .returning(|_, _| Err(AggregatorError::source("chainlink", "no feed configured")));

    let mut coingecko = mock_source(PriceSourceKind::Coingecko);
    coingecko
        .expect_fetch_price()
        .times(1)
        .returning(|network, token| {
            Ok(TokenPrice::observed_now(network, token, "WETH", 1800.5, PriceSourceKind::Coingecko))
        });

    let oracle = oracle_with(
        vec![Arc::new(coingecko), Arc::new(chainlink)],
        OracleSettings::default(),
    );

    let quote = oracle.get_token_quote(1, WETH).await.unwrap();
    assert!((quote.price_usd - 1800.5).abs() < f64::EPSILON);
    assert_eq!(quote.source, PriceSourceKind::Coingecko);
    assert!((quote.confidence - 0.95).abs() < f64::EPSILON);

    let cached = oracle.peek_cache(1, WETH).await.unwrap();
    assert_eq!(cached.source, PriceSourceKind::Coingecko);
    assert!((cached.price_usd - 1800.5).abs() < f64::EPSILON);
    assert_eq!(oracle.stats().source_failures, 1);
}

#[tokio::test]
async fn test_all_sources_failing_leaves_cache_untouched() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut source = mock_source(PriceSourceKind::Coingecko);
    source.expect_fetch_price().returning(move |network, token| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(TokenPrice::observed_now(network, token, "WETH", 1700.0, PriceSourceKind::Coingecko))
        } else {
            Err(AggregatorError::source("coingecko", "HTTP 429"))
        }
    });

    // Zero TTL: every lookup goes to the sources.
    let oracle = oracle_with(
        vec![Arc::new(source)],
        OracleSettings {
            cache_ttl: Duration::ZERO,
            fetch_timeout: Duration::from_secs(1),
        },
    );

    oracle.get_token_price(1, WETH).await.unwrap();
    let before = oracle.peek_cache(1, WETH).await.unwrap();

    let result = oracle.get_token_price(1, WETH).await;
    assert_eq!(
        result,
        Err(AggregatorError::PriceUnavailable { network: 1, token: WETH })
    );

    let after = oracle.peek_cache(1, WETH).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(oracle.stats().unavailable, 1);
}

#[tokio::test]
async fn test_unusable_price_falls_through() {
    let mut chainlink = mock_source(PriceSourceKind::Chainlink);
    chainlink.expect_fetch_price().times(1).returning(|network, token| {
        Ok(TokenPrice::observed_now(network, token, "WETH", 0.0, PriceSourceKind::Chainlink))
    });
    let mut llama = mock_source(PriceSourceKind::DefiLlama);
    llama.expect_fetch_price().times(1).returning(|network, token| {
        Ok(TokenPrice::observed_now(network, token, "WETH", 1799.0, PriceSourceKind::DefiLlama))
    });

    let oracle = oracle_with(vec![Arc::new(chainlink), Arc::new(llama)], OracleSettings::default());

    let quote = oracle.get_token_quote(1, WETH).await.unwrap();
    assert_eq!(quote.source, PriceSourceKind::DefiLlama);
    assert!((quote.confidence - 0.90).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_slow_source_times_out_and_falls_through() {
    let mut coingecko = mock_source(PriceSourceKind::Coingecko);
    coingecko.expect_fetch_price().times(1).returning(|network, token| {
        Ok(TokenPrice::observed_now(network, token, "WETH", 1801.0, PriceSourceKind::Coingecko))
    });

    let oracle = oracle_with(
        vec![Arc::new(SlowSource), Arc::new(coingecko)],
        OracleSettings {
            cache_ttl: Duration::from_secs(30),
            fetch_timeout: Duration::from_millis(50),
        },
    );

    let quote = oracle.get_token_quote(1, WETH).await.unwrap();
    assert_eq!(quote.source, PriceSourceKind::Coingecko);
    assert_eq!(oracle.stats().source_failures, 1);
}

#[tokio::test]
async fn test_get_apy_matches_chain_and_address() {
    let oracle = PriceOracle::new(
        Vec::new(),
        yields(vec![
            listing_row("Ethereum", AAVE_POLYGON, 2.0),
            listing_row("Polygon", AAVE_POLYGON, 4.5),
        ]),
        OracleSettings::default(),
    );

    let apy = oracle.get_apy("Aave", AAVE_POLYGON, 137).await.unwrap();
    assert!((apy - 4.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_get_apy_not_found_cases() {
    let oracle = PriceOracle::new(
        Vec::new(),
        yields(vec![listing_row("Polygon", AAVE_POLYGON, 4.5)]),
        OracleSettings::default(),
    );

    // Network the listing does not cover.
    let uncovered = oracle.get_apy("Aave", AAVE_POLYGON, 42161).await;
    assert!(matches!(uncovered, Err(AggregatorError::NotFound { .. })));

    // Covered network without a row for the pool.
    let missing = oracle.get_apy("Aave", AAVE_POLYGON, 1).await;
    assert!(matches!(missing, Err(AggregatorError::NotFound { .. })));
}

#[tokio::test]
async fn test_get_apy_listing_failure_is_yield_unavailable() {
    let oracle = PriceOracle::new(
        Vec::new(),
        Arc::new(StaticYields { rows: Vec::new(), fail: true }),
        OracleSettings::default(),
    );

    let result = oracle.get_apy("Aave", AAVE_POLYGON, 137).await;
    assert_eq!(
        result,
        Err(AggregatorError::YieldUnavailable { network: 137, pool: AAVE_POLYGON })
    );
}

// ---- Pool Catalog Tests ----

fn ranked_scanner() -> Arc<StubScanner> {
    Arc::new(StubScanner {
        protocol: "Aave".to_string(),
        network: 137,
        pools: vec![pool("a", 10.0, 2), pool("b", 9.0, 1), pool("c", 20.0, 10)],
        failing: AtomicBool::new(false),
    })
}

#[tokio::test]
async fn test_scan_then_rank_by_risk_adjusted_yield() {
    let scanner = ranked_scanner();
    let catalog = PoolCatalog::new(registry(), [scanner as Arc<dyn ProtocolScanner>]);

    let report = catalog.scan_all_networks().await.unwrap();
    assert_eq!(report.scanned.get(&137), Some(&3));
    assert_eq!(report.scanned.get(&1), Some(&0));
    assert!(report.failed.is_empty());

    let ranked = catalog
        .get_optimal_yield(137, U256::from(1_000u64), 5)
        .await
        .unwrap();
    let ids: Vec<_> = ranked.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[tokio::test]
async fn test_failed_network_keeps_previous_pools() {
    let scanner = ranked_scanner();
    let catalog = PoolCatalog::new(
        registry(),
        [Arc::clone(&scanner) as Arc<dyn ProtocolScanner>],
    );

    catalog.scan_all_networks().await.unwrap();
    assert_eq!(catalog.pool_count(137).await, 3);

    scanner.failing.store(true, Ordering::SeqCst);
    let report = catalog.scan_all_networks().await.unwrap();

    assert!(report.failed.contains(&137));
    assert_eq!(catalog.pool_count(137).await, 3);
    let ranked = catalog.get_optimal_yield(137, U256::ZERO, 5).await.unwrap();
    assert_eq!(ranked.len(), 2);
}

#[tokio::test]
async fn test_optimal_yield_unknown_network() {
    let catalog = PoolCatalog::new(registry(), Vec::new());
    let result = catalog.get_optimal_yield(56, U256::ZERO, 5).await;
    assert!(matches!(result, Err(AggregatorError::NotFound { .. })));
}

// ---- Strategy Manager Tests ----

#[tokio::test]
async fn test_concurrent_creation_yields_unique_ids() {
    let manager = Arc::new(manager_with(Arc::new(UnwiredExecution), slow_monitors()));

    let creations = (0..32).map(|_| {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.create_strategy(strategy_params(137, AAVE_POLYGON)).await })
    });
    let results = futures_util::future::join_all(creations).await;

    let ids: HashSet<_> = results
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    assert_eq!(ids.len(), 32);
    assert_eq!(manager.list_strategies().await.len(), 32);
    assert_eq!(manager.monitor_count().await, 32);

    manager.shutdown().await;
    assert_eq!(manager.monitor_count().await, 0);
}

#[tokio::test]
async fn test_create_rejects_invalid_and_unknown_network() {
    let manager = manager_with(Arc::new(UnwiredExecution), slow_monitors());

    let mut bad_address = strategy_params(137, AAVE_POLYGON);
    bad_address.pool_address = "not-an-address".to_string();
    assert!(matches!(
        manager.create_strategy(bad_address).await,
        Err(AggregatorError::InvalidInput(_))
    ));

    let unknown_network = strategy_params(56, AAVE_POLYGON);
    assert!(matches!(
        manager.create_strategy(unknown_network).await,
        Err(AggregatorError::NotFound { .. })
    ));
    assert!(manager.list_strategies().await.is_empty());
}

#[tokio::test]
async fn test_harvest_is_idempotent_within_interval() {
    let mut exec = MockExec::new();
    exec.expect_harvest().times(1).returning(|_| {
        Ok(HarvestOutcome {
            success: true,
            rewards_claimed: U256::from(1_000u64),
            reinvested: true,
            tx_hash: Some("0xabc".to_string()),
        })
    });

    let manager = manager_with(Arc::new(exec), slow_monitors());
    let id = manager.create_strategy(strategy_params(137, AAVE_POLYGON)).await.unwrap();

    let first = assert_ok!(manager.harvest_all(&id).await);
    assert!(first.is_some());
    let harvested = manager.get_strategy(&id).await.unwrap();
    let last_harvest = harvested.last_harvest;
    assert!(last_harvest.is_some());
    assert_eq!(harvested.ledger.harvested, U256::from(1_000u64));
    // Default performance fee is 10%.
    assert_eq!(harvested.ledger.performance_fees, U256::from(100u64));

    let second = manager.harvest_all(&id).await.unwrap();
    assert!(second.is_none());
    assert_eq!(manager.get_strategy(&id).await.unwrap().last_harvest, last_harvest);
    assert_eq!(manager.stats().harvests, 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_rejected_harvest_does_not_advance() {
    let mut exec = MockExec::new();
    exec.expect_harvest().times(1).returning(|_| {
        Ok(HarvestOutcome {
            success: false,
            rewards_claimed: U256::ZERO,
            reinvested: false,
            tx_hash: None,
        })
    });

    let manager = manager_with(Arc::new(exec), slow_monitors());
    let id = manager.create_strategy(strategy_params(137, AAVE_POLYGON)).await.unwrap();

    let err = assert_err!(manager.harvest_all(&id).await);
    assert!(matches!(err, AggregatorError::ExecutionRejected(_)));
    assert!(manager.get_strategy(&id).await.unwrap().last_harvest.is_none());
    assert_eq!(manager.stats().harvest_failures, 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_execute_unknown_id_and_unwired_adapter() {
    let manager = manager_with(Arc::new(UnwiredExecution), slow_monitors());

    let missing = manager
        .execute_strategy("strategy-missing", U256::from(10u64), Address::ZERO)
        .await;
    assert!(matches!(missing, Err(AggregatorError::NotFound { .. })));

    let id = manager.create_strategy(strategy_params(137, AAVE_POLYGON)).await.unwrap();
    let unwired = manager
        .execute_strategy(&id, U256::from(10u64), Address::ZERO)
        .await;
    assert!(matches!(unwired, Err(AggregatorError::Unimplemented(_))));
    assert!(manager.get_strategy(&id).await.unwrap().ledger.deposited.is_zero());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_deposit_and_withdraw_update_ledger() {
    let mut exec = MockExec::new();
    exec.expect_deposit().times(1).returning(|_, _, amount| {
        Ok(TransactionResult {
            success: true,
            lp_token_amount: amount,
            tx_hash: None,
        })
    });
    exec.expect_withdraw().times(1).returning(|_, _, amount| {
        Ok(TransactionResult {
            success: true,
            lp_token_amount: amount,
            tx_hash: None,
        })
    });

    let manager = manager_with(Arc::new(exec), slow_monitors());
    let id = manager.create_strategy(strategy_params(137, AAVE_POLYGON)).await.unwrap();
    let user = address!("00000000000000000000000000000000000000aa");

    let deposit = assert_ok!(manager.execute_strategy(&id, U256::from(5_000u64), user).await);
    assert_eq!(deposit.lp_token_amount, U256::from(5_000u64));

    // More than deployed is rejected before reaching the adapter.
    let too_much = manager.withdraw_strategy(&id, U256::from(6_000u64), user).await;
    assert!(matches!(too_much, Err(AggregatorError::InvalidInput(_))));

    assert_ok!(manager.withdraw_strategy(&id, U256::from(2_000u64), user).await);

    let ledger = manager.get_strategy(&id).await.unwrap().ledger;
    assert_eq!(ledger.deposited, U256::from(5_000u64));
    assert_eq!(ledger.withdrawn, U256::from(2_000u64));
    assert_eq!(ledger.net_deposited(), U256::from(3_000u64));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_fresh_strategy_performance_is_zeroed() {
    let manager = manager_with(Arc::new(UnwiredExecution), slow_monitors());
    let id = manager.create_strategy(strategy_params(137, AAVE_POLYGON)).await.unwrap();

    let perf = manager.get_strategy_performance(&id).await.unwrap();
    assert_eq!(perf.strategy_id, id);
    assert!((perf.current_apy - 4.0).abs() < f64::EPSILON);
    assert!((perf.net_apy - 3.6).abs() < 1e-9);
    assert!(perf.total_deposited_usd.abs() < f64::EPSILON);
    assert!(perf.total_harvested.is_zero());
    assert!(perf.pending_rewards.is_zero());
    assert!(perf.profit_loss.is_zero());

    let missing = manager.get_strategy_performance("strategy-missing").await;
    assert!(matches!(missing, Err(AggregatorError::NotFound { .. })));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_deactivation_stops_monitor() {
    let manager = manager_with(Arc::new(UnwiredExecution), slow_monitors());
    let id = manager.create_strategy(strategy_params(137, AAVE_POLYGON)).await.unwrap();
    assert_eq!(manager.monitor_count().await, 1);

    manager.deactivate_strategy(&id).await.unwrap();

    assert_eq!(manager.monitor_count().await, 0);
    let strategy = manager.get_strategy(&id).await.unwrap();
    assert!(!strategy.active);
    assert_eq!(manager.active_count().await, 0);

    // Inactive strategies take no deposits and are never harvested.
    let deposit = manager.execute_strategy(&id, U256::from(10u64), Address::ZERO).await;
    assert!(matches!(deposit, Err(AggregatorError::InvalidInput(_))));
    assert!(manager.harvest_all(&id).await.unwrap().is_none());

    // Deactivating twice is a no-op.
    manager.deactivate_strategy(&id).await.unwrap();
    assert!(matches!(
        manager.deactivate_strategy("strategy-missing").await,
        Err(AggregatorError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_monitor_refreshes_apy() {
    let oracle = Arc::new(PriceOracle::new(
        Vec::new(),
        yields(vec![listing_row("Polygon", AAVE_POLYGON, 7.25)]),
        OracleSettings::default(),
    ));
    let manager = StrategyManager::new(registry(), oracle, Arc::new(UnwiredExecution), fast_monitors());

    let id = manager.create_strategy(strategy_params(137, AAVE_POLYGON)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let strategy = manager.get_strategy(&id).await.unwrap();
    assert!((strategy.apy - 7.25).abs() < f64::EPSILON);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_monitor_defers_harvest_when_gas_is_high() {
    let mut exec = MockExec::new();
    exec.expect_harvest().never();

    let gas_client: Arc<dyn ChainClient> = Arc::new(FixedGas { network: 1, gwei: 250 });
    let gas = Arc::new(GasOracle::new(registry(), [gas_client]));

    let oracle = Arc::new(oracle_with(Vec::new(), OracleSettings::default()));
    let manager = StrategyManager::new(registry(), oracle, Arc::new(exec), fast_monitors())
        .with_gas_oracle(gas);

    manager
        .create_strategy(strategy_params(1, address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2")))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    manager.shutdown().await;

    assert!(manager.stats().gas_skips >= 1);
    assert_eq!(manager.stats().harvests, 0);
}

#[tokio::test]
async fn test_snapshot_restore_restarts_active_monitors() {
    let source = manager_with(Arc::new(UnwiredExecution), slow_monitors());
    let active = source.create_strategy(strategy_params(137, AAVE_POLYGON)).await.unwrap();
    let inactive = source.create_strategy(strategy_params(137, AAVE_POLYGON)).await.unwrap();
    source.deactivate_strategy(&inactive).await.unwrap();
    source.shutdown().await;

    let snapshot = source.snapshot().await;
    assert_eq!(snapshot.strategies.len(), 2);
    assert_eq!(snapshot.version, env!("CARGO_PKG_VERSION"));

    let target = manager_with(Arc::new(UnwiredExecution), slow_monitors());
    assert_eq!(target.restore(snapshot.clone()).await, 2);
    assert_eq!(target.monitor_count().await, 1);
    assert!(target.get_strategy(&active).await.unwrap().active);
    assert!(!target.get_strategy(&inactive).await.unwrap().active);

    // Ids already present are skipped.
    assert_eq!(target.restore(snapshot).await, 0);
    assert_eq!(target.list_strategies().await.len(), 2);

    target.shutdown().await;
}

#[tokio::test]
async fn test_remove_strategy() {
    let manager = manager_with(Arc::new(UnwiredExecution), slow_monitors());
    let id = manager.create_strategy(strategy_params(137, AAVE_POLYGON)).await.unwrap();

    let removed = manager.remove_strategy(&id).await.unwrap();
    assert_eq!(removed.id, id);
    assert!(!removed.active);
    assert!(matches!(
        manager.get_strategy(&id).await,
        Err(AggregatorError::NotFound { .. })
    ));
    assert_eq!(manager.monitor_count().await, 0);
}

#[tokio::test]
async fn test_strategy_seeded_from_catalog_pool() {
    let mut seeded = pool("aave-polygon-usdc", 5.5, 2);
    seeded.address = AAVE_POLYGON;
    let scanner = Arc::new(StubScanner {
        protocol: "Aave".to_string(),
        network: 137,
        pools: vec![seeded],
        failing: AtomicBool::new(false),
    });
    let catalog = PoolCatalog::new(registry(), [scanner as Arc<dyn ProtocolScanner>]);
    catalog.scan_all_networks().await.unwrap();

    let found = catalog.find_pool(137, AAVE_POLYGON).await.unwrap();
    assert!(catalog.find_pool(137, WETH).await.is_none());

    let manager = manager_with(Arc::new(UnwiredExecution), slow_monitors());
    let params = StrategyParams::from_pool(&found, "Aave USDC", StrategyKind::YieldFarm);
    let id = assert_ok!(manager.create_strategy(params).await);

    let strategy = manager.get_strategy(&id).await.unwrap();
    assert_eq!(strategy.pool_address, AAVE_POLYGON);
    assert_eq!(strategy.network, 137);
    assert_eq!(strategy.risk_score, 2);
    assert!((strategy.apy - 5.5).abs() < f64::EPSILON);
    assert_eq!(strategy.harvest_interval, Duration::from_secs(86_400));

    manager.shutdown().await;
}
