//! Prometheus Metrics Registry - Aggregator Observability
//!
//! Registers and exposes Prometheus metrics on :9090. Covers price
//! lookups, catalog scans, strategy lifecycle and per-network gas.
//! Core components keep their own atomic counters; the service loop
//! copies them here periodically.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use prometheus::{Encoder, GaugeVec, Histogram, HistogramOpts, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::domain::network::NetworkId;
use crate::usecases::{ManagerStats, OracleStats, ScanReport};

/// Centralized Prometheus metrics for the aggregator.
///
/// All metrics follow the naming convention `yield_aggregator_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Price lookups by outcome (hit, miss, unavailable, source_failure).
    pub price_lookups: IntGaugeVec,
    /// Cached price entries.
    pub price_cache_entries: IntGauge,
    /// Pools stored per network.
    pub catalog_pools: IntGaugeVec,
    /// Networks whose last scan failed (1) or succeeded (0).
    pub catalog_scan_failed: IntGaugeVec,
    /// Full catalog scan duration (seconds).
    pub catalog_scan_seconds: Histogram,
    /// Strategy lifecycle events by kind.
    pub strategy_events: IntGaugeVec,
    /// Active strategies.
    pub strategies_active: IntGauge,
    /// Running monitor tasks.
    pub strategy_monitors: IntGauge,
    /// Last observed gas price per network (gwei).
    pub gas_price_gwei: GaugeVec,
    /// Chain connection status (1 = connected, 0 = not).
    pub chain_connected: IntGaugeVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let price_lookups = IntGaugeVec::new(
            Opts::new("yield_aggregator_price_lookups_total", "Price lookups by outcome"),
            &["outcome"],
        )?;

        let price_cache_entries = IntGauge::new(
            "yield_aggregator_price_cache_entries",
            "Price observations held in the cache",
        )?;

        let catalog_pools = IntGaugeVec::new(
            Opts::new("yield_aggregator_catalog_pools", "Pools stored per network"),
            &["network"],
        )?;

        let catalog_scan_failed = IntGaugeVec::new(
            Opts::new(
                "yield_aggregator_catalog_scan_failed",
                "Whether the last scan of a network failed (1=yes, 0=no)",
            ),
            &["network"],
        )?;

        let catalog_scan_seconds = Histogram::with_opts(
            HistogramOpts::new("yield_aggregator_catalog_scan_seconds", "Full catalog scan duration")
                .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let strategy_events = IntGaugeVec::new(
            Opts::new("yield_aggregator_strategy_events_total", "Strategy lifecycle events by kind"),
            &["event"],
        )?;

        let strategies_active = IntGauge::new("yield_aggregator_strategies_active", "Active strategies")?;

        let strategy_monitors = IntGauge::new(
            "yield_aggregator_strategy_monitors",
            "Running strategy monitor tasks",
        )?;

        let gas_price_gwei = GaugeVec::new(
            Opts::new("yield_aggregator_gas_price_gwei", "Last observed gas price in gwei"),
            &["network"],
        )?;

        let chain_connected = IntGaugeVec::new(
            Opts::new(
                "yield_aggregator_chain_connected",
                "Chain connection status (1=connected, 0=disconnected)",
            ),
            &["network"],
        )?;

        registry.register(Box::new(price_lookups.clone()))?;
        registry.register(Box::new(price_cache_entries.clone()))?;
        registry.register(Box::new(catalog_pools.clone()))?;
        registry.register(Box::new(catalog_scan_failed.clone()))?;
        registry.register(Box::new(catalog_scan_seconds.clone()))?;
        registry.register(Box::new(strategy_events.clone()))?;
        registry.register(Box::new(strategies_active.clone()))?;
        registry.register(Box::new(strategy_monitors.clone()))?;
        registry.register(Box::new(gas_price_gwei.clone()))?;
        registry.register(Box::new(chain_connected.clone()))?;

        Ok(Self {
            registry,
            price_lookups,
            price_cache_entries,
            catalog_pools,
            catalog_scan_failed,
            catalog_scan_seconds,
            strategy_events,
            strategies_active,
            strategy_monitors,
            gas_price_gwei,
            chain_connected,
        })
    }

    /// Copy the oracle counters.
    pub fn record_oracle(&self, stats: &OracleStats, cache_entries: usize) {
        for (outcome, value) in [
            ("hit", stats.cache_hits),
            ("miss", stats.cache_misses),
            ("unavailable", stats.unavailable),
            ("source_failure", stats.source_failures),
        ] {
            self.price_lookups
                .with_label_values(&[outcome])
                .set(saturating_i64(value));
        }
        self.price_cache_entries.set(saturating_i64(cache_entries as u64));
    }

    /// Record the outcome of a full catalog scan.
    pub fn record_scan(&self, report: &ScanReport, elapsed_secs: f64) {
        for (network, count) in &report.scanned {
            let label = network.to_string();
            self.catalog_pools
                .with_label_values(&[&label])
                .set(saturating_i64(*count as u64));
            self.catalog_scan_failed.with_label_values(&[&label]).set(0);
        }
        for network in &report.failed {
            self.catalog_scan_failed
                .with_label_values(&[&network.to_string()])
                .set(1);
        }
        self.catalog_scan_seconds.observe(elapsed_secs);
    }

    /// Copy the strategy manager counters.
    pub fn record_strategies(&self, stats: &ManagerStats, active: usize, monitors: usize) {
        for (event, value) in [
            ("created", stats.created),
            ("deposit", stats.deposits),
            ("withdrawal", stats.withdrawals),
            ("harvest", stats.harvests),
            ("harvest_failure", stats.harvest_failures),
            ("gas_skip", stats.gas_skips),
        ] {
            self.strategy_events
                .with_label_values(&[event])
                .set(saturating_i64(value));
        }
        self.strategies_active.set(saturating_i64(active as u64));
        self.strategy_monitors.set(saturating_i64(monitors as u64));
    }

    /// Record the last observed gas price of a network.
    pub fn record_gas(&self, network: NetworkId, gwei: f64) {
        self.gas_price_gwei
            .with_label_values(&[&network.to_string()])
            .set(gwei);
    }

    /// Record whether a network is connected.
    pub fn record_connection(&self, network: NetworkId, connected: bool) {
        self.chain_connected
            .with_label_values(&[&network.to_string()])
            .set(i64::from(connected));
    }

    /// Render all metrics in the text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move { metrics.render() }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_values() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record_oracle(
            &OracleStats {
                cache_hits: 7,
                ..OracleStats::default()
            },
            3,
        );
        metrics.record_gas(137, 42.5);

        let text = metrics.render();
        assert!(text.contains("yield_aggregator_price_lookups_total{outcome=\"hit\"} 7"));
        assert!(text.contains("yield_aggregator_price_cache_entries 3"));
        assert!(text.contains("yield_aggregator_gas_price_gwei{network=\"137\"} 42.5"));
    }
}
