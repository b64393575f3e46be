//! Repository Port - Strategy Snapshot Persistence
//!
//! Strategies live in memory. When persistence is enabled the whole
//! table is written as one snapshot at shutdown and restored at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::strategy::Strategy;

/// Snapshot of the strategy table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySnapshot {
  /// Version of the snapshot format.
  pub version: String,
  /// When the snapshot was taken.
  pub saved_at: DateTime<Utc>,
  /// All strategies, active and inactive.
  pub strategies: Vec<Strategy>,
}

/// Trait for snapshot storage providers.
#[async_trait]
pub trait StrategyRepository: Send + Sync + 'static {
  /// Persist a snapshot, replacing the previous one.
  async fn save_snapshot(&self, snapshot: &StrategySnapshot) -> anyhow::Result<()>;

  /// Load the most recent snapshot, `None` on first start.
  async fn load_snapshot(&self) -> anyhow::Result<Option<StrategySnapshot>>;

  /// Check if the storage is usable.
  async fn is_healthy(&self) -> bool;
}
