//! Strategy Snapshot Store - Atomic JSON Persistence
//!
//! Saves the strategy table to `strategies.json` using atomic writes
//! (write to tmp file, then rename). The file is always either the old
//! or the new version, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{info, instrument};

use crate::ports::repository::{StrategyRepository, StrategySnapshot};

/// Atomic JSON store for strategy snapshots.
pub struct SnapshotStore {
    /// Path to strategies.json.
    snapshot_path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl SnapshotStore {
    /// Create a store in the given data directory, creating it if needed.
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            snapshot_path: dir.join("strategies.json"),
            tmp_path: dir.join("strategies.json.tmp"),
        })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }
}

#[async_trait]
impl StrategyRepository for SnapshotStore {
    #[instrument(skip(self, snapshot))]
    async fn save_snapshot(&self, snapshot: &StrategySnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize strategies")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp snapshot file")?;

        fs::rename(&self.tmp_path, &self.snapshot_path)
            .await
            .context("Failed to rename snapshot file")?;

        info!(
            path = %self.snapshot_path.display(),
            strategies = snapshot.strategies.len(),
            "Strategy snapshot saved"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_snapshot(&self) -> Result<Option<StrategySnapshot>> {
        if !fs::try_exists(&self.snapshot_path).await.unwrap_or(false) {
            info!("No strategy snapshot found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.snapshot_path)
            .await
            .context("Failed to read snapshot file")?;
        let snapshot: StrategySnapshot = serde_json::from_str(&json).context("Failed to parse snapshot JSON")?;

        info!(
            version = %snapshot.version,
            strategies = snapshot.strategies.len(),
            "Strategy snapshot loaded"
        );
        Ok(Some(snapshot))
    }

    async fn is_healthy(&self) -> bool {
        match fs::try_exists(&self.snapshot_path).await {
            Ok(false) => true,
            Ok(true) => fs::metadata(&self.snapshot_path).await.is_ok(),
            Err(_) => false,
        }
    }
}
