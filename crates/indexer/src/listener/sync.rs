//! Sync engine for historical and live block processing.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, info};

use super::RpcProvider;
use crate::config::SyncConfig;
use crate::projector::Projector;
use crate::storage::Storage;
use crate::store::Changeset;

/// Sync engine manages historical catch-up and live block synchronization.
///
/// Every block window goes through the same pipeline: fetch decoded events,
/// prefetch the entities they can touch, project, and commit the changeset
/// together with the new sync cursor.
pub struct SyncEngine {
    provider: RpcProvider,
    storage: Storage,
    config: SyncConfig,
    projector: Projector,
}

impl SyncEngine {
    /// Create a new sync engine.
    pub fn new(provider: RpcProvider, storage: Storage, config: SyncConfig) -> Self {
        Self {
            provider,
            storage,
            config,
            projector: Projector::new(),
        }
    }

    /// Run the sync loop (historical + live).
    ///
    /// This method runs until an error occurs, processing historical blocks in
    /// batches until caught up, then switching to live polling mode.
    pub async fn run(&mut self) -> Result<()> {
        info!("Sync engine starting...");

        loop {
            let sync_state = self.storage.get_sync_state().await?;
            let current_block = self.provider.get_block_number().await?;
            let safe_block = current_block.saturating_sub(self.config.confirmations);

            let last_synced = sync_state.last_block_number;

            debug!(
                last = last_synced,
                current = current_block,
                safe = safe_block,
                confirmations = self.config.confirmations,
                "Sync status"
            );

            let blocks_behind = safe_block.saturating_sub(last_synced);

            if blocks_behind == 0 {
                tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
                continue;
            }

            if blocks_behind > self.config.batch_size {
                self.sync_historical_batch(last_synced, safe_block).await?;
            } else {
                self.sync_live(last_synced, safe_block).await?;
                tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
            }
        }
    }

    /// Sync one window of historical blocks.
    async fn sync_historical_batch(&mut self, from: u64, to: u64) -> Result<()> {
        let batch_end = (from + self.config.batch_size).min(to);

        info!(
            "Historical sync: processing blocks {} to {} ({} blocks)",
            from + 1,
            batch_end,
            batch_end - from
        );

        self.process_range(from + 1, batch_end).await
    }

    /// Sync live blocks one at a time.
    async fn sync_live(&mut self, from: u64, to: u64) -> Result<()> {
        if from >= to {
            return Ok(());
        }

        info!("Live sync: processing blocks {} to {}", from + 1, to);

        for block_num in (from + 1)..=to {
            self.process_range(block_num, block_num).await?;
        }

        Ok(())
    }

    /// Fetch, project and commit `[from, to]`.
    async fn process_range(&mut self, from: u64, to: u64) -> Result<()> {
        let events = self
            .provider
            .get_events(from, to)
            .await
            .with_context(|| format!("Failed to fetch events for blocks {} to {}", from, to))?;

        if events.is_empty() {
            // nothing to project, only the cursor moves
            return self
                .storage
                .apply_changeset(&Changeset::default(), to)
                .await;
        }

        info!("Blocks {}-{}: found {} events", from, to, events.len());

        let snapshot = self.storage.prefetch(&events).await?;
        let changes = self
            .projector
            .apply_batch(&snapshot, &events)
            .with_context(|| format!("Projection failed for blocks {} to {}", from, to))?;

        self.storage.apply_changeset(&changes, to).await
    }
}
