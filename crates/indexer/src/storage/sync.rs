//! Sync state storage operations.

use super::{Storage, SyncState};
use alloy::primitives::B256;
use anyhow::{Context, Result};
use sqlx::Row;

impl Storage {
    /// Get the current sync state.
    pub async fn get_sync_state(&self) -> Result<SyncState> {
        let row = sqlx::query(
            r#"
            SELECT last_block_number, last_block_hash, updated_at, chain_id
            FROM sync_state
            WHERE id = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to fetch sync state")?;

        let hash_bytes: Vec<u8> = row.try_get("last_block_hash")?;

        Ok(SyncState {
            last_block_number: row.try_get::<i64, _>("last_block_number")? as u64,
            last_block_hash: super::entities::b256_column(&hash_bytes)?,
            updated_at: row.try_get("updated_at")?,
            chain_id: row.try_get::<i64, _>("chain_id")? as u64,
        })
    }

    /// Update the sync state.
    pub async fn update_sync_state(&self, state: &SyncState) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_state
            SET last_block_number = ?,
                last_block_hash = ?,
                updated_at = ?,
                chain_id = ?
            WHERE id = 1
            "#,
        )
        .bind(state.last_block_number as i64)
        .bind(state.last_block_hash.as_slice())
        .bind(state.updated_at)
        .bind(state.chain_id as i64)
        .execute(&self.pool)
        .await
        .context("Failed to update sync state")?;

        Ok(())
    }

    /// Initialize sync state for a new chain.
    ///
    /// `start_block` is the last block considered processed; syncing resumes
    /// at the block after it.
    pub async fn initialize_sync_state(
        &self,
        chain_id: u64,
        start_block: u64,
        block_hash: B256,
    ) -> Result<()> {
        let state = SyncState {
            last_block_number: start_block,
            last_block_hash: block_hash,
            updated_at: chrono::Utc::now().timestamp(),
            chain_id,
        };
        self.update_sync_state(&state)
            .await
            .context("Failed to initialize sync state")
    }
}
