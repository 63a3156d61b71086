//! Storage layer for the ENS graph indexer.
//!
//! This module provides database operations for:
//! - Entities (domains, resolvers, registrations, wrapped domains, accounts)
//! - Event records (write-once audit log)
//! - Batch prefetch and atomic changeset flush
//! - Sync state (indexer progress tracking)

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

mod changeset;
pub mod entities;
mod prefetch;
pub mod sync;
pub mod types;

pub use types::*;

/// Database storage for the indexer.
///
/// Provides async access to SQLite database with connection pooling.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance with the given database URL.
    ///
    /// This will create the database file if it doesn't exist. Migrations
    /// are applied separately with [`Storage::run_migrations`].
    ///
    /// # Example
    /// ```no_run
    /// # use ensgraph_indexer::storage::Storage;
    /// # async fn example() -> anyhow::Result<()> {
    /// let storage = Storage::new("sqlite://ensgraph.db", Some(5), Some(1)).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(
        database_url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(5))
            .min_connections(min_connections.unwrap_or(1))
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Create a new storage instance with a specific file path.
    pub async fn new_with_path<P: AsRef<Path>>(
        path: P,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let database_url = format!("sqlite://{}", path.display());
        Self::new(&database_url, max_connections, min_connections).await
    }

    /// Run database migrations.
    ///
    /// This should be called once during initialization to ensure the schema is up to date.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Migrations completed successfully");

        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection");
        self.pool.close().await;
    }

    /// Get database statistics.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let account_count = self.count("SELECT COUNT(*) FROM accounts").await?;
        let domain_count = self.count("SELECT COUNT(*) FROM domains").await?;
        let live_domain_count = self
            .count("SELECT COUNT(*) FROM domains WHERE is_pruned = 0")
            .await?;
        let resolver_count = self.count("SELECT COUNT(*) FROM resolvers").await?;
        let registration_count = self.count("SELECT COUNT(*) FROM registrations").await?;
        let wrapped_domain_count = self.count("SELECT COUNT(*) FROM wrapped_domains").await?;
        let event_count = self.count(
            "SELECT (SELECT COUNT(*) FROM domain_events) \
             + (SELECT COUNT(*) FROM resolver_events) \
             + (SELECT COUNT(*) FROM registration_events)",
        )
        .await?;

        let sync_state = self.get_sync_state().await?;

        Ok(DatabaseStats {
            account_count,
            domain_count,
            live_domain_count,
            resolver_count,
            registration_count,
            wrapped_domain_count,
            event_count,
            last_block_number: sync_state.last_block_number,
        })
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let n: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to run `{}`", sql))?;
        Ok(n as u64)
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;

        Ok(())
    }
}
