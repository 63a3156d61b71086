//! ENS Graph Indexer
//!
//! This binary provides:
//! - Event listening from Ethereum (registry, registrar, controllers,
//!   resolvers, name wrapper)
//! - Projection of those events into the domain graph
//! - SQLite storage of entities and event records

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ensgraph_indexer::config::{Config, LoggingConfig};
use ensgraph_indexer::storage::Storage;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ensgraph-indexer")]
#[command(version, about = "ENS event indexer and domain graph projector", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "indexer.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the indexer service
    Run,

    /// Show indexer status and sync progress
    Status,

    /// Initialize the database
    InitDb {
        /// Database URL
        #[arg(long, default_value = "sqlite://ensgraph.db")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the config when it is readable; the command
    // itself reports config errors.
    let logging = Config::from_file(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_default();
    init_logging(cli.debug, &logging)?;

    info!("ENS Graph Indexer starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_indexer(&cli.config).await?,
        Commands::Status => show_status(&cli.config).await?,
        Commands::InitDb { database_url } => init_database(&database_url).await?,
    }

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(debug: bool, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = if debug {
        EnvFilter::new("ensgraph_indexer=debug,sqlx=warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("ensgraph_indexer={},sqlx=warn", logging.level))
        })
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match logging.format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_target(true).with_line_number(true))
            .try_init(),
        _ => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Main indexer service
async fn run_indexer(config_path: &str) -> Result<()> {
    use ensgraph_indexer::listener::{RpcProvider, SyncEngine};

    info!("Starting indexer service with config: {}", config_path);

    let config = Config::from_file(config_path).context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Chain ID: {}", config.network.chain_id);
    info!("  RPC URL: {}", config.network.rpc_url);
    info!("  Database: {}", config.database.url);
    info!("  Start block: {}", config.sync.start_block);
    info!("  Registry: {}", config.contracts.registry);
    info!("  Name wrapper: {}", config.contracts.name_wrapper);

    let storage = Storage::new(
        &config.database.url,
        Some(config.database.max_connections),
        Some(config.database.min_connections),
    )
    .await
    .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    info!("Database initialized");

    let sync_state = storage.get_sync_state().await?;
    if sync_state.last_block_number == 0 && sync_state.chain_id == 0 {
        // The engine resumes at last_block + 1, so start_block itself is included
        let initial_block = config.sync.start_block.saturating_sub(1);
        info!(
            "Fresh database detected, initializing sync state with chain_id={} initial_block={} (will start syncing from block {})",
            config.network.chain_id, initial_block, config.sync.start_block
        );
        storage
            .initialize_sync_state(
                config.network.chain_id,
                initial_block,
                alloy::primitives::B256::ZERO,
            )
            .await
            .context("Failed to initialize sync state")?;
    } else if sync_state.chain_id != config.network.chain_id {
        anyhow::bail!(
            "Database was synced for chain {} but config targets chain {}",
            sync_state.chain_id,
            config.network.chain_id
        );
    } else {
        info!(
            "Existing sync state found: chain_id={} last_block={}",
            sync_state.chain_id, sync_state.last_block_number
        );
    }

    let provider = RpcProvider::new(&config.network.rpc_url, config.contracts.clone())
        .await
        .context("Failed to create RPC provider")?;

    info!("RPC provider initialized");

    let mut sync_engine = SyncEngine::new(provider, storage.clone(), config.sync.clone());
    let sync_handle = tokio::spawn(async move { sync_engine.run().await });

    info!("Event listener started");

    tokio::select! {
        result = sync_handle => {
            storage.close().await;
            match result {
                Ok(Ok(())) => {
                    warn!("Sync engine exited unexpectedly");
                    Ok(())
                }
                Ok(Err(e)) => Err(e).context("Sync engine failed"),
                Err(e) => Err(anyhow::anyhow!("Sync task panicked: {}", e)),
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received shutdown signal, gracefully shutting down...");
            storage.close().await;
            Ok(())
        }
    }
}

/// Show indexer status and sync progress
async fn show_status(config_path: &str) -> Result<()> {
    info!("Checking indexer status");

    // Fall back to the default database only if the config file doesn't exist
    let (database_url, max_conn, min_conn) = match Config::from_file(config_path) {
        Ok(config) => (
            config.database.url,
            Some(config.database.max_connections),
            Some(config.database.min_connections),
        ),
        Err(e) => {
            let is_not_found = e.chain().any(|cause| {
                cause
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
            });

            if is_not_found {
                info!("Config file not found, using default database: sqlite://ensgraph.db");
                ("sqlite://ensgraph.db".to_string(), None, None)
            } else {
                return Err(e).context("Failed to load config file");
            }
        }
    };

    let storage = Storage::new(&database_url, max_conn, min_conn)
        .await
        .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    let sync_state = storage.get_sync_state().await?;
    let stats = storage.stats().await?;

    println!("\n=== ENS Graph Indexer Status ===\n");
    println!("Sync Progress:");
    println!("  Chain ID: {}", sync_state.chain_id);
    println!("  Last Block: {}", sync_state.last_block_number);
    println!(
        "  Last Block Hash: 0x{}",
        hex::encode(sync_state.last_block_hash)
    );
    println!(
        "  Last Updated: {}",
        chrono::DateTime::from_timestamp(sync_state.updated_at, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string())
    );

    println!("\nDatabase Statistics:");
    println!(
        "  Domains: {} ({} live)",
        stats.domain_count, stats.live_domain_count
    );
    println!("  Resolvers: {}", stats.resolver_count);
    println!("  Registrations: {}", stats.registration_count);
    println!("  Wrapped Domains: {}", stats.wrapped_domain_count);
    println!("  Accounts: {}", stats.account_count);
    println!("  Event Records: {}", stats.event_count);
    println!();

    storage.close().await;

    Ok(())
}

/// Initialize the database
async fn init_database(database_url: &str) -> Result<()> {
    info!("Initializing database: {}", database_url);

    let storage = Storage::new(database_url, None, None)
        .await
        .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    storage
        .health_check()
        .await
        .context("Database health check failed")?;

    let stats = storage.stats().await?;
    info!("Database initialized successfully!");
    info!("  Domains: {}", stats.domain_count);
    info!("  Event records: {}", stats.event_count);
    info!("  Last block: {}", stats.last_block_number);

    storage.close().await;

    Ok(())
}
