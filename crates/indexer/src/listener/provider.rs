//! RPC provider wrapper for Ethereum communication.

use std::collections::HashMap;

use alloy::eips::BlockNumberOrTag;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Filter, Log};
use alloy::transports::http::{Client, Http};
use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::events::{contract_topics, decode_log, resolver_topics};
use crate::config::ContractsConfig;
use crate::events::Envelope;

/// HTTP RPC provider for querying Ethereum.
#[derive(Clone)]
pub struct RpcProvider {
    provider: RootProvider<Http<Client>>,
    contracts: ContractsConfig,
}

impl RpcProvider {
    /// Create a new RPC provider.
    pub async fn new(rpc_url: &str, contracts: ContractsConfig) -> Result<Self> {
        let url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;

        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            provider,
            contracts,
        })
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .context("Failed to get block number")
    }

    /// Get every followed event in a block range, sorted by chain position.
    ///
    /// Registry, registrar, controller and wrapper events are fetched by
    /// address. Resolver events are fetched by topic alone, from any emitter.
    pub async fn get_events(&self, from_block: u64, to_block: u64) -> Result<Vec<Envelope>> {
        let contract_filter = Filter::new()
            .address(self.contracts.addresses())
            .event_signature(contract_topics())
            .from_block(from_block)
            .to_block(to_block);

        let resolver_filter = Filter::new()
            .event_signature(resolver_topics())
            .from_block(from_block)
            .to_block(to_block);

        let mut logs: Vec<Log> = self
            .provider
            .get_logs(&contract_filter)
            .await
            .context("Failed to fetch contract logs from RPC")?;
        let resolver_logs = self
            .provider
            .get_logs(&resolver_filter)
            .await
            .context("Failed to fetch resolver logs from RPC")?;
        logs.extend(resolver_logs);

        self.fill_timestamps(&mut logs).await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            if log.removed {
                continue;
            }
            match decode_log(log, &self.contracts) {
                Ok(Some(envelope)) => events.push(envelope),
                Ok(None) => {}
                Err(e) => {
                    // Malformed logs are dropped, the rest of the range still applies
                    warn!(
                        address = %log.address(),
                        tx = ?log.transaction_hash,
                        "Failed to decode log: {:#}",
                        e
                    );
                }
            }
        }

        events.sort_by_key(Envelope::position);

        debug!(
            from_block,
            to_block,
            logs = logs.len(),
            events = events.len(),
            "Fetched events"
        );

        Ok(events)
    }

    /// Fetch block timestamps for logs whose node did not include them.
    async fn fill_timestamps(&self, logs: &mut [Log]) -> Result<()> {
        let mut timestamps: HashMap<u64, u64> = HashMap::new();

        for log in logs.iter_mut() {
            if log.block_timestamp.is_some() {
                continue;
            }
            let Some(number) = log.block_number else {
                continue;
            };

            let timestamp = match timestamps.get(&number) {
                Some(ts) => *ts,
                None => {
                    let block = self
                        .provider
                        .get_block_by_number(
                            BlockNumberOrTag::Number(number),
                            BlockTransactionsKind::Hashes,
                        )
                        .await
                        .with_context(|| format!("Failed to fetch block {}", number))?
                        .with_context(|| format!("Block {} not found", number))?;
                    let ts = block.header.timestamp;
                    timestamps.insert(number, ts);
                    ts
                }
            };
            log.block_timestamp = Some(timestamp);
        }

        Ok(())
    }
}
