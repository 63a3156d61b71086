//! Database types for the indexer storage layer.

use alloy::primitives::B256;

/// Sync state tracking indexer progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    /// Last fully processed block number
    pub last_block_number: u64,

    /// Hash of the last processed block
    pub last_block_hash: B256,

    /// Unix timestamp of last update
    pub updated_at: i64,

    /// Chain ID (for safety)
    pub chain_id: u64,
}

/// Database statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Distinct accounts ever referenced
    pub account_count: u64,

    /// Domains, including pruned ones
    pub domain_count: u64,

    /// Domains currently counted by their parent
    pub live_domain_count: u64,

    /// Resolver rows
    pub resolver_count: u64,

    /// `.eth` registrations
    pub registration_count: u64,

    /// Currently wrapped names
    pub wrapped_domain_count: u64,

    /// Domain, resolver and registration event records
    pub event_count: u64,

    /// Last processed block number
    pub last_block_number: u64,
}
