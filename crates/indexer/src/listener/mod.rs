//! Chain listener for ENS contract events.
//!
//! This module provides:
//! - ABI definitions and log decoding
//! - RPC provider wrapper for Ethereum communication
//! - Sync engine for historical and live block processing

pub mod events;
pub mod provider;
pub mod sync;

pub use events::decode_log;
pub use provider::RpcProvider;
pub use sync::SyncEngine;
