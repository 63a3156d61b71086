//! # ENS Graph Core
//!
//! Identifier types, constants, hashing and name decoding shared by every
//! component of the ENS graph projector.
//!
//! This crate is pure: it performs no I/O and holds no state. Everything here
//! must match the on-chain contracts byte for byte, since a single differing
//! hash sends an event to the wrong domain.
//!
//! ## Features
//!
//! - **Ethereum Types**: Uses Alloy primitives for Address, B256, U256 and keccak256
//! - **Hashing**: namehash, subnode derivation, token-id label encoding
//! - **DNS**: wire-format name decoding and label validity checks
//! - **Identifiers**: `EventId` (`<block>-<logIndex>`) and `ResolverId` (`<resolver>-<node>`)

#![warn(missing_docs)]

pub mod constants;
pub mod dns;
pub mod error;
pub mod hashing;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use dns::{check_valid_label, decode_name, decode_name_hex, encode_name, DecodedName};
pub use error::{CoreError, Result};
pub use hashing::{
    b256_to_token_id, compute_subnode, eth_subnode, keccak256, labelhash, namehash,
    token_id_to_b256, token_label_bytes, token_label_id,
};
pub use types::*;

// Re-export Alloy primitives for convenience
pub use alloy_primitives::{Address, Bytes, B256, U256};
