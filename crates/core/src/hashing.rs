//! Hashing utilities for ENS names.
//!
//! Provides keccak256, namehash and the subnode derivation used by the
//! registry, registrar and name wrapper. All of these must match the Solidity
//! contracts exactly.

use crate::constants::{ETH_NODE, ROOT_NODE};
use alloy_primitives::{hex, keccak256 as alloy_keccak256, B256, U256};

/// Compute keccak256 hash of input data.
///
/// This is a re-export of Alloy's keccak256 for convenience.
pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    alloy_keccak256(data)
}

/// Hash of a single plaintext label, e.g. `labelhash("alice")`.
pub fn labelhash(label: &str) -> B256 {
    keccak256(label.as_bytes())
}

/// Derive a child node: `keccak256(parent || label)`.
///
/// `label` is the raw label bytes. For registry events this is always the
/// 32-byte label hash; the registrar passes the minimal big-endian encoding of
/// its token id (see [`token_label_bytes`]).
///
/// # Example
///
/// ```
/// use ensgraph_core::{compute_subnode, labelhash, ETH_NODE, ROOT_NODE};
///
/// assert_eq!(compute_subnode(&ROOT_NODE, labelhash("eth")), ETH_NODE);
/// ```
pub fn compute_subnode(parent: &B256, label: impl AsRef<[u8]>) -> B256 {
    let label = label.as_ref();
    let mut data = Vec::with_capacity(32 + label.len());
    data.extend_from_slice(parent.as_slice());
    data.extend_from_slice(label);

    keccak256(&data)
}

/// Compute the namehash of a dotted name.
///
/// Labels are folded from the top-level label down, starting at the root
/// node. The empty name and `"."` both hash to the root node.
///
/// # Example
///
/// ```
/// use ensgraph_core::{namehash, ETH_NODE};
///
/// assert_eq!(namehash("eth"), ETH_NODE);
/// ```
pub fn namehash(name: &str) -> B256 {
    let name = name.trim_end_matches('.');
    if name.is_empty() {
        return ROOT_NODE;
    }

    name.rsplit('.')
        .fold(ROOT_NODE, |node, label| compute_subnode(&node, labelhash(label)))
}

/// Minimal big-endian byte encoding of a registrar token id.
///
/// Leading zero bytes are stripped; zero itself encodes as a single zero byte.
pub fn token_label_bytes(token_id: &U256) -> Vec<u8> {
    let bytes = token_id.to_be_bytes::<32>();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(31);
    bytes[first..].to_vec()
}

/// Registration identifier for a registrar token id (hex of the minimal encoding).
pub fn token_label_id(token_id: &U256) -> String {
    hex::encode_prefixed(token_label_bytes(token_id))
}

/// Domain id of the `.eth` second-level name for a registrar token id.
pub fn eth_subnode(token_id: &U256) -> B256 {
    compute_subnode(&ETH_NODE, token_label_bytes(token_id))
}

/// A 256-bit token id read as a 32-byte word (left-padded).
///
/// Registrar token ids are label hashes and name wrapper token ids are
/// namehashes, so this recovers the hash either way.
pub fn token_id_to_b256(token_id: &U256) -> B256 {
    B256::from(token_id.to_be_bytes::<32>())
}

/// Inverse of [`token_id_to_b256`].
pub fn b256_to_token_id(word: &B256) -> U256 {
    U256::from_be_bytes(word.0)
}
