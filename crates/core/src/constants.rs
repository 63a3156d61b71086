//! Canonical constants for the ENS contracts.
//!
//! These values are fixed by the deployed contracts and must not change.

use alloy_primitives::{b256, Address, B256};

/// Namehash of the root node (32 zero bytes).
pub const ROOT_NODE: B256 = B256::ZERO;

/// Namehash of `eth`.
/// keccak256(ROOT_NODE || keccak256("eth"))
pub const ETH_NODE: B256 =
    b256!("93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae");

/// Top-level label under which the registrar issues names.
pub const ETH_TLD: &str = "eth";

/// The empty owner. The root node is owned by it and released names revert to it.
pub const EMPTY_ADDRESS: Address = Address::ZERO;

/// Grace period added to registrar expiries for display purposes (90 days).
pub const GRACE_PERIOD_SECONDS: u64 = 7_776_000;

/// Name wrapper fuse: the parent can no longer replace or burn fuses on this name.
pub const PARENT_CANNOT_CONTROL: u32 = 0x1_0000;

/// Returns true when the `PARENT_CANNOT_CONTROL` fuse is burned in `fuses`.
pub const fn parent_cannot_control(fuses: u32) -> bool {
    fuses & PARENT_CANNOT_CONTROL == PARENT_CANNOT_CONTROL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::{compute_subnode, labelhash};

    #[test]
    fn test_eth_node_matches_namehash() {
        assert_eq!(compute_subnode(&ROOT_NODE, labelhash(ETH_TLD)), ETH_NODE);
    }

    #[test]
    fn test_parent_cannot_control() {
        assert!(parent_cannot_control(PARENT_CANNOT_CONTROL));
        assert!(parent_cannot_control(PARENT_CANNOT_CONTROL | 0x1));
        assert!(!parent_cannot_control(0xffff));
        assert!(!parent_cannot_control(0));
    }
}
