//! Identifier types shared by the projector and storage.

use alloy_primitives::{hex, Address, B256};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Identity of an immutable event record: `<blockNumber>-<logIndex>`.
///
/// Wrapper batch transfers emit one record per token id and carry the array
/// position as `sequence`, rendered as a third segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    /// Block the log was emitted in.
    pub block_number: u64,
    /// Position of the log within the block.
    pub log_index: u64,
    /// Position inside a batch transfer, if any.
    pub sequence: Option<u32>,
}

impl EventId {
    /// Create an id for a plain log.
    pub const fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
            sequence: None,
        }
    }

    /// Derive the id for the `sequence`-th record of the same log.
    pub const fn with_sequence(self, sequence: u32) -> Self {
        Self {
            sequence: Some(sequence),
            ..self
        }
    }

    /// The canonical chain position `(blockNumber, logIndex)`.
    pub const fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

impl Ord for EventId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.position()
            .cmp(&other.position())
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for EventId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sequence {
            Some(seq) => write!(f, "{}-{}-{}", self.block_number, self.log_index, seq),
            None => write!(f, "{}-{}", self.block_number, self.log_index),
        }
    }
}

impl FromStr for EventId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoreError::MalformedEventId(s.to_string());
        let mut parts = s.split('-');

        let block_number = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(malformed)?;
        let log_index = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(malformed)?;
        let sequence = match parts.next() {
            Some(p) => Some(p.parse().map_err(|_| malformed())?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(malformed());
        }

        Ok(Self {
            block_number,
            log_index,
            sequence,
        })
    }
}

/// Composite resolver identity: `<resolverAddress>-<node>`.
///
/// The same resolver contract serving two names yields two distinct records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolverId {
    /// Resolver contract address.
    pub address: Address,
    /// Namehash of the domain the records belong to.
    pub node: B256,
}

impl ResolverId {
    /// Create a new resolver id.
    pub const fn new(address: Address, node: B256) -> Self {
        Self { address, node }
    }
}

impl fmt::Display for ResolverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            hex::encode_prefixed(self.address),
            hex::encode_prefixed(self.node)
        )
    }
}

impl FromStr for ResolverId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoreError::MalformedResolverId(s.to_string());
        let (address, node) = s.split_once('-').ok_or_else(malformed)?;

        Ok(Self {
            address: address.parse().map_err(|_| malformed())?,
            node: node.parse().map_err(|_| malformed())?,
        })
    }
}

impl Serialize for ResolverId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResolverId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
