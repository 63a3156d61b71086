//! Immutable audit records, one per applied log.
//!
//! Records are grouped under three umbrellas (domain, resolver and
//! registration events). Each umbrella row references exactly one specific
//! kind, carried here as the `kind` enum and persisted as a tagged JSON
//! payload.

use alloy::primitives::{Address, Bytes, FixedBytes, B256, U256};
use ensgraph_core::{EventId, ResolverId};
use serde::{Deserialize, Serialize};

use crate::events::LogMeta;

/// Fields every record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// `<blockNumber>-<logIndex>`.
    pub id: EventId,
    /// Block number.
    pub block_number: u64,
    /// Originating transaction hash.
    pub transaction_id: B256,
}

impl From<&LogMeta> for EventMeta {
    fn from(meta: &LogMeta) -> Self {
        Self {
            id: meta.event_id(),
            block_number: meta.block_number,
            transaction_id: meta.transaction_hash,
        }
    }
}

/// Registry and wrapper events attached to a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEventRecord {
    /// Common fields.
    pub meta: EventMeta,
    /// Domain reference; `None` when the domain was not known.
    pub domain: Option<B256>,
    /// Specific event.
    pub kind: DomainEventKind,
}

/// Specific domain event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEventKind {
    /// Registry `NewOwner`.
    NewOwner {
        /// Parent node.
        parent: B256,
        /// New owner.
        owner: Address,
    },
    /// Registry `Transfer`.
    Transfer {
        /// New owner.
        owner: Address,
    },
    /// Registry `NewResolver`.
    NewResolver {
        /// New resolver, `None` when cleared.
        resolver: Option<ResolverId>,
    },
    /// Registry `NewTTL`.
    #[serde(rename = "newTTL")]
    NewTtl {
        /// New TTL.
        ttl: u64,
    },
    /// Wrapper `NameWrapped`.
    NameWrapped {
        /// Decoded name, if decodable.
        name: Option<String>,
        /// Fuse bits.
        fuses: u32,
        /// Wrapper expiry.
        expiry_date: u64,
        /// Wrapped owner.
        owner: Address,
    },
    /// Wrapper `NameUnwrapped`.
    NameUnwrapped {
        /// Owner after unwrapping.
        owner: Address,
    },
    /// Wrapper `FusesSet`.
    FusesSet {
        /// Fuse bits.
        fuses: u32,
    },
    /// Wrapper `ExpiryExtended`.
    ExpiryExtended {
        /// New expiry.
        expiry_date: u64,
    },
    /// Wrapper ERC-1155 transfer.
    WrappedTransfer {
        /// Recipient.
        owner: Address,
    },
}

impl DomainEventKind {
    /// Stored kind name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewOwner { .. } => "NewOwner",
            Self::Transfer { .. } => "Transfer",
            Self::NewResolver { .. } => "NewResolver",
            Self::NewTtl { .. } => "NewTTL",
            Self::NameWrapped { .. } => "NameWrapped",
            Self::NameUnwrapped { .. } => "NameUnwrapped",
            Self::FusesSet { .. } => "FusesSet",
            Self::ExpiryExtended { .. } => "ExpiryExtended",
            Self::WrappedTransfer { .. } => "WrappedTransfer",
        }
    }
}

/// Resolver record change events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverEventRecord {
    /// Common fields.
    pub meta: EventMeta,
    /// Resolver the event was emitted for.
    pub resolver: ResolverId,
    /// Specific event.
    pub kind: ResolverEventKind,
}

/// Specific resolver event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResolverEventKind {
    /// ETH address changed.
    AddrChanged {
        /// New address.
        addr: Address,
    },
    /// Multicoin address changed.
    MulticoinAddrChanged {
        /// Coin type.
        coin_type: U256,
        /// Raw address bytes.
        addr: Bytes,
    },
    /// Name record changed.
    NameChanged {
        /// New name.
        name: String,
    },
    /// ABI record changed.
    AbiChanged {
        /// Content type.
        content_type: U256,
    },
    /// Public key changed.
    PubkeyChanged {
        /// X coordinate.
        x: B256,
        /// Y coordinate.
        y: B256,
    },
    /// Text record changed.
    TextChanged {
        /// Key.
        key: String,
        /// Value, when the resolver emits it.
        value: Option<String>,
    },
    /// Content hash changed.
    ContenthashChanged {
        /// New hash.
        hash: Bytes,
    },
    /// Interface implementer changed.
    InterfaceChanged {
        /// Interface id.
        interface_id: FixedBytes<4>,
        /// Implementer.
        implementer: Address,
    },
    /// Authorisation changed.
    AuthorisationChanged {
        /// Owner.
        owner: Address,
        /// Target.
        target: Address,
        /// New flag.
        is_authorised: bool,
    },
    /// Version bumped.
    VersionChanged {
        /// New version.
        version: u64,
    },
}

impl ResolverEventKind {
    /// Stored kind name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddrChanged { .. } => "AddrChanged",
            Self::MulticoinAddrChanged { .. } => "MulticoinAddrChanged",
            Self::NameChanged { .. } => "NameChanged",
            Self::AbiChanged { .. } => "AbiChanged",
            Self::PubkeyChanged { .. } => "PubkeyChanged",
            Self::TextChanged { .. } => "TextChanged",
            Self::ContenthashChanged { .. } => "ContenthashChanged",
            Self::InterfaceChanged { .. } => "InterfaceChanged",
            Self::AuthorisationChanged { .. } => "AuthorisationChanged",
            Self::VersionChanged { .. } => "VersionChanged",
        }
    }
}

/// Registrar events attached to a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationEventRecord {
    /// Common fields.
    pub meta: EventMeta,
    /// Registration id; `None` when the registration was not known.
    pub registration: Option<String>,
    /// Specific event.
    pub kind: RegistrationEventKind,
}

/// Specific registration event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegistrationEventKind {
    /// Base registrar registration.
    NameRegistered {
        /// Registrant.
        registrant: Address,
        /// Registrar expiry.
        expiry_date: U256,
    },
    /// Base registrar renewal.
    NameRenewed {
        /// Registrar expiry.
        expiry_date: U256,
    },
    /// Token transfer.
    NameTransferred {
        /// New registrant.
        new_owner: Address,
    },
}

impl RegistrationEventKind {
    /// Stored kind name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NameRegistered { .. } => "NameRegistered",
            Self::NameRenewed { .. } => "NameRenewed",
            Self::NameTransferred { .. } => "NameTransferred",
        }
    }
}

/// Any staged record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRecord {
    /// Domain umbrella.
    Domain(DomainEventRecord),
    /// Resolver umbrella.
    Resolver(ResolverEventRecord),
    /// Registration umbrella.
    Registration(RegistrationEventRecord),
}

impl EventRecord {
    /// Record identity.
    pub fn id(&self) -> EventId {
        match self {
            Self::Domain(r) => r.meta.id,
            Self::Resolver(r) => r.meta.id,
            Self::Registration(r) => r.meta.id,
        }
    }

    /// Stored kind name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Domain(r) => r.kind.name(),
            Self::Resolver(r) => r.kind.name(),
            Self::Registration(r) => r.kind.name(),
        }
    }
}
