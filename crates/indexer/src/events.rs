//! Decoded inbound events.
//!
//! Every log the listener understands is turned into an [`Envelope`]: the
//! chain coordinates of the log plus one typed [`EnsEvent`] variant. The
//! projector matches on these exhaustively.

use alloy::primitives::{Address, Bytes, FixedBytes, B256, U256};
use ensgraph_core::EventId;

/// Chain coordinates of a single log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogMeta {
    /// Block the log was emitted in.
    pub block_number: u64,
    /// Index of the log within its block.
    pub log_index: u64,
    /// Hash of the emitting transaction.
    pub transaction_hash: B256,
    /// Block timestamp (unix seconds).
    pub timestamp: u64,
}

impl LogMeta {
    /// Identifier shared by every record produced from this log.
    pub const fn event_id(&self) -> EventId {
        EventId::new(self.block_number, self.log_index)
    }
}

/// A decoded event together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Log coordinates.
    pub meta: LogMeta,
    /// Decoded payload.
    pub event: EnsEvent,
}

impl Envelope {
    /// Wrap an event.
    pub fn new(meta: LogMeta, event: EnsEvent) -> Self {
        Self { meta, event }
    }

    /// Canonical ordering key.
    pub const fn position(&self) -> (u64, u64) {
        (self.meta.block_number, self.meta.log_index)
    }
}

/// Which registry deployment emitted a registry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrySource {
    /// The current (migrated) registry.
    Current,
    /// The legacy registry, only authoritative for unmigrated names.
    Legacy,
}

/// Every event kind the projector understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsEvent {
    /// Registry event from either deployment.
    Registry {
        /// Emitting deployment.
        source: RegistrySource,
        /// Payload.
        event: RegistryEvent,
    },
    /// Base registrar or controller event.
    Registrar(RegistrarEvent),
    /// Resolver event. The emitting contract is the resolver.
    Resolver {
        /// Resolver contract address.
        resolver: Address,
        /// Node the record belongs to.
        node: B256,
        /// Payload.
        event: ResolverEvent,
    },
    /// Name wrapper event.
    Wrapper(WrapperEvent),
}

/// Registry events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// Ownership of a subnode `keccak(node, label)` was assigned.
    NewOwner {
        /// Parent node.
        node: B256,
        /// Label hash of the child.
        label: B256,
        /// New owner.
        owner: Address,
    },
    /// Ownership of `node` changed.
    Transfer {
        /// Node.
        node: B256,
        /// New owner.
        owner: Address,
    },
    /// Resolver pointer of `node` changed.
    NewResolver {
        /// Node.
        node: B256,
        /// New resolver, zero to clear.
        resolver: Address,
    },
    /// TTL of `node` changed.
    NewTtl {
        /// Node.
        node: B256,
        /// New TTL.
        ttl: u64,
    },
}

/// Base registrar and controller events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrarEvent {
    /// Base registrar registration.
    NameRegistered {
        /// Token id (the label hash as an integer).
        token_id: U256,
        /// Registrant.
        owner: Address,
        /// Registrar expiry, without grace period.
        expires: U256,
    },
    /// Base registrar renewal.
    NameRenewed {
        /// Token id.
        token_id: U256,
        /// New registrar expiry.
        expires: U256,
    },
    /// ERC-721 transfer of a registration token.
    NameTransferred {
        /// Token id.
        token_id: U256,
        /// New registrant.
        to: Address,
    },
    /// Current controller registration (preimage reveal).
    NameRegisteredByController {
        /// Plaintext label.
        name: String,
        /// Label hash.
        label: B256,
        /// Base price paid.
        base_cost: U256,
        /// Premium paid.
        premium: U256,
    },
    /// Legacy controller registration (preimage reveal).
    NameRegisteredByControllerOld {
        /// Plaintext label.
        name: String,
        /// Label hash.
        label: B256,
        /// Price paid.
        cost: U256,
    },
    /// Controller renewal (preimage reveal).
    NameRenewedByController {
        /// Plaintext label.
        name: String,
        /// Label hash.
        label: B256,
        /// Price paid.
        cost: U256,
    },
}

/// Resolver record changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverEvent {
    /// ETH address record changed.
    AddrChanged {
        /// New address.
        addr: Address,
    },
    /// Multicoin address record changed.
    AddressChanged {
        /// SLIP-44 coin type.
        coin_type: U256,
        /// Raw address bytes.
        new_address: Bytes,
    },
    /// Reverse name record changed.
    NameChanged {
        /// New name.
        name: String,
    },
    /// ABI record changed.
    AbiChanged {
        /// ABI content type bitmask.
        content_type: U256,
    },
    /// Public key record changed.
    PubkeyChanged {
        /// X coordinate.
        x: B256,
        /// Y coordinate.
        y: B256,
    },
    /// Text record changed. Older resolvers omit the value.
    TextChanged {
        /// Record key.
        key: String,
        /// Record value, if emitted.
        value: Option<String>,
    },
    /// Content hash changed.
    ContenthashChanged {
        /// New content hash.
        hash: Bytes,
    },
    /// Interface implementer changed.
    InterfaceChanged {
        /// ERC-165 interface id.
        interface_id: FixedBytes<4>,
        /// Implementing contract.
        implementer: Address,
    },
    /// Authorisation changed.
    AuthorisationChanged {
        /// Owner granting the authorisation.
        owner: Address,
        /// Authorised account.
        target: Address,
        /// Whether the target is now authorised.
        is_authorised: bool,
    },
    /// Record version bumped; all records for the node are invalidated.
    VersionChanged {
        /// New version.
        new_version: u64,
    },
}

/// Name wrapper events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapperEvent {
    /// A name was wrapped.
    NameWrapped {
        /// Node.
        node: B256,
        /// DNS wire-format name.
        name: Bytes,
        /// Wrapped owner.
        owner: Address,
        /// Fuse bits.
        fuses: u32,
        /// Wrapper expiry.
        expiry: u64,
    },
    /// A name was unwrapped.
    NameUnwrapped {
        /// Node.
        node: B256,
        /// Owner receiving the unwrapped name.
        owner: Address,
    },
    /// Fuses were burned.
    FusesSet {
        /// Node.
        node: B256,
        /// New fuse bits.
        fuses: u32,
    },
    /// Wrapper expiry was extended.
    ExpiryExtended {
        /// Node.
        node: B256,
        /// New expiry.
        expiry: u64,
    },
    /// ERC-1155 single transfer; token id is the node.
    TransferSingle {
        /// Recipient.
        to: Address,
        /// Token id.
        id: U256,
    },
    /// ERC-1155 batch transfer.
    TransferBatch {
        /// Recipient.
        to: Address,
        /// Token ids, applied in order.
        ids: Vec<U256>,
    },
}

impl EnsEvent {
    /// Short kind name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EnsEvent::Registry { event, .. } => match event {
                RegistryEvent::NewOwner { .. } => "NewOwner",
                RegistryEvent::Transfer { .. } => "Transfer",
                RegistryEvent::NewResolver { .. } => "NewResolver",
                RegistryEvent::NewTtl { .. } => "NewTTL",
            },
            EnsEvent::Registrar(event) => match event {
                RegistrarEvent::NameRegistered { .. } => "NameRegistered",
                RegistrarEvent::NameRenewed { .. } => "NameRenewed",
                RegistrarEvent::NameTransferred { .. } => "NameTransferred",
                RegistrarEvent::NameRegisteredByController { .. } => "NameRegisteredByController",
                RegistrarEvent::NameRegisteredByControllerOld { .. } => {
                    "NameRegisteredByControllerOld"
                }
                RegistrarEvent::NameRenewedByController { .. } => "NameRenewedByController",
            },
            EnsEvent::Resolver { event, .. } => match event {
                ResolverEvent::AddrChanged { .. } => "AddrChanged",
                ResolverEvent::AddressChanged { .. } => "AddressChanged",
                ResolverEvent::NameChanged { .. } => "NameChanged",
                ResolverEvent::AbiChanged { .. } => "ABIChanged",
                ResolverEvent::PubkeyChanged { .. } => "PubkeyChanged",
                ResolverEvent::TextChanged { .. } => "TextChanged",
                ResolverEvent::ContenthashChanged { .. } => "ContenthashChanged",
                ResolverEvent::InterfaceChanged { .. } => "InterfaceChanged",
                ResolverEvent::AuthorisationChanged { .. } => "AuthorisationChanged",
                ResolverEvent::VersionChanged { .. } => "VersionChanged",
            },
            EnsEvent::Wrapper(event) => match event {
                WrapperEvent::NameWrapped { .. } => "NameWrapped",
                WrapperEvent::NameUnwrapped { .. } => "NameUnwrapped",
                WrapperEvent::FusesSet { .. } => "FusesSet",
                WrapperEvent::ExpiryExtended { .. } => "ExpiryExtended",
                WrapperEvent::TransferSingle { .. } => "TransferSingle",
                WrapperEvent::TransferBatch { .. } => "TransferBatch",
            },
        }
    }
}
