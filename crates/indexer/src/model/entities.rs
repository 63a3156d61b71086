//! Mutable current-state entities.

use alloy::primitives::{Address, Bytes, B256, U256};
use ensgraph_core::{ResolverId, ROOT_NODE};

/// A node in the name tree, keyed by namehash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Namehash.
    pub id: B256,
    /// Dotted name; label segments with unknown plaintext render as `[hash]`.
    pub name: Option<String>,
    /// Plaintext of the leftmost label, once known.
    pub label_name: Option<String>,
    /// Hash of the leftmost label.
    pub labelhash: Option<B256>,
    /// Parent node (`None` for the root and for nodes only seen by resolvers or the wrapper).
    pub parent: Option<B256>,
    /// Number of retained children.
    pub subdomain_count: u32,
    /// Address published by the current resolver, cached.
    pub resolved_address: Option<Address>,
    /// Registry owner.
    pub owner: Address,
    /// Current resolver pointer.
    pub resolver: Option<ResolverId>,
    /// Registry TTL.
    pub ttl: Option<u64>,
    /// Whether the current registry is authoritative for this node.
    pub is_migrated: bool,
    /// Timestamp of the block that created the node.
    pub created_at: u64,
    /// Registrar registrant (second-level `.eth` names).
    pub registrant: Option<Address>,
    /// Name wrapper owner.
    pub wrapped_owner: Option<Address>,
    /// Effective expiry (registrar expiry plus grace period, or wrapper expiry).
    pub expiry_date: Option<U256>,
    /// Logically deleted: not counted by the parent's `subdomain_count`.
    pub is_pruned: bool,
}

impl Domain {
    /// A fresh, empty domain.
    pub fn new(id: B256, created_at: u64) -> Self {
        Self {
            id,
            name: None,
            label_name: None,
            labelhash: None,
            parent: None,
            subdomain_count: 0,
            resolved_address: None,
            owner: Address::ZERO,
            resolver: None,
            ttl: None,
            is_migrated: false,
            created_at,
            registrant: None,
            wrapped_owner: None,
            expiry_date: None,
            is_pruned: false,
        }
    }

    /// The root node as it must always appear.
    pub fn root(created_at: u64) -> Self {
        let mut root = Self::new(ROOT_NODE, created_at);
        root.is_migrated = true;
        root
    }

    /// Re-assert the fixed root attributes on a loaded root.
    ///
    /// Owner, migration flag, parent and subdomain count never change for the
    /// root. Name, resolver and TTL may.
    pub fn pin_root(&mut self) {
        self.owner = Address::ZERO;
        self.is_migrated = true;
        self.parent = None;
        self.subdomain_count = 0;
        self.is_pruned = false;
    }

    /// True when the domain holds no owner, resolver or children.
    pub fn is_empty(&self) -> bool {
        let no_resolver = self.resolver.map_or(true, |r| r.address.is_zero());
        no_resolver && self.owner.is_zero() && self.subdomain_count == 0
    }
}

/// Records published by one resolver contract for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
    /// `<address>-<node>`.
    pub id: ResolverId,
    /// Node the records belong to. The domain row may not exist.
    pub domain: B256,
    /// Resolver contract.
    pub address: Address,
    /// ETH address record.
    pub addr: Option<Address>,
    /// Content hash record.
    pub content_hash: Option<Bytes>,
    /// Text record keys, in first-seen order.
    pub texts: Vec<String>,
    /// Multicoin types, in first-seen order.
    pub coin_types: Vec<U256>,
}

impl Resolver {
    /// A bare resolver with no records.
    pub fn new(id: ResolverId) -> Self {
        Self {
            id,
            domain: id.node,
            address: id.address,
            addr: None,
            content_hash: None,
            texts: Vec::new(),
            coin_types: Vec::new(),
        }
    }

    /// Append a text key unless already present.
    pub fn add_text(&mut self, key: &str) -> bool {
        if self.texts.iter().any(|k| k == key) {
            return false;
        }
        self.texts.push(key.to_string());
        true
    }

    /// Append a coin type unless already present.
    pub fn add_coin_type(&mut self, coin_type: U256) -> bool {
        if self.coin_types.contains(&coin_type) {
            return false;
        }
        self.coin_types.push(coin_type);
        true
    }

    /// Drop every published record.
    pub fn clear_records(&mut self) {
        self.addr = None;
        self.content_hash = None;
        self.texts.clear();
        self.coin_types.clear();
    }
}

/// A `.eth` registrar registration, keyed by label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Hex of the label bytes.
    pub id: String,
    /// The registered domain.
    pub domain: B256,
    /// Block timestamp of registration.
    pub registration_date: u64,
    /// Registrar expiry, without grace period.
    pub expiry_date: U256,
    /// Price paid, once a controller reveals it.
    pub cost: Option<U256>,
    /// Current registrant.
    pub registrant: Address,
    /// Plaintext label, once revealed.
    pub label_name: Option<String>,
}

/// Name wrapper state for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedDomain {
    /// Namehash.
    pub id: B256,
    /// The wrapped domain.
    pub domain: B256,
    /// ERC-1155 owner.
    pub owner: Address,
    /// Wrapper expiry.
    pub expiry_date: u64,
    /// Fuse bits.
    pub fuses: u32,
    /// Decoded name.
    pub name: Option<String>,
}

impl WrappedDomain {
    /// Placeholder created by a transfer that precedes `NameWrapped`.
    pub fn placeholder(id: B256, owner: Address) -> Self {
        Self {
            id,
            domain: id,
            owner,
            expiry_date: 0,
            fuses: 0,
            name: None,
        }
    }
}
