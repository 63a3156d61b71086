//! Working-Set Store: the in-batch entity cache the projectors operate on.
//!
//! Reads go to the working set first and fall through to a [`Backend`] on
//! first reference. Writes only touch the working set. At batch end
//! [`WorkingSet::into_changeset`] hands back every touched entity and every
//! staged record for a single upsert-style flush.
//!
//! Backends are synchronous so that projection never suspends; the storage
//! layer prefetches a [`Snapshot`] for the batch before projecting.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use alloy::primitives::{Address, B256};
use ensgraph_core::{EventId, ResolverId, ROOT_NODE};

use crate::model::{Domain, EventRecord, Registration, Resolver, WrappedDomain};

/// Read-only source of previously persisted entities.
pub trait Backend {
    /// Look up a domain by namehash.
    fn domain(&self, id: &B256) -> Option<Domain>;
    /// Look up a resolver by composite id.
    fn resolver(&self, id: &ResolverId) -> Option<Resolver>;
    /// Look up a registration by label id.
    fn registration(&self, id: &str) -> Option<Registration>;
    /// Look up wrapper state by namehash.
    fn wrapped_domain(&self, id: &B256) -> Option<WrappedDomain>;
}

/// An in-memory backend.
///
/// Used as the prefetched view of durable storage for one batch, and directly
/// in tests.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Domains by namehash.
    pub domains: HashMap<B256, Domain>,
    /// Resolvers by composite id.
    pub resolvers: HashMap<ResolverId, Resolver>,
    /// Registrations by label id.
    pub registrations: HashMap<String, Registration>,
    /// Wrapper state by namehash.
    pub wrapped_domains: HashMap<B256, WrappedDomain>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a flushed changeset into the snapshot.
    ///
    /// Lets consecutive batches run against one snapshot without a database.
    pub fn apply(&mut self, changes: &Changeset) {
        for domain in &changes.domains {
            self.domains.insert(domain.id, domain.clone());
        }
        for resolver in &changes.resolvers {
            self.resolvers.insert(resolver.id, resolver.clone());
        }
        for registration in &changes.registrations {
            self.registrations
                .insert(registration.id.clone(), registration.clone());
        }
        for wrapped in &changes.wrapped_domains {
            self.wrapped_domains.insert(wrapped.id, wrapped.clone());
        }
        for id in &changes.removed_wrapped_domains {
            self.wrapped_domains.remove(id);
        }
    }
}

impl Backend for Snapshot {
    fn domain(&self, id: &B256) -> Option<Domain> {
        self.domains.get(id).cloned()
    }

    fn resolver(&self, id: &ResolverId) -> Option<Resolver> {
        self.resolvers.get(id).cloned()
    }

    fn registration(&self, id: &str) -> Option<Registration> {
        self.registrations.get(id).cloned()
    }

    fn wrapped_domain(&self, id: &B256) -> Option<WrappedDomain> {
        self.wrapped_domains.get(id).cloned()
    }
}

/// Cached lookup result: `None` caches a known absence.
type Slot<T> = Option<T>;

/// Per-batch read-through cache with write staging.
pub struct WorkingSet<'a, B: Backend + ?Sized> {
    backend: &'a B,
    domains: HashMap<B256, Slot<Domain>>,
    resolvers: HashMap<ResolverId, Slot<Resolver>>,
    registrations: HashMap<String, Slot<Registration>>,
    wrapped_domains: HashMap<B256, Slot<WrappedDomain>>,
    accounts: BTreeSet<Address>,
    dirty_domains: HashSet<B256>,
    dirty_resolvers: HashSet<ResolverId>,
    dirty_registrations: HashSet<String>,
    dirty_wrapped: HashSet<B256>,
    removed_wrapped: HashSet<B256>,
    events: BTreeMap<EventId, EventRecord>,
}

impl<'a, B: Backend + ?Sized> WorkingSet<'a, B> {
    /// Start a batch over `backend`.
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            domains: HashMap::new(),
            resolvers: HashMap::new(),
            registrations: HashMap::new(),
            wrapped_domains: HashMap::new(),
            accounts: BTreeSet::new(),
            dirty_domains: HashSet::new(),
            dirty_resolvers: HashSet::new(),
            dirty_registrations: HashSet::new(),
            dirty_wrapped: HashSet::new(),
            removed_wrapped: HashSet::new(),
            events: BTreeMap::new(),
        }
    }

    /// Get a domain, reading through on first reference.
    pub fn domain(&mut self, id: &B256) -> Option<Domain> {
        let backend = self.backend;
        self.domains
            .entry(*id)
            .or_insert_with(|| backend.domain(id))
            .clone()
    }

    /// Whether a domain exists.
    pub fn has_domain(&mut self, id: &B256) -> bool {
        self.domain(id).is_some()
    }

    /// Stage a domain write. Root invariants are re-asserted on every write.
    pub fn put_domain(&mut self, mut domain: Domain) {
        if domain.id == ROOT_NODE {
            domain.pin_root();
        }
        self.dirty_domains.insert(domain.id);
        self.domains.insert(domain.id, Some(domain));
    }

    /// Get a resolver, reading through on first reference.
    pub fn resolver(&mut self, id: &ResolverId) -> Option<Resolver> {
        let backend = self.backend;
        self.resolvers
            .entry(*id)
            .or_insert_with(|| backend.resolver(id))
            .clone()
    }

    /// Stage a resolver write.
    pub fn put_resolver(&mut self, resolver: Resolver) {
        self.dirty_resolvers.insert(resolver.id);
        self.resolvers.insert(resolver.id, Some(resolver));
    }

    /// Get a registration, reading through on first reference.
    pub fn registration(&mut self, id: &str) -> Option<Registration> {
        if let Some(slot) = self.registrations.get(id) {
            return slot.clone();
        }
        let loaded = self.backend.registration(id);
        self.registrations.insert(id.to_string(), loaded.clone());
        loaded
    }

    /// Stage a registration write.
    pub fn put_registration(&mut self, registration: Registration) {
        self.dirty_registrations.insert(registration.id.clone());
        self.registrations
            .insert(registration.id.clone(), Some(registration));
    }

    /// Get wrapper state, reading through on first reference.
    pub fn wrapped_domain(&mut self, id: &B256) -> Option<WrappedDomain> {
        let backend = self.backend;
        self.wrapped_domains
            .entry(*id)
            .or_insert_with(|| backend.wrapped_domain(id))
            .clone()
    }

    /// Stage a wrapper state write.
    pub fn put_wrapped_domain(&mut self, wrapped: WrappedDomain) {
        self.removed_wrapped.remove(&wrapped.id);
        self.dirty_wrapped.insert(wrapped.id);
        self.wrapped_domains.insert(wrapped.id, Some(wrapped));
    }

    /// Stage removal of wrapper state.
    pub fn remove_wrapped_domain(&mut self, id: &B256) {
        self.dirty_wrapped.remove(id);
        self.removed_wrapped.insert(*id);
        self.wrapped_domains.insert(*id, None);
    }

    /// Record that an account was referenced.
    pub fn touch_account(&mut self, address: Address) {
        self.accounts.insert(address);
    }

    /// Stage an immutable record. The first record staged under an id wins.
    pub fn push_event(&mut self, record: EventRecord) {
        self.events.entry(record.id()).or_insert(record);
    }

    /// Number of records staged so far.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Finish the batch.
    pub fn into_changeset(self) -> Changeset {
        let mut domains: Vec<Domain> = self
            .dirty_domains
            .iter()
            .filter_map(|id| self.domains.get(id).cloned().flatten())
            .collect();
        domains.sort_by_key(|d| d.id);

        let mut resolvers: Vec<Resolver> = self
            .dirty_resolvers
            .iter()
            .filter_map(|id| self.resolvers.get(id).cloned().flatten())
            .collect();
        resolvers.sort_by_key(|r| r.id);

        let mut registrations: Vec<Registration> = self
            .dirty_registrations
            .iter()
            .filter_map(|id| self.registrations.get(id).cloned().flatten())
            .collect();
        registrations.sort_by(|a, b| a.id.cmp(&b.id));

        let mut wrapped_domains: Vec<WrappedDomain> = self
            .dirty_wrapped
            .iter()
            .filter_map(|id| self.wrapped_domains.get(id).cloned().flatten())
            .collect();
        wrapped_domains.sort_by_key(|w| w.id);

        let mut removed_wrapped_domains: Vec<B256> = self.removed_wrapped.into_iter().collect();
        removed_wrapped_domains.sort();

        Changeset {
            accounts: self.accounts.into_iter().collect(),
            domains,
            resolvers,
            registrations,
            wrapped_domains,
            removed_wrapped_domains,
            events: self.events.into_values().collect(),
        }
    }
}

/// Everything one batch produced, ready to flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    /// Accounts referenced by the batch.
    pub accounts: Vec<Address>,
    /// Touched domains.
    pub domains: Vec<Domain>,
    /// Touched resolvers.
    pub resolvers: Vec<Resolver>,
    /// Touched registrations.
    pub registrations: Vec<Registration>,
    /// Touched wrapper state.
    pub wrapped_domains: Vec<WrappedDomain>,
    /// Wrapper state to delete.
    pub removed_wrapped_domains: Vec<B256>,
    /// New records, in event order.
    pub events: Vec<EventRecord>,
}

impl Changeset {
    /// True when the batch produced nothing.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.domains.is_empty()
            && self.resolvers.is_empty()
            && self.registrations.is_empty()
            && self.wrapped_domains.is_empty()
            && self.removed_wrapped_domains.is_empty()
            && self.events.is_empty()
    }

    /// Find a touched domain.
    pub fn domain(&self, id: &B256) -> Option<&Domain> {
        self.domains.iter().find(|d| d.id == *id)
    }
}
