//! Batch prefetch.
//!
//! Projection is synchronous, so everything a batch may read has to be in
//! memory beforehand. The key set below mirrors what the projectors derive
//! from each event; parents are then followed until the ancestor chain is
//! complete, since pruning walks up the tree.

use std::collections::BTreeSet;

use alloy::primitives::B256;
use anyhow::Result;
use ensgraph_core::{
    b256_to_token_id, compute_subnode, eth_subnode, token_id_to_b256, token_label_id, ResolverId,
    ETH_NODE, ROOT_NODE,
};
use tracing::debug;

use super::Storage;
use crate::events::{EnsEvent, Envelope, RegistrarEvent, RegistryEvent, WrapperEvent};
use crate::store::Snapshot;

/// Entity ids a batch may reference.
#[derive(Debug, Default)]
struct Keys {
    domains: BTreeSet<B256>,
    resolvers: BTreeSet<ResolverId>,
    registrations: BTreeSet<String>,
    wrapped: BTreeSet<B256>,
}

impl Keys {
    fn collect(envelopes: &[Envelope]) -> Self {
        let mut keys = Self::default();
        keys.domains.insert(ROOT_NODE);
        keys.domains.insert(ETH_NODE);

        for envelope in envelopes {
            match &envelope.event {
                EnsEvent::Registry { event, .. } => match event {
                    RegistryEvent::NewOwner { node, label, .. } => {
                        keys.domains.insert(*node);
                        keys.domains.insert(compute_subnode(node, label));
                    }
                    RegistryEvent::Transfer { node, .. } | RegistryEvent::NewTtl { node, .. } => {
                        keys.domains.insert(*node);
                    }
                    RegistryEvent::NewResolver { node, resolver } => {
                        keys.domains.insert(*node);
                        keys.resolvers.insert(ResolverId::new(*resolver, *node));
                    }
                },
                EnsEvent::Registrar(event) => match event {
                    RegistrarEvent::NameRegistered { token_id, .. }
                    | RegistrarEvent::NameRenewed { token_id, .. }
                    | RegistrarEvent::NameTransferred { token_id, .. } => {
                        keys.domains.insert(eth_subnode(token_id));
                        keys.registrations.insert(token_label_id(token_id));
                    }
                    RegistrarEvent::NameRegisteredByController { label, .. }
                    | RegistrarEvent::NameRegisteredByControllerOld { label, .. }
                    | RegistrarEvent::NameRenewedByController { label, .. } => {
                        keys.domains.insert(compute_subnode(&ETH_NODE, label));
                        keys.registrations.insert(token_label_id(&b256_to_token_id(label)));
                    }
                },
                EnsEvent::Resolver { resolver, node, .. } => {
                    keys.domains.insert(*node);
                    keys.resolvers.insert(ResolverId::new(*resolver, *node));
                }
                EnsEvent::Wrapper(event) => match event {
                    WrapperEvent::NameWrapped { node, .. }
                    | WrapperEvent::NameUnwrapped { node, .. }
                    | WrapperEvent::FusesSet { node, .. }
                    | WrapperEvent::ExpiryExtended { node, .. } => keys.node(*node),
                    WrapperEvent::TransferSingle { id, .. } => keys.node(token_id_to_b256(id)),
                    WrapperEvent::TransferBatch { ids, .. } => {
                        for id in ids {
                            keys.node(token_id_to_b256(id));
                        }
                    }
                },
            }
        }

        keys
    }

    fn node(&mut self, node: B256) {
        self.domains.insert(node);
        self.wrapped.insert(node);
    }
}

impl Storage {
    /// Load every persisted entity `envelopes` can reference.
    pub async fn prefetch(&self, envelopes: &[Envelope]) -> Result<Snapshot> {
        let keys = Keys::collect(envelopes);
        let mut snapshot = Snapshot::new();

        let mut pending: Vec<B256> = keys.domains.into_iter().collect();
        while let Some(id) = pending.pop() {
            if snapshot.domains.contains_key(&id) {
                continue;
            }
            if let Some(domain) = self.get_domain(&id).await? {
                if let Some(parent) = domain.parent {
                    if !snapshot.domains.contains_key(&parent) {
                        pending.push(parent);
                    }
                }
                snapshot.domains.insert(id, domain);
            }
        }

        for id in &keys.resolvers {
            if let Some(resolver) = self.get_resolver(id).await? {
                snapshot.resolvers.insert(*id, resolver);
            }
        }

        for id in &keys.registrations {
            if let Some(registration) = self.get_registration(id).await? {
                snapshot.registrations.insert(id.clone(), registration);
            }
        }

        for id in &keys.wrapped {
            if let Some(wrapped) = self.get_wrapped_domain(id).await? {
                snapshot.wrapped_domains.insert(*id, wrapped);
            }
        }

        debug!(
            events = envelopes.len(),
            domains = snapshot.domains.len(),
            resolvers = snapshot.resolvers.len(),
            registrations = snapshot.registrations.len(),
            wrapped = snapshot.wrapped_domains.len(),
            "Prefetched snapshot"
        );

        Ok(snapshot)
    }
}
