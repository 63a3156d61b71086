//! Registry rules: ownership, resolver pointer, TTL, the legacy registry
//! overlay and subtree pruning.

use alloy::primitives::{hex, Address, B256};
use ensgraph_core::{compute_subnode, ResolverId, ROOT_NODE};
use tracing::debug;

use super::{LabelCache, Outcome, SkipReason};
use crate::events::{LogMeta, RegistryEvent, RegistrySource};
use crate::model::{Domain, DomainEventKind, DomainEventRecord, EventMeta, EventRecord, Resolver};
use crate::store::{Backend, WorkingSet};

pub(super) fn apply<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    labels: &mut LabelCache,
    meta: &LogMeta,
    source: RegistrySource,
    event: &RegistryEvent,
) -> Outcome {
    if source == RegistrySource::Legacy {
        if let Some(reason) = legacy_skip(ws, meta, event) {
            debug!(event_id = %meta.event_id(), ?reason, "Ignoring legacy registry event");
            return Outcome::Skipped(reason);
        }
    }

    match *event {
        RegistryEvent::NewOwner { node, label, owner } => new_owner(
            ws,
            labels,
            meta,
            node,
            label,
            owner,
            source == RegistrySource::Current,
        ),
        RegistryEvent::Transfer { node, owner } => transfer(ws, meta, node, owner),
        RegistryEvent::NewResolver { node, resolver } => new_resolver(ws, meta, node, resolver),
        RegistryEvent::NewTtl { node, ttl } => new_ttl(ws, meta, node, ttl),
    }
}

/// The legacy registry only speaks for names the current registry has not
/// taken over.
fn legacy_skip<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    event: &RegistryEvent,
) -> Option<SkipReason> {
    match *event {
        RegistryEvent::NewOwner { node, label, .. } => {
            let subnode = compute_subnode(&node, label);
            match load_domain(ws, &subnode, meta.timestamp) {
                Some(domain) if domain.is_migrated => Some(SkipReason::Migrated),
                _ => None,
            }
        }
        RegistryEvent::Transfer { node, .. } | RegistryEvent::NewTtl { node, .. } => {
            match load_domain(ws, &node, meta.timestamp) {
                None => Some(SkipReason::UnknownDomain),
                Some(domain) if domain.is_migrated => Some(SkipReason::Migrated),
                Some(_) => None,
            }
        }
        RegistryEvent::NewResolver { node, .. } => {
            if node == ROOT_NODE {
                return None;
            }
            match ws.domain(&node) {
                None => Some(SkipReason::UnknownDomain),
                Some(domain) if domain.is_migrated => Some(SkipReason::Migrated),
                Some(_) => None,
            }
        }
    }
}

/// Load a domain; the root always exists and is synthesized on first use.
pub(super) fn load_domain<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    node: &B256,
    timestamp: u64,
) -> Option<Domain> {
    if *node == ROOT_NODE {
        let mut root = ws.domain(node).unwrap_or_else(|| Domain::root(timestamp));
        root.pin_root();
        return Some(root);
    }
    ws.domain(node)
}

fn new_owner<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    labels: &mut LabelCache,
    meta: &LogMeta,
    node: B256,
    label: B256,
    owner: Address,
    is_migrated: bool,
) -> Outcome {
    ws.touch_account(owner);

    let subnode = compute_subnode(&node, label);
    let parent = load_domain(ws, &node, meta.timestamp);
    let mut domain = ws
        .domain(&subnode)
        .unwrap_or_else(|| Domain::new(subnode, meta.timestamp));

    if domain.parent.is_none() {
        if let Some(parent) = &parent {
            if let (Some(parent_label), Some(parent_hash)) = (&parent.label_name, parent.labelhash)
            {
                labels.insert(parent_hash, parent_label.clone());
            }
        }
    }

    if domain.name.is_none() {
        let known = labels.get(&label).map(str::to_owned);
        if let Some(plaintext) = &known {
            domain.label_name = Some(plaintext.clone());
        }

        if node == ROOT_NODE {
            domain.name = Some(known.unwrap_or_else(|| hex::encode_prefixed(label)));
        } else if let Some(parent_name) = parent.as_ref().and_then(|p| p.name.as_deref()) {
            let segment = known.unwrap_or_else(|| format!("[{}]", hex::encode(label)));
            domain.name = Some(format!("{segment}.{parent_name}"));
        }
    }

    if let Some(parent) = parent {
        let counted = domain.parent.is_some() && !domain.is_pruned;
        if !counted {
            // Not yet reflected in the parent's count; `settle` adds it.
            domain.is_pruned = true;
        }
        domain.parent = Some(parent.id);
        if parent.id == ROOT_NODE {
            ws.put_domain(parent);
        }
    }

    domain.owner = owner;
    domain.labelhash = Some(label);
    domain.is_migrated = is_migrated;

    ws.put_domain(domain);
    settle(ws, subnode);

    push(
        ws,
        meta,
        Some(subnode),
        DomainEventKind::NewOwner {
            parent: node,
            owner,
        },
    );
    Outcome::Applied
}

fn transfer<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    node: B256,
    owner: Address,
) -> Outcome {
    ws.touch_account(owner);

    let found = match load_domain(ws, &node, meta.timestamp) {
        Some(mut domain) => {
            domain.owner = owner;
            ws.put_domain(domain);
            settle(ws, node);
            true
        }
        None => false,
    };

    push(
        ws,
        meta,
        found.then_some(node),
        DomainEventKind::Transfer { owner },
    );
    if found {
        Outcome::Applied
    } else {
        Outcome::Recorded
    }
}

fn new_resolver<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    node: B256,
    address: Address,
) -> Outcome {
    let resolver_id = (!address.is_zero()).then(|| ResolverId::new(address, node));

    // A brand-new resolver cannot have an address bound yet.
    let resolved = match resolver_id {
        Some(id) => match ws.resolver(&id) {
            Some(existing) => existing.addr,
            None => {
                ws.put_resolver(Resolver::new(id));
                None
            }
        },
        None => None,
    };

    let found = match load_domain(ws, &node, meta.timestamp) {
        Some(mut domain) => {
            domain.resolver = resolver_id;
            domain.resolved_address = resolved;
            if let Some(addr) = resolved {
                ws.touch_account(addr);
            }
            ws.put_domain(domain);
            settle(ws, node);
            true
        }
        None => false,
    };

    push(
        ws,
        meta,
        found.then_some(node),
        DomainEventKind::NewResolver {
            resolver: resolver_id,
        },
    );
    if found {
        Outcome::Applied
    } else {
        Outcome::Recorded
    }
}

fn new_ttl<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    node: B256,
    ttl: u64,
) -> Outcome {
    // The owner and resolver may have been cleared in the same transaction,
    // so the record is kept even when the domain is gone.
    let found = match load_domain(ws, &node, meta.timestamp) {
        Some(mut domain) => {
            domain.ttl = Some(ttl);
            ws.put_domain(domain);
            true
        }
        None => false,
    };

    push(ws, meta, found.then_some(node), DomainEventKind::NewTtl { ttl });
    if found {
        Outcome::Applied
    } else {
        Outcome::Recorded
    }
}

/// Reconcile a domain's pruned flag with its content and propagate upward.
///
/// An empty domain (no owner, no live resolver, no retained children) is
/// pruned and stops counting toward its parent; a pruned domain that regains
/// content is restored. Each flip changes the parent's count, which may flip
/// the parent in turn, so this walks the parent chain until nothing changes.
/// The root keeps a pinned count of zero and ends the walk.
pub(super) fn settle<B: Backend + ?Sized>(ws: &mut WorkingSet<'_, B>, node: B256) {
    let mut current = node;
    loop {
        let Some(mut domain) = ws.domain(&current) else {
            return;
        };
        let Some(parent_id) = domain.parent else {
            return;
        };

        let empty = domain.is_empty();
        if empty == domain.is_pruned {
            return;
        }
        domain.is_pruned = empty;
        ws.put_domain(domain);

        if parent_id == ROOT_NODE {
            return;
        }
        let Some(mut parent) = ws.domain(&parent_id) else {
            return;
        };
        if empty {
            parent.subdomain_count = parent.subdomain_count.saturating_sub(1);
            debug!(node = %current, parent = %parent_id, "Pruned empty domain");
        } else {
            parent.subdomain_count += 1;
        }
        ws.put_domain(parent);
        current = parent_id;
    }
}

fn push<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    domain: Option<B256>,
    kind: DomainEventKind,
) {
    ws.push_event(EventRecord::Domain(DomainEventRecord {
        meta: EventMeta::from(meta),
        domain,
        kind,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::test_support::at;
    use crate::projector::Projector;
    use crate::events::EnsEvent;
    use crate::store::Snapshot;
    use ensgraph_core::{labelhash, namehash, ETH_NODE};

    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn registry(event: RegistryEvent) -> EnsEvent {
        EnsEvent::Registry {
            source: RegistrySource::Current,
            event,
        }
    }

    fn legacy(event: RegistryEvent) -> EnsEvent {
        EnsEvent::Registry {
            source: RegistrySource::Legacy,
            event,
        }
    }

    fn new_owner(node: B256, label: &str, owner: Address) -> RegistryEvent {
        RegistryEvent::NewOwner {
            node,
            label: labelhash(label),
            owner,
        }
    }

    /// Run events through a fresh projector over `backend`.
    fn run(backend: &Snapshot, events: Vec<EnsEvent>) -> (Snapshot, Vec<Outcome>) {
        let mut projector = Projector::new();
        let mut ws = WorkingSet::new(backend);
        let outcomes = events
            .into_iter()
            .enumerate()
            .map(|(i, e)| projector.apply(&mut ws, &at(100, i as u64, e)).unwrap())
            .collect();
        let mut after = backend.clone();
        after.apply(&ws.into_changeset());
        (after, outcomes)
    }

    #[test]
    fn test_new_owner_builds_names() {
        let (state, _) = run(
            &Snapshot::new(),
            vec![
                registry(new_owner(ROOT_NODE, "eth", ALICE)),
                registry(new_owner(ETH_NODE, "alice", BOB)),
            ],
        );

        let eth = &state.domains[&ETH_NODE];
        assert_eq!(eth.name.as_deref(), Some("eth"));
        assert_eq!(eth.label_name.as_deref(), Some("eth"));
        assert_eq!(eth.parent, Some(ROOT_NODE));
        assert_eq!(eth.subdomain_count, 1);
        assert!(eth.is_migrated);

        let alice = &state.domains[&namehash("alice.eth")];
        let placeholder = format!("[{}].eth", hex::encode(labelhash("alice")));
        assert_eq!(alice.name.as_deref(), Some(placeholder.as_str()));
        assert_eq!(alice.label_name, None);
        assert_eq!(alice.owner, BOB);

        let root = &state.domains[&ROOT_NODE];
        assert_eq!(root.subdomain_count, 0);
        assert_eq!(root.owner, Address::ZERO);
    }

    #[test]
    fn test_new_owner_uses_known_plaintext() {
        let mut projector = Projector::new();
        projector.labels.insert(labelhash("alice"), "alice");
        let backend = Snapshot::new();
        let mut ws = WorkingSet::new(&backend);
        for (i, e) in [
            registry(new_owner(ROOT_NODE, "eth", ALICE)),
            registry(new_owner(ETH_NODE, "alice", BOB)),
        ]
        .into_iter()
        .enumerate()
        {
            projector.apply(&mut ws, &at(1, i as u64, e)).unwrap();
        }
        let alice = ws.domain(&namehash("alice.eth")).unwrap();
        assert_eq!(alice.name.as_deref(), Some("alice.eth"));
        assert_eq!(alice.label_name.as_deref(), Some("alice"));
    }

    #[test]
    fn test_repeated_new_owner_counts_child_once() {
        let (state, _) = run(
            &Snapshot::new(),
            vec![
                registry(new_owner(ROOT_NODE, "eth", ALICE)),
                registry(new_owner(ETH_NODE, "alice", BOB)),
                registry(new_owner(ETH_NODE, "alice", ALICE)),
            ],
        );
        assert_eq!(state.domains[&ETH_NODE].subdomain_count, 1);
        assert_eq!(state.domains[&namehash("alice.eth")].owner, ALICE);
    }

    #[test]
    fn test_transfer_unknown_domain_records_without_reference() {
        let node = namehash("ghost.eth");
        let backend = Snapshot::new();
        let mut projector = Projector::new();
        let mut ws = WorkingSet::new(&backend);
        let outcome = projector
            .apply(
                &mut ws,
                &at(5, 0, registry(RegistryEvent::Transfer { node, owner: BOB })),
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Recorded);

        let changes = ws.into_changeset();
        assert!(changes.domains.is_empty());
        match &changes.events[0] {
            EventRecord::Domain(record) => {
                assert_eq!(record.domain, None);
                assert_eq!(record.kind, DomainEventKind::Transfer { owner: BOB });
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_transfer_of_root_keeps_empty_owner() {
        let (state, _) = run(
            &Snapshot::new(),
            vec![registry(RegistryEvent::Transfer {
                node: ROOT_NODE,
                owner: ALICE,
            })],
        );
        let root = &state.domains[&ROOT_NODE];
        assert_eq!(root.owner, Address::ZERO);
        assert!(root.is_migrated);
    }

    #[test]
    fn test_pruning_cascades_upward() {
        let (state, _) = run(
            &Snapshot::new(),
            vec![
                registry(new_owner(ROOT_NODE, "eth", ALICE)),
                registry(new_owner(ETH_NODE, "alice", Address::ZERO)),
                registry(new_owner(namehash("alice.eth"), "pay", BOB)),
            ],
        );
        // alice has no owner but holds a child, so it is retained
        assert_eq!(state.domains[&namehash("alice.eth")].subdomain_count, 1);
        assert_eq!(state.domains[&ETH_NODE].subdomain_count, 1);
        assert!(!state.domains[&namehash("alice.eth")].is_pruned);

        let (state, _) = run(
            &state,
            vec![registry(RegistryEvent::Transfer {
                node: namehash("pay.alice.eth"),
                owner: Address::ZERO,
            })],
        );
        assert!(state.domains[&namehash("pay.alice.eth")].is_pruned);
        assert!(state.domains[&namehash("alice.eth")].is_pruned);
        assert_eq!(state.domains[&namehash("alice.eth")].subdomain_count, 0);
        assert_eq!(state.domains[&ETH_NODE].subdomain_count, 0);

        // a second empty transfer is a no-op for the tree
        let (again, _) = run(
            &state,
            vec![registry(RegistryEvent::Transfer {
                node: namehash("pay.alice.eth"),
                owner: Address::ZERO,
            })],
        );
        assert_eq!(again.domains, state.domains);
    }

    #[test]
    fn test_pruned_domain_is_restored() {
        let (state, _) = run(
            &Snapshot::new(),
            vec![
                registry(new_owner(ROOT_NODE, "eth", ALICE)),
                registry(new_owner(ETH_NODE, "alice", BOB)),
                registry(RegistryEvent::Transfer {
                    node: namehash("alice.eth"),
                    owner: Address::ZERO,
                }),
            ],
        );
        assert_eq!(state.domains[&ETH_NODE].subdomain_count, 0);

        let (state, _) = run(
            &state,
            vec![registry(RegistryEvent::Transfer {
                node: namehash("alice.eth"),
                owner: BOB,
            })],
        );
        assert!(!state.domains[&namehash("alice.eth")].is_pruned);
        assert_eq!(state.domains[&ETH_NODE].subdomain_count, 1);
    }

    #[test]
    fn test_new_resolver_zero_clears_without_row() {
        let resolver = Address::repeat_byte(0x77);
        let (state, _) = run(
            &Snapshot::new(),
            vec![
                registry(new_owner(ROOT_NODE, "eth", ALICE)),
                registry(RegistryEvent::NewResolver {
                    node: ETH_NODE,
                    resolver,
                }),
                registry(RegistryEvent::NewResolver {
                    node: ETH_NODE,
                    resolver: Address::ZERO,
                }),
            ],
        );
        let eth = &state.domains[&ETH_NODE];
        assert_eq!(eth.resolver, None);
        assert_eq!(eth.resolved_address, None);
        assert_eq!(state.resolvers.len(), 1);
        assert!(state
            .resolvers
            .contains_key(&ResolverId::new(resolver, ETH_NODE)));
    }

    #[test]
    fn test_new_resolver_reuses_known_addr() {
        let resolver = Address::repeat_byte(0x77);
        let id = ResolverId::new(resolver, ETH_NODE);
        let mut backend = Snapshot::new();
        let mut row = Resolver::new(id);
        row.addr = Some(BOB);
        backend.resolvers.insert(id, row);

        let (state, _) = run(
            &backend,
            vec![
                registry(new_owner(ROOT_NODE, "eth", ALICE)),
                registry(RegistryEvent::NewResolver {
                    node: ETH_NODE,
                    resolver,
                }),
            ],
        );
        assert_eq!(state.domains[&ETH_NODE].resolver, Some(id));
        assert_eq!(state.domains[&ETH_NODE].resolved_address, Some(BOB));
    }

    #[test]
    fn test_new_ttl() {
        let (state, outcomes) = run(
            &Snapshot::new(),
            vec![
                registry(new_owner(ROOT_NODE, "eth", ALICE)),
                registry(RegistryEvent::NewTtl {
                    node: ETH_NODE,
                    ttl: 3600,
                }),
                registry(RegistryEvent::NewTtl {
                    node: namehash("nope.eth"),
                    ttl: 1,
                }),
            ],
        );
        assert_eq!(state.domains[&ETH_NODE].ttl, Some(3600));
        assert_eq!(outcomes[2], Outcome::Recorded);
    }

    #[test]
    fn test_legacy_events_ignored_after_migration() {
        let (migrated, _) = run(
            &Snapshot::new(),
            vec![
                registry(new_owner(ROOT_NODE, "eth", ALICE)),
                registry(new_owner(ETH_NODE, "alice", BOB)),
            ],
        );

        let (after, outcomes) = run(
            &migrated,
            vec![
                legacy(new_owner(ETH_NODE, "alice", ALICE)),
                legacy(RegistryEvent::Transfer {
                    node: namehash("alice.eth"),
                    owner: ALICE,
                }),
                legacy(RegistryEvent::NewTtl {
                    node: namehash("alice.eth"),
                    ttl: 9,
                }),
                legacy(RegistryEvent::NewResolver {
                    node: namehash("alice.eth"),
                    resolver: ALICE,
                }),
            ],
        );
        assert!(outcomes
            .iter()
            .all(|o| *o == Outcome::Skipped(SkipReason::Migrated)));
        assert_eq!(after.domains, migrated.domains);
        assert!(after.resolvers.is_empty());
    }

    #[test]
    fn test_legacy_events_apply_before_migration() {
        let (state, outcomes) = run(
            &Snapshot::new(),
            vec![
                legacy(new_owner(ROOT_NODE, "eth", ALICE)),
                legacy(new_owner(ETH_NODE, "alice", BOB)),
                legacy(RegistryEvent::NewTtl {
                    node: namehash("alice.eth"),
                    ttl: 9,
                }),
                legacy(RegistryEvent::NewResolver {
                    node: ROOT_NODE,
                    resolver: ALICE,
                }),
            ],
        );
        assert!(outcomes.iter().all(|o| *o == Outcome::Applied));
        let alice = &state.domains[&namehash("alice.eth")];
        assert!(!alice.is_migrated);
        assert_eq!(alice.ttl, Some(9));
        assert_eq!(
            state.domains[&ROOT_NODE].resolver,
            Some(ResolverId::new(ALICE, ROOT_NODE))
        );

        // the current registry takes over
        let (state, _) = run(
            &state,
            vec![registry(new_owner(ETH_NODE, "alice", ALICE))],
        );
        assert!(state.domains[&namehash("alice.eth")].is_migrated);
        assert_eq!(state.domains[&ETH_NODE].subdomain_count, 1);
    }

    #[test]
    fn test_legacy_transfer_of_unknown_domain_is_dropped() {
        let backend = Snapshot::new();
        let mut projector = Projector::new();
        let mut ws = WorkingSet::new(&backend);
        let outcome = projector
            .apply(
                &mut ws,
                &at(
                    1,
                    0,
                    legacy(RegistryEvent::Transfer {
                        node: namehash("ghost.eth"),
                        owner: ALICE,
                    }),
                ),
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::UnknownDomain));
        assert_eq!(ws.event_count(), 0);
    }
}
