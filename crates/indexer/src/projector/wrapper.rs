//! Name wrapper rules: wrap/unwrap, fuses, expiry extension and ERC-1155
//! ownership.

use alloy::primitives::{Address, Bytes, B256, U256};
use ensgraph_core::{
    decode_name, labelhash, parent_cannot_control, token_id_to_b256, EventId, ETH_NODE,
};

use super::{LabelCache, Outcome};
use crate::events::{LogMeta, WrapperEvent};
use crate::model::{
    Domain, DomainEventKind, DomainEventRecord, EventMeta, EventRecord, WrappedDomain,
};
use crate::store::{Backend, WorkingSet};

pub(super) fn apply<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    labels: &mut LabelCache,
    meta: &LogMeta,
    event: &WrapperEvent,
) -> Outcome {
    match event {
        WrapperEvent::NameWrapped {
            node,
            name,
            owner,
            fuses,
            expiry,
        } => name_wrapped(ws, labels, meta, *node, name, *owner, *fuses, *expiry),
        WrapperEvent::NameUnwrapped { node, owner } => name_unwrapped(ws, meta, *node, *owner),
        WrapperEvent::FusesSet { node, fuses } => fuses_set(ws, meta, *node, *fuses),
        WrapperEvent::ExpiryExtended { node, expiry } => {
            expiry_extended(ws, meta, *node, *expiry)
        }
        WrapperEvent::TransferSingle { to, id } => {
            transfer(ws, meta, meta.event_id(), *to, id);
            Outcome::Applied
        }
        WrapperEvent::TransferBatch { to, ids } => {
            let base = meta.event_id();
            for (i, id) in (0u32..).zip(ids) {
                transfer(ws, meta, base.with_sequence(i), *to, id);
            }
            Outcome::Applied
        }
    }
}

fn load_or_create<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    node: B256,
    timestamp: u64,
) -> Domain {
    ws.domain(&node)
        .unwrap_or_else(|| Domain::new(node, timestamp))
}

/// Raise the domain expiry to `expiry` if it is strictly later.
fn raise_expiry(domain: &mut Domain, expiry: u64) -> bool {
    let expiry = U256::from(expiry);
    if domain.expiry_date.map_or(true, |current| expiry > current) {
        domain.expiry_date = Some(expiry);
        return true;
    }
    false
}

#[allow(clippy::too_many_arguments)]
fn name_wrapped<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    labels: &mut LabelCache,
    meta: &LogMeta,
    node: B256,
    wire_name: &Bytes,
    owner: Address,
    fuses: u32,
    expiry: u64,
) -> Outcome {
    ws.touch_account(owner);

    let decoded = decode_name(wire_name);
    let mut domain = load_or_create(ws, node, meta.timestamp);

    if let Some(decoded) = decoded.as_ref().filter(|d| !d.first_label.is_empty()) {
        labels.insert(labelhash(&decoded.first_label), decoded.first_label.clone());
        if domain.label_name.is_none() {
            domain.label_name = Some(decoded.first_label.clone());
            domain.name = Some(decoded.name.clone());
        }
    }

    if parent_cannot_control(fuses) {
        raise_expiry(&mut domain, expiry);
    }
    domain.wrapped_owner = Some(owner);
    ws.put_domain(domain);

    let name = decoded.map(|d| d.name);
    ws.put_wrapped_domain(WrappedDomain {
        id: node,
        domain: node,
        owner,
        expiry_date: expiry,
        fuses,
        name: name.clone(),
    });

    push(
        ws,
        meta,
        meta.event_id(),
        node,
        DomainEventKind::NameWrapped {
            name,
            fuses,
            expiry_date: expiry,
            owner,
        },
    );
    Outcome::Applied
}

fn name_unwrapped<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    node: B256,
    owner: Address,
) -> Outcome {
    ws.touch_account(owner);

    let mut domain = load_or_create(ws, node, meta.timestamp);
    domain.wrapped_owner = None;
    // Wrapper-granted expiries only survive under .eth, where the registrar
    // keeps its own.
    if domain.expiry_date.is_some() && domain.parent.is_some_and(|p| p != ETH_NODE) {
        domain.expiry_date = None;
    }
    ws.put_domain(domain);
    ws.remove_wrapped_domain(&node);

    push(
        ws,
        meta,
        meta.event_id(),
        node,
        DomainEventKind::NameUnwrapped { owner },
    );
    Outcome::Applied
}

fn fuses_set<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    node: B256,
    fuses: u32,
) -> Outcome {
    let mut domain = load_or_create(ws, node, meta.timestamp);
    if let Some(mut wrapped) = ws.wrapped_domain(&node) {
        wrapped.fuses = fuses;
        if wrapped.expiry_date != 0 && parent_cannot_control(wrapped.fuses) {
            raise_expiry(&mut domain, wrapped.expiry_date);
        }
        ws.put_wrapped_domain(wrapped);
    }
    ws.put_domain(domain);

    push(
        ws,
        meta,
        meta.event_id(),
        node,
        DomainEventKind::FusesSet { fuses },
    );
    Outcome::Applied
}

fn expiry_extended<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    node: B256,
    expiry: u64,
) -> Outcome {
    let mut domain = load_or_create(ws, node, meta.timestamp);
    if let Some(mut wrapped) = ws.wrapped_domain(&node) {
        wrapped.expiry_date = expiry;
        if parent_cannot_control(wrapped.fuses) {
            raise_expiry(&mut domain, expiry);
        }
        ws.put_wrapped_domain(wrapped);
    }
    ws.put_domain(domain);

    push(
        ws,
        meta,
        meta.event_id(),
        node,
        DomainEventKind::ExpiryExtended {
            expiry_date: expiry,
        },
    );
    Outcome::Applied
}

/// Single-token transfer. Newly minted names transfer before `NameWrapped`
/// is emitted, so a placeholder is created for it to fill in.
fn transfer<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    record_id: EventId,
    to: Address,
    token_id: &U256,
) {
    ws.touch_account(to);

    let node = token_id_to_b256(token_id);
    let mut domain = load_or_create(ws, node, meta.timestamp);

    let wrapped = match ws.wrapped_domain(&node) {
        Some(mut wrapped) => {
            wrapped.owner = to;
            wrapped
        }
        None => WrappedDomain::placeholder(node, to),
    };
    ws.put_wrapped_domain(wrapped);

    domain.wrapped_owner = Some(to);
    ws.put_domain(domain);

    push(
        ws,
        meta,
        record_id,
        node,
        DomainEventKind::WrappedTransfer { owner: to },
    );
}

fn push<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    id: EventId,
    domain: B256,
    kind: DomainEventKind,
) {
    ws.push_event(EventRecord::Domain(DomainEventRecord {
        meta: EventMeta {
            id,
            ..EventMeta::from(meta)
        },
        domain: Some(domain),
        kind,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EnsEvent;
    use crate::projector::test_support::at;
    use crate::projector::Projector;
    use crate::store::{Changeset, Snapshot};
    use ensgraph_core::{b256_to_token_id, encode_name, namehash, PARENT_CANNOT_CONTROL};

    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn sub() -> B256 {
        namehash("pay.alice.eth")
    }

    fn wrap(node: B256, name: &str, fuses: u32, expiry: u64) -> WrapperEvent {
        WrapperEvent::NameWrapped {
            node,
            name: Bytes::from(encode_name(name).unwrap()),
            owner: ALICE,
            fuses,
            expiry,
        }
    }

    fn run(backend: &Snapshot, events: Vec<WrapperEvent>) -> (Snapshot, Changeset) {
        let mut projector = Projector::new();
        let mut ws = WorkingSet::new(backend);
        for (i, e) in events.into_iter().enumerate() {
            projector
                .apply(&mut ws, &at(400, i as u64, EnsEvent::Wrapper(e)))
                .unwrap();
        }
        let changes = ws.into_changeset();
        let mut after = backend.clone();
        after.apply(&changes);
        (after, changes)
    }

    /// `pay.alice.eth` under a non-.eth-root parent, with an expiry.
    fn with_sub(expiry: Option<u64>) -> Snapshot {
        let mut backend = Snapshot::new();
        let mut domain = Domain::new(sub(), 1);
        domain.parent = Some(namehash("alice.eth"));
        domain.owner = ALICE;
        domain.expiry_date = expiry.map(U256::from);
        backend.domains.insert(sub(), domain);
        backend
    }

    #[test]
    fn test_wrap_sets_names_and_owner() {
        let (state, changes) = run(&with_sub(None), vec![wrap(sub(), "pay.alice.eth", 0, 500)]);
        let domain = &state.domains[&sub()];
        assert_eq!(domain.label_name.as_deref(), Some("pay"));
        assert_eq!(domain.name.as_deref(), Some("pay.alice.eth"));
        assert_eq!(domain.wrapped_owner, Some(ALICE));
        // PCC not burned: expiry untouched
        assert_eq!(domain.expiry_date, None);

        let wrapped = &state.wrapped_domains[&sub()];
        assert_eq!(wrapped.expiry_date, 500);
        assert_eq!(wrapped.name.as_deref(), Some("pay.alice.eth"));
        assert_eq!(changes.events.len(), 1);
    }

    #[test]
    fn test_wrap_with_pcc_raises_expiry() {
        let (state, _) = run(
            &with_sub(Some(1_000)),
            vec![wrap(sub(), "pay.alice.eth", PARENT_CANNOT_CONTROL, 2_000)],
        );
        assert_eq!(state.domains[&sub()].expiry_date, Some(U256::from(2_000u64)));
    }

    #[test]
    fn test_undecodable_name_keeps_labels() {
        let event = WrapperEvent::NameWrapped {
            node: sub(),
            name: Bytes::from_static(b"\x03a.b\x00"),
            owner: ALICE,
            fuses: 0,
            expiry: 1,
        };
        let (state, _) = run(&with_sub(None), vec![event]);
        assert_eq!(state.domains[&sub()].label_name, None);
        assert_eq!(state.wrapped_domains[&sub()].name, None);
    }

    #[test]
    fn test_expiry_extension_is_monotonic() {
        let (wrapped, _) = run(
            &with_sub(Some(1_000)),
            vec![wrap(sub(), "pay.alice.eth", PARENT_CANNOT_CONTROL, 1_000)],
        );
        assert_eq!(wrapped.domains[&sub()].expiry_date, Some(U256::from(1_000u64)));

        let extend = |expiry| WrapperEvent::ExpiryExtended {
            node: sub(),
            expiry,
        };

        let (lower, _) = run(&wrapped, vec![extend(900)]);
        assert_eq!(lower.domains[&sub()].expiry_date, Some(U256::from(1_000u64)));
        assert_eq!(lower.wrapped_domains[&sub()].expiry_date, 900);

        let (equal, _) = run(&wrapped, vec![extend(1_000)]);
        assert_eq!(equal.domains[&sub()].expiry_date, Some(U256::from(1_000u64)));

        let (higher, _) = run(&wrapped, vec![extend(3_000)]);
        assert_eq!(higher.domains[&sub()].expiry_date, Some(U256::from(3_000u64)));
    }

    #[test]
    fn test_expiry_extension_without_pcc_leaves_domain() {
        let (wrapped, _) = run(&with_sub(Some(1_000)), vec![wrap(sub(), "pay.alice.eth", 0, 1_000)]);
        let (state, _) = run(
            &wrapped,
            vec![WrapperEvent::ExpiryExtended {
                node: sub(),
                expiry: 5_000,
            }],
        );
        assert_eq!(state.domains[&sub()].expiry_date, Some(U256::from(1_000u64)));
        assert_eq!(state.wrapped_domains[&sub()].expiry_date, 5_000);
    }

    #[test]
    fn test_fuses_set_propagates_existing_expiry() {
        let (wrapped, _) = run(&with_sub(Some(1_000)), vec![wrap(sub(), "pay.alice.eth", 0, 4_000)]);
        assert_eq!(wrapped.domains[&sub()].expiry_date, Some(U256::from(1_000u64)));

        let (state, changes) = run(
            &wrapped,
            vec![WrapperEvent::FusesSet {
                node: sub(),
                fuses: PARENT_CANNOT_CONTROL,
            }],
        );
        assert_eq!(state.domains[&sub()].expiry_date, Some(U256::from(4_000u64)));
        assert_eq!(state.wrapped_domains[&sub()].fuses, PARENT_CANNOT_CONTROL);
        assert_eq!(changes.events.len(), 1);
    }

    #[test]
    fn test_fuses_set_without_wrapped_domain_still_records() {
        let (state, changes) = run(
            &with_sub(None),
            vec![WrapperEvent::FusesSet {
                node: sub(),
                fuses: PARENT_CANNOT_CONTROL,
            }],
        );
        assert!(state.wrapped_domains.is_empty());
        match &changes.events[0] {
            EventRecord::Domain(record) => assert_eq!(record.domain, Some(sub())),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_unwrap_clears_expiry_outside_eth() {
        let (wrapped, _) = run(
            &with_sub(None),
            vec![wrap(sub(), "pay.alice.eth", PARENT_CANNOT_CONTROL, 2_000)],
        );
        let (state, changes) = run(
            &wrapped,
            vec![WrapperEvent::NameUnwrapped {
                node: sub(),
                owner: BOB,
            }],
        );
        let domain = &state.domains[&sub()];
        assert_eq!(domain.wrapped_owner, None);
        assert_eq!(domain.expiry_date, None);
        assert!(state.wrapped_domains.is_empty());
        assert_eq!(changes.removed_wrapped_domains, vec![sub()]);
    }

    #[test]
    fn test_unwrap_keeps_expiry_under_eth() {
        let node = namehash("alice.eth");
        let mut backend = Snapshot::new();
        let mut domain = Domain::new(node, 1);
        domain.parent = Some(ETH_NODE);
        domain.expiry_date = Some(U256::from(9_000u64));
        backend.domains.insert(node, domain);

        let (state, _) = run(
            &backend,
            vec![
                wrap(node, "alice.eth", PARENT_CANNOT_CONTROL, 5_000),
                WrapperEvent::NameUnwrapped { node, owner: BOB },
            ],
        );
        assert_eq!(state.domains[&node].expiry_date, Some(U256::from(9_000u64)));
    }

    #[test]
    fn test_transfer_before_wrap_creates_placeholder() {
        let token = b256_to_token_id(&sub());
        let (state, _) = run(
            &with_sub(None),
            vec![
                WrapperEvent::TransferSingle { to: BOB, id: token },
                wrap(sub(), "pay.alice.eth", 0, 700),
            ],
        );
        let wrapped = &state.wrapped_domains[&sub()];
        assert_eq!(wrapped.owner, ALICE);
        assert_eq!(wrapped.expiry_date, 700);

        let (placeholder, _) = run(
            &with_sub(None),
            vec![WrapperEvent::TransferSingle { to: BOB, id: token }],
        );
        let wrapped = &placeholder.wrapped_domains[&sub()];
        assert_eq!(wrapped.owner, BOB);
        assert_eq!(wrapped.expiry_date, 0);
        assert_eq!(wrapped.fuses, 0);
        assert_eq!(placeholder.domains[&sub()].wrapped_owner, Some(BOB));
    }

    #[test]
    fn test_batch_transfer_applies_each_id() {
        let a = namehash("a.eth");
        let b = namehash("b.eth");
        let (state, changes) = run(
            &Snapshot::new(),
            vec![WrapperEvent::TransferBatch {
                to: BOB,
                ids: vec![b256_to_token_id(&a), b256_to_token_id(&b)],
            }],
        );
        assert_eq!(state.wrapped_domains[&a].owner, BOB);
        assert_eq!(state.wrapped_domains[&b].owner, BOB);
        assert_eq!(state.domains[&a].wrapped_owner, Some(BOB));

        let ids: Vec<String> = changes.events.iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec!["400-0-0", "400-0-1"]);
    }
}
