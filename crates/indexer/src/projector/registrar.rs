//! `.eth` registrar rules: registrations, renewals, transfers and controller
//! preimage reveals.

use alloy::primitives::{Address, B256, U256};
use ensgraph_core::{
    b256_to_token_id, check_valid_label, compute_subnode, eth_subnode, token_id_to_b256,
    token_label_id, ETH_NODE, GRACE_PERIOD_SECONDS,
};
use tracing::{debug, warn};

use super::{LabelCache, Outcome, SkipReason};
use crate::events::{LogMeta, RegistrarEvent};
use crate::model::{
    EventMeta, EventRecord, Registration, RegistrationEventKind, RegistrationEventRecord,
};
use crate::store::{Backend, WorkingSet};

pub(super) fn apply<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    labels: &mut LabelCache,
    meta: &LogMeta,
    event: &RegistrarEvent,
) -> Outcome {
    match event {
        RegistrarEvent::NameRegistered {
            token_id,
            owner,
            expires,
        } => name_registered(ws, labels, meta, *token_id, *owner, *expires),
        RegistrarEvent::NameRenewed { token_id, expires } => {
            name_renewed(ws, meta, *token_id, *expires)
        }
        RegistrarEvent::NameTransferred { token_id, to } => {
            name_transferred(ws, meta, *token_id, *to)
        }
        RegistrarEvent::NameRegisteredByController {
            name,
            label,
            base_cost,
            premium,
        } => set_preimage(
            ws,
            labels,
            name,
            *label,
            base_cost.saturating_add(*premium),
        ),
        RegistrarEvent::NameRegisteredByControllerOld { name, label, cost }
        | RegistrarEvent::NameRenewedByController { name, label, cost } => {
            set_preimage(ws, labels, name, *label, *cost)
        }
    }
}

fn with_grace(expires: U256) -> U256 {
    expires.saturating_add(U256::from(GRACE_PERIOD_SECONDS))
}

fn name_registered<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    labels: &LabelCache,
    meta: &LogMeta,
    token_id: U256,
    owner: Address,
    expires: U256,
) -> Outcome {
    let domain_id = eth_subnode(&token_id);
    let Some(mut domain) = ws.domain(&domain_id) else {
        debug!(
            event_id = %meta.event_id(),
            domain = %domain_id,
            "Registration for unknown domain"
        );
        return Outcome::Skipped(SkipReason::UnknownDomain);
    };
    ws.touch_account(owner);

    let mut registration = Registration {
        id: token_label_id(&token_id),
        domain: domain_id,
        registration_date: meta.timestamp,
        expiry_date: expires,
        cost: None,
        registrant: owner,
        label_name: None,
    };

    domain.registrant = Some(owner);
    domain.expiry_date = Some(with_grace(expires));

    if let Some(plaintext) = labels.get(&token_id_to_b256(&token_id)) {
        domain.label_name = Some(plaintext.to_string());
        domain.name = Some(format!("{plaintext}.eth"));
        registration.label_name = Some(plaintext.to_string());
    }

    let registration_id = registration.id.clone();
    ws.put_domain(domain);
    ws.put_registration(registration);

    push(
        ws,
        meta,
        Some(registration_id),
        RegistrationEventKind::NameRegistered {
            registrant: owner,
            expiry_date: expires,
        },
    );
    Outcome::Applied
}

fn name_renewed<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    token_id: U256,
    expires: U256,
) -> Outcome {
    let registration_id = token_label_id(&token_id);
    let registration = ws.registration(&registration_id);
    let domain = ws.domain(&eth_subnode(&token_id));
    let changed = registration.is_some() || domain.is_some();

    let reference = registration.map(|mut registration| {
        registration.expiry_date = expires;
        ws.put_registration(registration);
        registration_id
    });
    if let Some(mut domain) = domain {
        domain.expiry_date = Some(with_grace(expires));
        ws.put_domain(domain);
    }

    push(
        ws,
        meta,
        reference,
        RegistrationEventKind::NameRenewed {
            expiry_date: expires,
        },
    );
    if changed {
        Outcome::Applied
    } else {
        Outcome::Recorded
    }
}

fn name_transferred<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    token_id: U256,
    to: Address,
) -> Outcome {
    ws.touch_account(to);

    let registration_id = token_label_id(&token_id);
    let reference = match ws.registration(&registration_id) {
        Some(mut registration) => {
            registration.registrant = to;
            ws.put_registration(registration);

            if let Some(mut domain) = ws.domain(&eth_subnode(&token_id)) {
                domain.registrant = Some(to);
                ws.put_domain(domain);
            }
            Some(registration_id)
        }
        None => None,
    };

    let changed = reference.is_some();
    push(
        ws,
        meta,
        reference,
        RegistrationEventKind::NameTransferred { new_owner: to },
    );
    if changed {
        Outcome::Applied
    } else {
        Outcome::Recorded
    }
}

/// A controller revealed the plaintext of `label`.
fn set_preimage<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    labels: &mut LabelCache,
    name: &str,
    label: B256,
    cost: U256,
) -> Outcome {
    if !check_valid_label(name) {
        warn!(label = %label, "Invalid label {name:?}, skipping preimage");
        return Outcome::Skipped(SkipReason::InvalidLabel);
    }
    labels.insert(label, name);

    // the registry derives the node from the full 32-byte label hash
    if let Some(mut domain) = ws.domain(&compute_subnode(&ETH_NODE, label)) {
        if domain.label_name.as_deref() != Some(name) {
            domain.label_name = Some(name.to_string());
            domain.name = Some(format!("{name}.eth"));
            ws.put_domain(domain);
        }
    }

    let registration_id = token_label_id(&b256_to_token_id(&label));
    if let Some(mut registration) = ws.registration(&registration_id) {
        registration.label_name = Some(name.to_string());
        registration.cost = Some(cost);
        ws.put_registration(registration);
    }

    Outcome::Applied
}

fn push<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    registration: Option<String>,
    kind: RegistrationEventKind,
) {
    ws.push_event(EventRecord::Registration(RegistrationEventRecord {
        meta: EventMeta::from(meta),
        registration,
        kind,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EnsEvent;
    use crate::model::Domain;
    use crate::projector::test_support::at;
    use crate::projector::Projector;
    use crate::store::Snapshot;
    use ensgraph_core::{labelhash, namehash, ETH_NODE};

    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn token(label: &str) -> U256 {
        b256_to_token_id(&labelhash(label))
    }

    /// A snapshot where `alice.eth` exists in the registry.
    fn with_alice() -> Snapshot {
        let mut backend = Snapshot::new();
        let mut domain = Domain::new(namehash("alice.eth"), 1);
        domain.parent = Some(ETH_NODE);
        domain.labelhash = Some(labelhash("alice"));
        domain.owner = ALICE;
        backend.domains.insert(domain.id, domain);
        backend
    }

    fn run(backend: &Snapshot, events: Vec<RegistrarEvent>) -> (Snapshot, Vec<Outcome>) {
        let mut projector = Projector::new();
        let mut ws = WorkingSet::new(backend);
        let outcomes = events
            .into_iter()
            .enumerate()
            .map(|(i, e)| {
                projector
                    .apply(&mut ws, &at(200, i as u64, EnsEvent::Registrar(e)))
                    .unwrap()
            })
            .collect();
        let mut after = backend.clone();
        after.apply(&ws.into_changeset());
        (after, outcomes)
    }

    #[test]
    fn test_registration_adds_grace_period() {
        let expires = U256::from(1_700_000_000u64);
        let (state, outcomes) = run(
            &with_alice(),
            vec![RegistrarEvent::NameRegistered {
                token_id: token("alice"),
                owner: BOB,
                expires,
            }],
        );
        assert_eq!(outcomes, vec![Outcome::Applied]);

        let domain = &state.domains[&namehash("alice.eth")];
        assert_eq!(domain.registrant, Some(BOB));
        assert_eq!(
            domain.expiry_date,
            Some(expires + U256::from(7_776_000u64))
        );

        let registration = &state.registrations[&token_label_id(&token("alice"))];
        assert_eq!(registration.expiry_date, expires);
        assert_eq!(registration.registrant, BOB);
        assert_eq!(registration.domain, namehash("alice.eth"));
        assert_eq!(registration.cost, None);
    }

    #[test]
    fn test_renewal_resets_expiry() {
        let e1 = U256::from(1_700_000_000u64);
        let e2 = U256::from(1_800_000_000u64);
        let (state, _) = run(
            &with_alice(),
            vec![
                RegistrarEvent::NameRegistered {
                    token_id: token("alice"),
                    owner: BOB,
                    expires: e1,
                },
                RegistrarEvent::NameRenewed {
                    token_id: token("alice"),
                    expires: e2,
                },
            ],
        );
        let domain = &state.domains[&namehash("alice.eth")];
        assert_eq!(domain.expiry_date, Some(e2 + U256::from(GRACE_PERIOD_SECONDS)));
        let registration = &state.registrations[&token_label_id(&token("alice"))];
        assert_eq!(registration.expiry_date, e2);
    }

    #[test]
    fn test_registration_for_unknown_domain_is_dropped() {
        let backend = Snapshot::new();
        let mut projector = Projector::new();
        let mut ws = WorkingSet::new(&backend);
        let outcome = projector
            .apply(
                &mut ws,
                &at(
                    1,
                    0,
                    EnsEvent::Registrar(RegistrarEvent::NameRegistered {
                        token_id: token("nobody"),
                        owner: BOB,
                        expires: U256::from(1u64),
                    }),
                ),
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::UnknownDomain));
        assert!(ws.into_changeset().is_empty());
    }

    #[test]
    fn test_preimage_after_registration_sets_name_and_cost() {
        let (state, _) = run(
            &with_alice(),
            vec![
                RegistrarEvent::NameRegistered {
                    token_id: token("alice"),
                    owner: BOB,
                    expires: U256::from(10u64),
                },
                RegistrarEvent::NameRegisteredByController {
                    name: "alice".to_string(),
                    label: labelhash("alice"),
                    base_cost: U256::from(100u64),
                    premium: U256::from(5u64),
                },
            ],
        );
        let domain = &state.domains[&namehash("alice.eth")];
        assert_eq!(domain.name.as_deref(), Some("alice.eth"));
        assert_eq!(domain.label_name.as_deref(), Some("alice"));

        let registration = &state.registrations[&token_label_id(&token("alice"))];
        assert_eq!(registration.label_name.as_deref(), Some("alice"));
        assert_eq!(registration.cost, Some(U256::from(105u64)));
    }

    #[test]
    fn test_preimage_names_label_hash_with_leading_zero() {
        let label = labelhash("n11");
        assert_eq!(label[0], 0);

        let mut backend = Snapshot::new();
        let mut domain = Domain::new(namehash("n11.eth"), 1);
        domain.parent = Some(ETH_NODE);
        domain.labelhash = Some(label);
        domain.name = Some(format!("[{}].eth", hex::encode(label)));
        domain.owner = ALICE;
        backend.domains.insert(domain.id, domain);

        let (state, outcomes) = run(
            &backend,
            vec![RegistrarEvent::NameRegisteredByController {
                name: "n11".to_string(),
                label,
                base_cost: U256::from(1u64),
                premium: U256::ZERO,
            }],
        );
        assert_eq!(outcomes, vec![Outcome::Applied]);
        let domain = &state.domains[&namehash("n11.eth")];
        assert_eq!(domain.label_name.as_deref(), Some("n11"));
        assert_eq!(domain.name.as_deref(), Some("n11.eth"));
        assert_eq!(state.domains.len(), 1);
    }

    #[test]
    fn test_preimage_before_registration_backfills() {
        let mut projector = Projector::new();
        let backend = with_alice();
        let mut ws = WorkingSet::new(&backend);
        projector
            .apply(
                &mut ws,
                &at(
                    1,
                    0,
                    EnsEvent::Registrar(RegistrarEvent::NameRenewedByController {
                        name: "alice".to_string(),
                        label: labelhash("alice"),
                        cost: U256::from(7u64),
                    }),
                ),
            )
            .unwrap();
        let changes = ws.into_changeset();
        assert!(changes.registrations.is_empty());

        // next batch: the cache survives and back-fills the registration
        let mut next = backend.clone();
        next.apply(&changes);
        let mut ws = WorkingSet::new(&next);
        projector
            .apply(
                &mut ws,
                &at(
                    2,
                    0,
                    EnsEvent::Registrar(RegistrarEvent::NameRegistered {
                        token_id: token("alice"),
                        owner: BOB,
                        expires: U256::from(10u64),
                    }),
                ),
            )
            .unwrap();
        let registration = ws.registration(&token_label_id(&token("alice"))).unwrap();
        assert_eq!(registration.label_name.as_deref(), Some("alice"));
        assert_eq!(registration.cost, None);
    }

    #[test]
    fn test_invalid_preimage_is_rejected() {
        let (state, outcomes) = run(
            &with_alice(),
            vec![RegistrarEvent::NameRegisteredByControllerOld {
                name: "ali.ce".to_string(),
                label: labelhash("alice"),
                cost: U256::from(1u64),
            }],
        );
        assert_eq!(outcomes, vec![Outcome::Skipped(SkipReason::InvalidLabel)]);
        assert_eq!(state.domains[&namehash("alice.eth")].name, None);
    }

    #[test]
    fn test_transfer_updates_registrant() {
        let (state, outcomes) = run(
            &with_alice(),
            vec![
                RegistrarEvent::NameRegistered {
                    token_id: token("alice"),
                    owner: BOB,
                    expires: U256::from(10u64),
                },
                RegistrarEvent::NameTransferred {
                    token_id: token("alice"),
                    to: ALICE,
                },
                RegistrarEvent::NameTransferred {
                    token_id: token("unknown"),
                    to: ALICE,
                },
            ],
        );
        assert_eq!(outcomes[1], Outcome::Applied);
        assert_eq!(outcomes[2], Outcome::Recorded);
        assert_eq!(
            state.registrations[&token_label_id(&token("alice"))].registrant,
            ALICE
        );
        assert_eq!(
            state.domains[&namehash("alice.eth")].registrant,
            Some(ALICE)
        );
    }
}
