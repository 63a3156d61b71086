//! Resolver rules: per-resolver record state and the domain's cached
//! resolved address.

use alloy::primitives::{Address, B256};
use ensgraph_core::ResolverId;
use tracing::warn;

use super::{Outcome, SkipReason};
use crate::events::{LogMeta, ResolverEvent};
use crate::model::{EventMeta, EventRecord, Resolver, ResolverEventKind, ResolverEventRecord};
use crate::store::{Backend, WorkingSet};

pub(super) fn apply<B: Backend + ?Sized>(
    ws: &mut WorkingSet<'_, B>,
    meta: &LogMeta,
    address: Address,
    node: B256,
    event: &ResolverEvent,
) -> Outcome {
    let id = ResolverId::new(address, node);
    let mut resolver = ws.resolver(&id).unwrap_or_else(|| Resolver::new(id));

    let kind = match event {
        ResolverEvent::AddrChanged { addr } => {
            ws.touch_account(*addr);
            if let Some(mut domain) = ws.domain(&node) {
                if domain.resolver == Some(id) {
                    domain.resolved_address = Some(*addr);
                    ws.put_domain(domain);
                }
            }
            resolver.addr = Some(*addr);
            ResolverEventKind::AddrChanged { addr: *addr }
        }
        ResolverEvent::AddressChanged {
            coin_type,
            new_address,
        } => {
            resolver.add_coin_type(*coin_type);
            ResolverEventKind::MulticoinAddrChanged {
                coin_type: *coin_type,
                addr: new_address.clone(),
            }
        }
        ResolverEvent::NameChanged { name } => {
            if name.contains('\0') {
                warn!(resolver = %id, "Name record contains a null byte, skipping");
                return Outcome::Skipped(SkipReason::InvalidName);
            }
            ResolverEventKind::NameChanged { name: name.clone() }
        }
        ResolverEvent::AbiChanged { content_type } => ResolverEventKind::AbiChanged {
            content_type: *content_type,
        },
        ResolverEvent::PubkeyChanged { x, y } => ResolverEventKind::PubkeyChanged { x: *x, y: *y },
        ResolverEvent::TextChanged { key, value } => {
            resolver.add_text(key);
            ResolverEventKind::TextChanged {
                key: key.clone(),
                value: value.clone(),
            }
        }
        ResolverEvent::ContenthashChanged { hash } => {
            resolver.content_hash = Some(hash.clone());
            ResolverEventKind::ContenthashChanged { hash: hash.clone() }
        }
        ResolverEvent::InterfaceChanged {
            interface_id,
            implementer,
        } => ResolverEventKind::InterfaceChanged {
            interface_id: *interface_id,
            implementer: *implementer,
        },
        ResolverEvent::AuthorisationChanged {
            owner,
            target,
            is_authorised,
        } => ResolverEventKind::AuthorisationChanged {
            owner: *owner,
            target: *target,
            is_authorised: *is_authorised,
        },
        ResolverEvent::VersionChanged { new_version } => {
            if let Some(mut domain) = ws.domain(&node) {
                if domain.resolver == Some(id) {
                    domain.resolved_address = None;
                    ws.put_domain(domain);
                }
            }
            resolver.clear_records();
            ResolverEventKind::VersionChanged {
                version: *new_version,
            }
        }
    };

    ws.put_resolver(resolver);
    ws.push_event(EventRecord::Resolver(ResolverEventRecord {
        meta: EventMeta::from(meta),
        resolver: id,
        kind,
    }));
    Outcome::Applied
}
