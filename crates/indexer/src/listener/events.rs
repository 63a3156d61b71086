//! ABI definitions and log decoding.
//!
//! Logs are routed by emitting contract and `topic0`. Anything emitted by an
//! address that is not one of the configured contracts is tried against the
//! resolver ABI, since resolvers are deployed by anyone.

use alloy::primitives::{Log as PrimitiveLog, B256};
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use anyhow::{Context, Result};

use crate::config::ContractsConfig;
use crate::events::{
    EnsEvent, Envelope, LogMeta, RegistrarEvent, RegistryEvent, RegistrySource, ResolverEvent,
    WrapperEvent,
};

sol! {
    /// Registry events. The current and legacy deployments share the ABI.
    #[derive(Debug, PartialEq, Eq)]
    interface EnsRegistry {
        event NewOwner(bytes32 indexed node, bytes32 indexed label, address owner);
        event Transfer(bytes32 indexed node, address owner);
        event NewResolver(bytes32 indexed node, address resolver);
        event NewTTL(bytes32 indexed node, uint64 ttl);
    }

    /// `.eth` base registrar (ERC-721).
    #[derive(Debug, PartialEq, Eq)]
    interface BaseRegistrar {
        event NameRegistered(uint256 indexed id, address indexed owner, uint256 expires);
        event NameRenewed(uint256 indexed id, uint256 expires);
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }

    /// Registrar controller with a single `cost` field.
    #[derive(Debug, PartialEq, Eq)]
    interface LegacyController {
        event NameRegistered(string name, bytes32 indexed label, address indexed owner, uint256 cost, uint256 expires);
        event NameRenewed(string name, bytes32 indexed label, uint256 cost, uint256 expires);
    }

    /// Registrar controller splitting the price into base cost and premium.
    #[derive(Debug, PartialEq, Eq)]
    interface Controller {
        event NameRegistered(string name, bytes32 indexed label, address indexed owner, uint256 baseCost, uint256 premium, uint256 expires);
        event NameRenewed(string name, bytes32 indexed label, uint256 cost, uint256 expires);
    }

    /// Public resolver records.
    #[derive(Debug, PartialEq, Eq)]
    interface PublicResolver {
        event AddrChanged(bytes32 indexed node, address a);
        event AddressChanged(bytes32 indexed node, uint256 coinType, bytes newAddress);
        event NameChanged(bytes32 indexed node, string name);
        event ABIChanged(bytes32 indexed node, uint256 indexed contentType);
        event PubkeyChanged(bytes32 indexed node, bytes32 x, bytes32 y);
        event TextChanged(bytes32 indexed node, string indexed indexedKey, string key);
        event ContenthashChanged(bytes32 indexed node, bytes hash);
        event InterfaceChanged(bytes32 indexed node, bytes4 indexed interfaceID, address implementer);
        event AuthorisationChanged(bytes32 indexed node, address indexed owner, address indexed target, bool isAuthorised);
        event VersionChanged(bytes32 indexed node, uint64 newVersion);
    }

    /// Newer resolvers also emit the text value.
    #[derive(Debug, PartialEq, Eq)]
    interface TextResolverWithValue {
        event TextChanged(bytes32 indexed node, string indexed indexedKey, string key, string value);
    }

    /// Name wrapper (ERC-1155).
    #[derive(Debug, PartialEq, Eq)]
    interface NameWrapper {
        event NameWrapped(bytes32 indexed node, bytes name, address owner, uint32 fuses, uint64 expiry);
        event NameUnwrapped(bytes32 indexed node, address owner);
        event FusesSet(bytes32 indexed node, uint32 fuses);
        event ExpiryExtended(bytes32 indexed node, uint64 expiry);
        event TransferSingle(address indexed operator, address indexed from, address indexed to, uint256 id, uint256 value);
        event TransferBatch(address indexed operator, address indexed from, address indexed to, uint256[] ids, uint256[] values);
    }
}

/// Every `topic0` a resolver may emit, for the topic-only resolver query.
pub fn resolver_topics() -> Vec<B256> {
    use PublicResolver::*;
    vec![
        AddrChanged::SIGNATURE_HASH,
        AddressChanged::SIGNATURE_HASH,
        NameChanged::SIGNATURE_HASH,
        ABIChanged::SIGNATURE_HASH,
        PubkeyChanged::SIGNATURE_HASH,
        TextChanged::SIGNATURE_HASH,
        TextResolverWithValue::TextChanged::SIGNATURE_HASH,
        ContenthashChanged::SIGNATURE_HASH,
        InterfaceChanged::SIGNATURE_HASH,
        AuthorisationChanged::SIGNATURE_HASH,
        VersionChanged::SIGNATURE_HASH,
    ]
}

/// Every `topic0` emitted by the configured contracts.
pub fn contract_topics() -> Vec<B256> {
    vec![
        EnsRegistry::NewOwner::SIGNATURE_HASH,
        EnsRegistry::Transfer::SIGNATURE_HASH,
        EnsRegistry::NewResolver::SIGNATURE_HASH,
        EnsRegistry::NewTTL::SIGNATURE_HASH,
        BaseRegistrar::NameRegistered::SIGNATURE_HASH,
        BaseRegistrar::NameRenewed::SIGNATURE_HASH,
        BaseRegistrar::Transfer::SIGNATURE_HASH,
        LegacyController::NameRegistered::SIGNATURE_HASH,
        LegacyController::NameRenewed::SIGNATURE_HASH,
        Controller::NameRegistered::SIGNATURE_HASH,
        NameWrapper::NameWrapped::SIGNATURE_HASH,
        NameWrapper::NameUnwrapped::SIGNATURE_HASH,
        NameWrapper::FusesSet::SIGNATURE_HASH,
        NameWrapper::ExpiryExtended::SIGNATURE_HASH,
        NameWrapper::TransferSingle::SIGNATURE_HASH,
        NameWrapper::TransferBatch::SIGNATURE_HASH,
    ]
}

/// Decode one log into an [`Envelope`].
///
/// Returns `Ok(None)` for topics this indexer does not follow. Logs missing
/// their chain coordinates, or whose payload does not match the ABI of the
/// topic, are errors.
pub fn decode_log(log: &Log, contracts: &ContractsConfig) -> Result<Option<Envelope>> {
    let Some(topic0) = log.topics().first().copied() else {
        return Ok(None);
    };
    let address = log.address();
    let inner = log.as_ref();

    let event = if address == contracts.registry {
        decode_registry(inner, topic0, RegistrySource::Current)?
    } else if address == contracts.legacy_registry {
        decode_registry(inner, topic0, RegistrySource::Legacy)?
    } else if address == contracts.base_registrar {
        decode_base_registrar(inner, topic0)?
    } else if address == contracts.legacy_controller {
        decode_legacy_controller(inner, topic0)?
    } else if address == contracts.controller {
        decode_controller(inner, topic0)?
    } else if address == contracts.name_wrapper {
        decode_wrapper(inner, topic0)?
    } else {
        decode_resolver(inner, topic0)?
    };

    let Some(event) = event else {
        return Ok(None);
    };

    Ok(Some(Envelope::new(log_meta(log)?, event)))
}

fn log_meta(log: &Log) -> Result<LogMeta> {
    Ok(LogMeta {
        block_number: log.block_number.context("Log missing block_number")?,
        log_index: log.log_index.context("Log missing log_index")?,
        transaction_hash: log
            .transaction_hash
            .context("Log missing transaction_hash")?,
        timestamp: log
            .block_timestamp
            .context("Log missing block_timestamp")?,
    })
}

fn decode<E: SolEvent>(log: &PrimitiveLog) -> Result<E> {
    let decoded = E::decode_log(log, true)
        .with_context(|| format!("Failed to decode {} event", E::SIGNATURE))?;
    Ok(decoded.data)
}

fn decode_registry(
    log: &PrimitiveLog,
    topic0: B256,
    source: RegistrySource,
) -> Result<Option<EnsEvent>> {
    use EnsRegistry::*;

    let event = match topic0 {
        t if t == NewOwner::SIGNATURE_HASH => {
            let e: NewOwner = decode(log)?;
            RegistryEvent::NewOwner {
                node: e.node,
                label: e.label,
                owner: e.owner,
            }
        }
        t if t == Transfer::SIGNATURE_HASH => {
            let e: Transfer = decode(log)?;
            RegistryEvent::Transfer {
                node: e.node,
                owner: e.owner,
            }
        }
        t if t == NewResolver::SIGNATURE_HASH => {
            let e: NewResolver = decode(log)?;
            RegistryEvent::NewResolver {
                node: e.node,
                resolver: e.resolver,
            }
        }
        t if t == NewTTL::SIGNATURE_HASH => {
            let e: NewTTL = decode(log)?;
            RegistryEvent::NewTtl {
                node: e.node,
                ttl: e.ttl,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(EnsEvent::Registry { source, event }))
}

fn decode_base_registrar(log: &PrimitiveLog, topic0: B256) -> Result<Option<EnsEvent>> {
    use BaseRegistrar::*;

    let event = match topic0 {
        t if t == NameRegistered::SIGNATURE_HASH => {
            let e: NameRegistered = decode(log)?;
            RegistrarEvent::NameRegistered {
                token_id: e.id,
                owner: e.owner,
                expires: e.expires,
            }
        }
        t if t == NameRenewed::SIGNATURE_HASH => {
            let e: NameRenewed = decode(log)?;
            RegistrarEvent::NameRenewed {
                token_id: e.id,
                expires: e.expires,
            }
        }
        t if t == Transfer::SIGNATURE_HASH => {
            let e: Transfer = decode(log)?;
            RegistrarEvent::NameTransferred {
                token_id: e.tokenId,
                to: e.to,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(EnsEvent::Registrar(event)))
}

fn decode_legacy_controller(log: &PrimitiveLog, topic0: B256) -> Result<Option<EnsEvent>> {
    use LegacyController::*;

    let event = match topic0 {
        t if t == NameRegistered::SIGNATURE_HASH => {
            let e: NameRegistered = decode(log)?;
            RegistrarEvent::NameRegisteredByControllerOld {
                name: e.name,
                label: e.label,
                cost: e.cost,
            }
        }
        t if t == NameRenewed::SIGNATURE_HASH => renewed(decode(log)?),
        _ => return Ok(None),
    };

    Ok(Some(EnsEvent::Registrar(event)))
}

fn decode_controller(log: &PrimitiveLog, topic0: B256) -> Result<Option<EnsEvent>> {
    use Controller::*;

    let event = match topic0 {
        t if t == NameRegistered::SIGNATURE_HASH => {
            let e: NameRegistered = decode(log)?;
            RegistrarEvent::NameRegisteredByController {
                name: e.name,
                label: e.label,
                base_cost: e.baseCost,
                premium: e.premium,
            }
        }
        // identical signature to the legacy controller's renewal
        t if t == NameRenewed::SIGNATURE_HASH => renewed(decode(log)?),
        _ => return Ok(None),
    };

    Ok(Some(EnsEvent::Registrar(event)))
}

fn renewed(e: LegacyController::NameRenewed) -> RegistrarEvent {
    RegistrarEvent::NameRenewedByController {
        name: e.name,
        label: e.label,
        cost: e.cost,
    }
}

fn decode_resolver(log: &PrimitiveLog, topic0: B256) -> Result<Option<EnsEvent>> {
    use PublicResolver::*;

    let (node, event) = match topic0 {
        t if t == AddrChanged::SIGNATURE_HASH => {
            let e: AddrChanged = decode(log)?;
            (e.node, ResolverEvent::AddrChanged { addr: e.a })
        }
        t if t == AddressChanged::SIGNATURE_HASH => {
            let e: AddressChanged = decode(log)?;
            (
                e.node,
                ResolverEvent::AddressChanged {
                    coin_type: e.coinType,
                    new_address: e.newAddress,
                },
            )
        }
        t if t == NameChanged::SIGNATURE_HASH => {
            let e: NameChanged = decode(log)?;
            (e.node, ResolverEvent::NameChanged { name: e.name })
        }
        t if t == ABIChanged::SIGNATURE_HASH => {
            let e: ABIChanged = decode(log)?;
            (
                e.node,
                ResolverEvent::AbiChanged {
                    content_type: e.contentType,
                },
            )
        }
        t if t == PubkeyChanged::SIGNATURE_HASH => {
            let e: PubkeyChanged = decode(log)?;
            (e.node, ResolverEvent::PubkeyChanged { x: e.x, y: e.y })
        }
        t if t == TextChanged::SIGNATURE_HASH => {
            let e: TextChanged = decode(log)?;
            (
                e.node,
                ResolverEvent::TextChanged {
                    key: e.key,
                    value: None,
                },
            )
        }
        t if t == TextResolverWithValue::TextChanged::SIGNATURE_HASH => {
            let e: TextResolverWithValue::TextChanged = decode(log)?;
            (
                e.node,
                ResolverEvent::TextChanged {
                    key: e.key,
                    value: Some(e.value),
                },
            )
        }
        t if t == ContenthashChanged::SIGNATURE_HASH => {
            let e: ContenthashChanged = decode(log)?;
            (e.node, ResolverEvent::ContenthashChanged { hash: e.hash })
        }
        t if t == InterfaceChanged::SIGNATURE_HASH => {
            let e: InterfaceChanged = decode(log)?;
            (
                e.node,
                ResolverEvent::InterfaceChanged {
                    interface_id: e.interfaceID,
                    implementer: e.implementer,
                },
            )
        }
        t if t == AuthorisationChanged::SIGNATURE_HASH => {
            let e: AuthorisationChanged = decode(log)?;
            (
                e.node,
                ResolverEvent::AuthorisationChanged {
                    owner: e.owner,
                    target: e.target,
                    is_authorised: e.isAuthorised,
                },
            )
        }
        t if t == VersionChanged::SIGNATURE_HASH => {
            let e: VersionChanged = decode(log)?;
            (
                e.node,
                ResolverEvent::VersionChanged {
                    new_version: e.newVersion,
                },
            )
        }
        _ => return Ok(None),
    };

    Ok(Some(EnsEvent::Resolver {
        resolver: log.address,
        node,
        event,
    }))
}

fn decode_wrapper(log: &PrimitiveLog, topic0: B256) -> Result<Option<EnsEvent>> {
    use NameWrapper::*;

    let event = match topic0 {
        t if t == NameWrapped::SIGNATURE_HASH => {
            let e: NameWrapped = decode(log)?;
            WrapperEvent::NameWrapped {
                node: e.node,
                name: e.name,
                owner: e.owner,
                fuses: e.fuses,
                expiry: e.expiry,
            }
        }
        t if t == NameUnwrapped::SIGNATURE_HASH => {
            let e: NameUnwrapped = decode(log)?;
            WrapperEvent::NameUnwrapped {
                node: e.node,
                owner: e.owner,
            }
        }
        t if t == FusesSet::SIGNATURE_HASH => {
            let e: FusesSet = decode(log)?;
            WrapperEvent::FusesSet {
                node: e.node,
                fuses: e.fuses,
            }
        }
        t if t == ExpiryExtended::SIGNATURE_HASH => {
            let e: ExpiryExtended = decode(log)?;
            WrapperEvent::ExpiryExtended {
                node: e.node,
                expiry: e.expiry,
            }
        }
        t if t == TransferSingle::SIGNATURE_HASH => {
            let e: TransferSingle = decode(log)?;
            WrapperEvent::TransferSingle { to: e.to, id: e.id }
        }
        t if t == TransferBatch::SIGNATURE_HASH => {
            let e: TransferBatch = decode(log)?;
            WrapperEvent::TransferBatch {
                to: e.to,
                ids: e.ids,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(EnsEvent::Wrapper(event)))
}
