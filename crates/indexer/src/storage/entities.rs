//! Entity and event record reads.
//!
//! Column encodings shared with the changeset writer live here: hashes and
//! addresses are BLOBs, `uint256` values and `u64` values that can exceed
//! `i64::MAX` are decimal TEXT, resolver ids use their string form.

use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use ensgraph_core::{EventId, ResolverId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Storage;
use crate::model::{
    Domain, DomainEventRecord, EventMeta, Registration, RegistrationEventRecord, Resolver,
    ResolverEventRecord, WrappedDomain,
};

impl Storage {
    /// Load a domain by namehash.
    pub async fn get_domain(&self, id: &B256) -> Result<Option<Domain>> {
        let row = sqlx::query("SELECT * FROM domains WHERE id = ?")
            .bind(id.as_slice())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch domain {}", id))?;

        row.map(row_to_domain).transpose()
    }

    /// Load a resolver by composite id.
    pub async fn get_resolver(&self, id: &ResolverId) -> Result<Option<Resolver>> {
        let row = sqlx::query("SELECT * FROM resolvers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch resolver {}", id))?;

        row.map(row_to_resolver).transpose()
    }

    /// Load a registration by label id.
    pub async fn get_registration(&self, id: &str) -> Result<Option<Registration>> {
        let row = sqlx::query("SELECT * FROM registrations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch registration {}", id))?;

        row.map(row_to_registration).transpose()
    }

    /// Load wrapper state by namehash.
    pub async fn get_wrapped_domain(&self, id: &B256) -> Result<Option<WrappedDomain>> {
        let row = sqlx::query("SELECT * FROM wrapped_domains WHERE id = ?")
            .bind(id.as_slice())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch wrapped domain {}", id))?;

        row.map(row_to_wrapped_domain).transpose()
    }

    /// Direct children of a domain, counted or not.
    pub async fn get_subdomains(&self, parent: &B256) -> Result<Vec<Domain>> {
        let rows = sqlx::query("SELECT * FROM domains WHERE parent = ? ORDER BY id")
            .bind(parent.as_slice())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch subdomains of {}", parent))?;

        rows.into_iter().map(row_to_domain).collect()
    }

    /// Whether an account has ever been referenced.
    pub async fn has_account(&self, address: &Address) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM accounts WHERE id = ?")
            .bind(address.as_slice())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account")?;

        Ok(found.is_some())
    }

    /// Domain event records for a domain, in chain order.
    pub async fn get_domain_events(&self, domain: &B256) -> Result<Vec<DomainEventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM domain_events
            WHERE domain = ?
            ORDER BY block_number, log_index, sequence
            "#,
        )
        .bind(domain.as_slice())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch domain events")?;

        rows.into_iter()
            .map(|row| {
                let domain: Option<Vec<u8>> = row.try_get("domain")?;
                Ok(DomainEventRecord {
                    meta: row_to_event_meta(&row)?,
                    domain: domain.as_deref().map(b256_column).transpose()?,
                    kind: row_to_kind(&row)?,
                })
            })
            .collect()
    }

    /// Resolver event records for a resolver, in chain order.
    pub async fn get_resolver_events(
        &self,
        resolver: &ResolverId,
    ) -> Result<Vec<ResolverEventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM resolver_events
            WHERE resolver = ?
            ORDER BY block_number, log_index, sequence
            "#,
        )
        .bind(resolver.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch resolver events")?;

        rows.into_iter()
            .map(|row| {
                Ok(ResolverEventRecord {
                    meta: row_to_event_meta(&row)?,
                    resolver: *resolver,
                    kind: row_to_kind(&row)?,
                })
            })
            .collect()
    }

    /// Registration event records for a label id, in chain order.
    pub async fn get_registration_events(
        &self,
        registration: &str,
    ) -> Result<Vec<RegistrationEventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM registration_events
            WHERE registration = ?
            ORDER BY block_number, log_index, sequence
            "#,
        )
        .bind(registration)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch registration events")?;

        rows.into_iter()
            .map(|row| {
                Ok(RegistrationEventRecord {
                    meta: row_to_event_meta(&row)?,
                    registration: row.try_get("registration")?,
                    kind: row_to_kind(&row)?,
                })
            })
            .collect()
    }
}

pub(super) fn b256_column(bytes: &[u8]) -> Result<B256> {
    if bytes.len() != 32 {
        anyhow::bail!("Expected 32-byte hash column, got {} bytes", bytes.len());
    }
    Ok(B256::from_slice(bytes))
}

pub(super) fn address_column(bytes: &[u8]) -> Result<Address> {
    if bytes.len() != 20 {
        anyhow::bail!("Expected 20-byte address column, got {} bytes", bytes.len());
    }
    Ok(Address::from_slice(bytes))
}

pub(super) fn u256_column(text: &str) -> Result<U256> {
    U256::from_str(text).with_context(|| format!("Invalid uint256 column: {}", text))
}

pub(super) fn u64_column(text: &str) -> Result<u64> {
    text.parse()
        .with_context(|| format!("Invalid u64 column: {}", text))
}

fn opt_address(row: &SqliteRow, column: &str) -> Result<Option<Address>> {
    let bytes: Option<Vec<u8>> = row.try_get(column)?;
    bytes.as_deref().map(address_column).transpose()
}

fn opt_b256(row: &SqliteRow, column: &str) -> Result<Option<B256>> {
    let bytes: Option<Vec<u8>> = row.try_get(column)?;
    bytes.as_deref().map(b256_column).transpose()
}

fn row_to_domain(row: SqliteRow) -> Result<Domain> {
    let id: Vec<u8> = row.try_get("id")?;
    let owner: Vec<u8> = row.try_get("owner")?;
    let resolver: Option<String> = row.try_get("resolver")?;
    let ttl: Option<String> = row.try_get("ttl")?;
    let expiry_date: Option<String> = row.try_get("expiry_date")?;

    Ok(Domain {
        id: b256_column(&id)?,
        name: row.try_get("name")?,
        label_name: row.try_get("label_name")?,
        labelhash: opt_b256(&row, "labelhash")?,
        parent: opt_b256(&row, "parent")?,
        subdomain_count: row.try_get::<i64, _>("subdomain_count")? as u32,
        resolved_address: opt_address(&row, "resolved_address")?,
        owner: address_column(&owner)?,
        resolver: resolver
            .as_deref()
            .map(ResolverId::from_str)
            .transpose()?,
        ttl: ttl.as_deref().map(u64_column).transpose()?,
        is_migrated: row.try_get("is_migrated")?,
        created_at: row.try_get::<i64, _>("created_at")? as u64,
        registrant: opt_address(&row, "registrant")?,
        wrapped_owner: opt_address(&row, "wrapped_owner")?,
        expiry_date: expiry_date.as_deref().map(u256_column).transpose()?,
        is_pruned: row.try_get("is_pruned")?,
    })
}

fn row_to_resolver(row: SqliteRow) -> Result<Resolver> {
    let id: String = row.try_get("id")?;
    let domain: Vec<u8> = row.try_get("domain")?;
    let address: Vec<u8> = row.try_get("address")?;
    let content_hash: Option<Vec<u8>> = row.try_get("content_hash")?;
    let texts: String = row.try_get("texts")?;
    let coin_types: String = row.try_get("coin_types")?;

    let coin_types: Vec<String> =
        serde_json::from_str(&coin_types).context("Invalid coin_types column")?;

    Ok(Resolver {
        id: ResolverId::from_str(&id)?,
        domain: b256_column(&domain)?,
        address: address_column(&address)?,
        addr: opt_address(&row, "addr")?,
        content_hash: content_hash.map(Into::into),
        texts: serde_json::from_str(&texts).context("Invalid texts column")?,
        coin_types: coin_types
            .iter()
            .map(|c| u256_column(c))
            .collect::<Result<_>>()?,
    })
}

fn row_to_registration(row: SqliteRow) -> Result<Registration> {
    let domain: Vec<u8> = row.try_get("domain")?;
    let registrant: Vec<u8> = row.try_get("registrant")?;
    let expiry_date: String = row.try_get("expiry_date")?;
    let cost: Option<String> = row.try_get("cost")?;

    Ok(Registration {
        id: row.try_get("id")?,
        domain: b256_column(&domain)?,
        registration_date: row.try_get::<i64, _>("registration_date")? as u64,
        expiry_date: u256_column(&expiry_date)?,
        cost: cost.as_deref().map(u256_column).transpose()?,
        registrant: address_column(&registrant)?,
        label_name: row.try_get("label_name")?,
    })
}

fn row_to_wrapped_domain(row: SqliteRow) -> Result<WrappedDomain> {
    let id: Vec<u8> = row.try_get("id")?;
    let domain: Vec<u8> = row.try_get("domain")?;
    let owner: Vec<u8> = row.try_get("owner")?;
    let expiry_date: String = row.try_get("expiry_date")?;

    Ok(WrappedDomain {
        id: b256_column(&id)?,
        domain: b256_column(&domain)?,
        owner: address_column(&owner)?,
        expiry_date: u64_column(&expiry_date)?,
        fuses: row.try_get::<i64, _>("fuses")? as u32,
        name: row.try_get("name")?,
    })
}

fn row_to_event_meta(row: &SqliteRow) -> Result<EventMeta> {
    let block_number = row.try_get::<i64, _>("block_number")? as u64;
    let log_index = row.try_get::<i64, _>("log_index")? as u64;
    let sequence: Option<i64> = row.try_get("sequence")?;
    let transaction_id: Vec<u8> = row.try_get("transaction_id")?;

    let mut id = EventId::new(block_number, log_index);
    if let Some(sequence) = sequence {
        id = id.with_sequence(sequence as u32);
    }

    Ok(EventMeta {
        id,
        block_number,
        transaction_id: b256_column(&transaction_id)?,
    })
}

fn row_to_kind<K: serde::de::DeserializeOwned>(row: &SqliteRow) -> Result<K> {
    let data: String = row.try_get("data")?;
    serde_json::from_str(&data).context("Invalid event payload")
}
