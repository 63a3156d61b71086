//! Atomic batch flush.

use alloy::primitives::B256;
use anyhow::{Context, Result};
use sqlx::SqliteConnection;
use tracing::info;

use super::Storage;
use crate::model::{Domain, EventMeta, EventRecord, Registration, Resolver, WrappedDomain};
use crate::store::Changeset;

impl Storage {
    /// Write a projected batch and advance the sync cursor to `last_block`.
    ///
    /// Entities are upserted, removed wrapper state is deleted and event
    /// records are inserted write-once. Everything happens in one transaction,
    /// so a batch either lands completely or not at all.
    pub async fn apply_changeset(&self, changes: &Changeset, last_block: u64) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        for account in &changes.accounts {
            sqlx::query("INSERT INTO accounts (id) VALUES (?) ON CONFLICT(id) DO NOTHING")
                .bind(account.as_slice())
                .execute(&mut *tx)
                .await
                .context("Failed to upsert account")?;
        }

        for domain in &changes.domains {
            upsert_domain(&mut tx, domain).await?;
        }
        for resolver in &changes.resolvers {
            upsert_resolver(&mut tx, resolver).await?;
        }
        for registration in &changes.registrations {
            upsert_registration(&mut tx, registration).await?;
        }
        for wrapped in &changes.wrapped_domains {
            upsert_wrapped_domain(&mut tx, wrapped).await?;
        }
        for id in &changes.removed_wrapped_domains {
            sqlx::query("DELETE FROM wrapped_domains WHERE id = ?")
                .bind(id.as_slice())
                .execute(&mut *tx)
                .await
                .context("Failed to delete wrapped domain")?;
        }

        let mut inserted = 0u64;
        for record in &changes.events {
            inserted += insert_event(&mut tx, record).await?;
        }

        sqlx::query("UPDATE sync_state SET last_block_number = ?, updated_at = ? WHERE id = 1")
            .bind(last_block as i64)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .context("Failed to advance sync state")?;

        tx.commit().await.context("Failed to commit changeset")?;

        info!(
            last_block,
            domains = changes.domains.len(),
            resolvers = changes.resolvers.len(),
            registrations = changes.registrations.len(),
            wrapped = changes.wrapped_domains.len(),
            unwrapped = changes.removed_wrapped_domains.len(),
            events = inserted,
            "Changeset committed"
        );

        Ok(())
    }
}

fn hash(value: &B256) -> Vec<u8> {
    value.as_slice().to_vec()
}

async fn upsert_domain(conn: &mut SqliteConnection, domain: &Domain) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO domains (
            id, name, label_name, labelhash, parent, subdomain_count,
            resolved_address, owner, resolver, ttl, is_migrated, created_at,
            registrant, wrapped_owner, expiry_date, is_pruned
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            label_name = excluded.label_name,
            labelhash = excluded.labelhash,
            parent = excluded.parent,
            subdomain_count = excluded.subdomain_count,
            resolved_address = excluded.resolved_address,
            owner = excluded.owner,
            resolver = excluded.resolver,
            ttl = excluded.ttl,
            is_migrated = excluded.is_migrated,
            registrant = excluded.registrant,
            wrapped_owner = excluded.wrapped_owner,
            expiry_date = excluded.expiry_date,
            is_pruned = excluded.is_pruned
        "#,
    )
    .bind(hash(&domain.id))
    .bind(&domain.name)
    .bind(&domain.label_name)
    .bind(domain.labelhash.as_ref().map(hash))
    .bind(domain.parent.as_ref().map(hash))
    .bind(domain.subdomain_count as i64)
    .bind(domain.resolved_address.map(|a| a.to_vec()))
    .bind(domain.owner.as_slice())
    .bind(domain.resolver.map(|r| r.to_string()))
    .bind(domain.ttl.map(|t| t.to_string()))
    .bind(domain.is_migrated)
    .bind(domain.created_at as i64)
    .bind(domain.registrant.map(|a| a.to_vec()))
    .bind(domain.wrapped_owner.map(|a| a.to_vec()))
    .bind(domain.expiry_date.map(|e| e.to_string()))
    .bind(domain.is_pruned)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to upsert domain {}", domain.id))?;

    Ok(())
}

async fn upsert_resolver(conn: &mut SqliteConnection, resolver: &Resolver) -> Result<()> {
    let texts = serde_json::to_string(&resolver.texts)?;
    let coin_types: Vec<String> = resolver.coin_types.iter().map(|c| c.to_string()).collect();
    let coin_types = serde_json::to_string(&coin_types)?;

    sqlx::query(
        r#"
        INSERT INTO resolvers (id, domain, address, addr, content_hash, texts, coin_types)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            addr = excluded.addr,
            content_hash = excluded.content_hash,
            texts = excluded.texts,
            coin_types = excluded.coin_types
        "#,
    )
    .bind(resolver.id.to_string())
    .bind(hash(&resolver.domain))
    .bind(resolver.address.as_slice())
    .bind(resolver.addr.map(|a| a.to_vec()))
    .bind(resolver.content_hash.as_ref().map(|h| h.to_vec()))
    .bind(texts)
    .bind(coin_types)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to upsert resolver {}", resolver.id))?;

    Ok(())
}

async fn upsert_registration(
    conn: &mut SqliteConnection,
    registration: &Registration,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO registrations (
            id, domain, registration_date, expiry_date, cost, registrant, label_name
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            registration_date = excluded.registration_date,
            expiry_date = excluded.expiry_date,
            cost = excluded.cost,
            registrant = excluded.registrant,
            label_name = excluded.label_name
        "#,
    )
    .bind(&registration.id)
    .bind(hash(&registration.domain))
    .bind(registration.registration_date as i64)
    .bind(registration.expiry_date.to_string())
    .bind(registration.cost.map(|c| c.to_string()))
    .bind(registration.registrant.as_slice())
    .bind(&registration.label_name)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to upsert registration {}", registration.id))?;

    Ok(())
}

async fn upsert_wrapped_domain(conn: &mut SqliteConnection, wrapped: &WrappedDomain) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO wrapped_domains (id, domain, owner, expiry_date, fuses, name)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            owner = excluded.owner,
            expiry_date = excluded.expiry_date,
            fuses = excluded.fuses,
            name = excluded.name
        "#,
    )
    .bind(hash(&wrapped.id))
    .bind(hash(&wrapped.domain))
    .bind(wrapped.owner.as_slice())
    .bind(wrapped.expiry_date.to_string())
    .bind(wrapped.fuses as i64)
    .bind(&wrapped.name)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to upsert wrapped domain {}", wrapped.id))?;

    Ok(())
}

/// Insert one record unless its id already exists. Returns rows written.
async fn insert_event(conn: &mut SqliteConnection, record: &EventRecord) -> Result<u64> {
    let (table, reference_column, reference, meta, data) = match record {
        EventRecord::Domain(r) => (
            "domain_events",
            "domain",
            Reference::Bytes(r.domain.as_ref().map(hash)),
            &r.meta,
            serde_json::to_string(&r.kind)?,
        ),
        EventRecord::Resolver(r) => (
            "resolver_events",
            "resolver",
            Reference::Text(Some(r.resolver.to_string())),
            &r.meta,
            serde_json::to_string(&r.kind)?,
        ),
        EventRecord::Registration(r) => (
            "registration_events",
            "registration",
            Reference::Text(r.registration.clone()),
            &r.meta,
            serde_json::to_string(&r.kind)?,
        ),
    };

    let sql = format!(
        "INSERT INTO {table} (id, block_number, log_index, sequence, transaction_id, {reference_column}, kind, data) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) ON CONFLICT(id) DO NOTHING"
    );

    let query = bind_meta(sqlx::query(&sql), meta);
    let query = match reference {
        Reference::Bytes(bytes) => query.bind(bytes),
        Reference::Text(text) => query.bind(text),
    };

    let result = query
        .bind(record.kind_name())
        .bind(data)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to insert event {}", meta.id))?;

    Ok(result.rows_affected())
}

/// The umbrella-specific entity reference column.
enum Reference {
    Bytes(Option<Vec<u8>>),
    Text(Option<String>),
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_meta<'q>(query: SqliteQuery<'q>, meta: &EventMeta) -> SqliteQuery<'q> {
    query
        .bind(meta.id.to_string())
        .bind(meta.id.block_number as i64)
        .bind(meta.id.log_index as i64)
        .bind(meta.id.sequence.map(i64::from))
        .bind(hash(&meta.transaction_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EnsEvent, RegistrarEvent, RegistryEvent, RegistrySource, WrapperEvent};
    use crate::projector::test_support::at;
    use crate::projector::Projector;
    use crate::store::Snapshot;
    use alloy::primitives::{Address, Bytes, U256};
    use ensgraph_core::{
        b256_to_token_id, encode_name, labelhash, namehash, token_label_id, ETH_NODE, ROOT_NODE,
    };
    use tempfile::NamedTempFile;

    const ALICE: Address = Address::repeat_byte(0xa1);

    async fn setup_storage() -> (Storage, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let storage = Storage::new_with_path(temp_db.path(), None, None)
            .await
            .unwrap();
        storage.run_migrations().await.unwrap();
        (storage, temp_db)
    }

    fn registry(event: RegistryEvent) -> EnsEvent {
        EnsEvent::Registry {
            source: RegistrySource::Current,
            event,
        }
    }

    /// `eth` and `alice.eth` created, registered and wrapped.
    fn alice_batch() -> Changeset {
        let token = b256_to_token_id(&labelhash("alice"));
        let events = vec![
            at(
                10,
                0,
                registry(RegistryEvent::NewOwner {
                    node: ROOT_NODE,
                    label: labelhash("eth"),
                    owner: Address::repeat_byte(0xee),
                }),
            ),
            at(
                10,
                1,
                registry(RegistryEvent::NewOwner {
                    node: ETH_NODE,
                    label: labelhash("alice"),
                    owner: ALICE,
                }),
            ),
            at(
                10,
                2,
                EnsEvent::Registrar(RegistrarEvent::NameRegistered {
                    token_id: token,
                    owner: ALICE,
                    expires: U256::from(2_000_000_000u64),
                }),
            ),
            at(
                10,
                3,
                EnsEvent::Wrapper(WrapperEvent::NameWrapped {
                    node: namehash("alice.eth"),
                    name: Bytes::from(encode_name("alice.eth").unwrap()),
                    owner: ALICE,
                    fuses: 0,
                    expiry: u64::MAX,
                }),
            ),
        ];
        Projector::new()
            .apply_batch(&Snapshot::new(), &events)
            .unwrap()
    }

    #[tokio::test]
    async fn test_changeset_round_trip() {
        let (storage, _temp_db) = setup_storage().await;
        let changes = alice_batch();
        storage.apply_changeset(&changes, 10).await.unwrap();

        let alice = namehash("alice.eth");
        let stored = storage.get_domain(&alice).await.unwrap().unwrap();
        assert_eq!(Some(&stored), changes.domain(&alice));
        assert_eq!(stored.name.as_deref(), Some("alice.eth"));

        let root = storage.get_domain(&ROOT_NODE).await.unwrap().unwrap();
        assert!(root.is_migrated);
        assert_eq!(root.subdomain_count, 0);

        let registration = storage
            .get_registration(&token_label_id(&b256_to_token_id(&labelhash("alice"))))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(registration.registrant, ALICE);

        let wrapped = storage.get_wrapped_domain(&alice).await.unwrap().unwrap();
        assert_eq!(wrapped.expiry_date, u64::MAX);

        assert!(storage.has_account(&ALICE).await.unwrap());

        let events = storage.get_domain_events(&alice).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind.name(), "NewOwner");
        assert_eq!(events[1].kind.name(), "NameWrapped");

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.last_block_number, 10);
        assert_eq!(stats.event_count, 4);
        assert_eq!(stats.wrapped_domain_count, 1);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_events_are_write_once() {
        let (storage, _temp_db) = setup_storage().await;
        let changes = alice_batch();
        storage.apply_changeset(&changes, 10).await.unwrap();
        storage.apply_changeset(&changes, 10).await.unwrap();

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.event_count, 4);
        assert_eq!(stats.domain_count, 3);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_removed_wrapped_domain_is_deleted() {
        let (storage, _temp_db) = setup_storage().await;
        storage.apply_changeset(&alice_batch(), 10).await.unwrap();

        let alice = namehash("alice.eth");
        let changes = Changeset {
            removed_wrapped_domains: vec![alice],
            ..Default::default()
        };
        storage.apply_changeset(&changes, 11).await.unwrap();

        assert!(storage.get_wrapped_domain(&alice).await.unwrap().is_none());
        assert_eq!(storage.get_sync_state().await.unwrap().last_block_number, 11);

        storage.close().await;
    }
}
