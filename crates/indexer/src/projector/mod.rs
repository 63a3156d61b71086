//! Event projection.
//!
//! A [`Projector`] applies decoded events one at a time, in chain order, to a
//! [`WorkingSet`]. Each event is routed to the registry, registrar, resolver
//! or name wrapper rules, which read and write entities through the working
//! set and stage immutable records. Nothing here performs I/O.

use std::collections::HashMap;

use alloy::primitives::B256;
use ensgraph_core::{labelhash, EventId, ETH_TLD};
use thiserror::Error;
use tracing::{debug, info};

use crate::events::{EnsEvent, Envelope};
use crate::store::{Backend, Changeset, WorkingSet};

mod registrar;
mod registry;
mod resolver;
mod wrapper;

/// Fatal projection errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectError {
    /// Events must arrive in strictly ascending `(blockNumber, logIndex)` order.
    #[error("event {got} is not after previously applied event {previous}")]
    OutOfOrder {
        /// Last applied event.
        previous: EventId,
        /// Offending event.
        got: EventId,
    },
}

/// What applying a single event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State was updated (and a record staged, where the event has one).
    Applied,
    /// Only an audit record was staged.
    Recorded,
    /// The event was dropped entirely.
    Skipped(SkipReason),
}

/// Why an event was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Legacy registry event for a name the current registry now controls.
    Migrated,
    /// The event refers to an entity that was never created.
    UnknownDomain,
    /// A plaintext label contained a null byte or a dot.
    InvalidLabel,
    /// A resolver name record contained a null byte.
    InvalidName,
}

/// Plaintext labels learned so far, keyed by label hash.
///
/// Filled by controller preimage reveals, decoded wrapper names and parent
/// labels seen while building the tree. Lives as long as the [`Projector`],
/// so names revealed in one batch can still be used in later ones.
#[derive(Debug, Clone)]
pub struct LabelCache {
    labels: HashMap<B256, String>,
}

impl LabelCache {
    /// A cache that already knows the `eth` top-level label.
    pub fn new() -> Self {
        let mut labels = HashMap::new();
        labels.insert(labelhash(ETH_TLD), ETH_TLD.to_string());
        Self { labels }
    }

    /// Plaintext for a label hash.
    pub fn get(&self, label: &B256) -> Option<&str> {
        self.labels.get(label).map(String::as_str)
    }

    /// Remember a plaintext label.
    pub fn insert(&mut self, label: B256, plaintext: impl Into<String>) {
        self.labels.insert(label, plaintext.into());
    }

    /// Number of known labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when nothing is known.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies events to a working set.
#[derive(Debug, Clone, Default)]
pub struct Projector {
    labels: LabelCache,
    last: Option<EventId>,
}

impl Projector {
    /// Create a projector with an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Known plaintext labels.
    pub fn labels(&self) -> &LabelCache {
        &self.labels
    }

    /// Last applied event.
    pub fn last_event(&self) -> Option<EventId> {
        self.last
    }

    /// Apply one event.
    pub fn apply<B: Backend + ?Sized>(
        &mut self,
        ws: &mut WorkingSet<'_, B>,
        envelope: &Envelope,
    ) -> Result<Outcome, ProjectError> {
        let id = envelope.meta.event_id();
        if let Some(previous) = self.last {
            if id <= previous {
                return Err(ProjectError::OutOfOrder { previous, got: id });
            }
        }
        self.last = Some(id);

        let meta = &envelope.meta;
        let outcome = match &envelope.event {
            EnsEvent::Registry { source, event } => {
                registry::apply(ws, &mut self.labels, meta, *source, event)
            }
            EnsEvent::Registrar(event) => registrar::apply(ws, &mut self.labels, meta, event),
            EnsEvent::Resolver {
                resolver,
                node,
                event,
            } => resolver::apply(ws, meta, *resolver, *node, event),
            EnsEvent::Wrapper(event) => wrapper::apply(ws, &mut self.labels, meta, event),
        };

        debug!(
            event_id = %id,
            kind = envelope.event.kind(),
            outcome = ?outcome,
            "Applied event"
        );

        Ok(outcome)
    }

    /// Apply a batch of events on top of `backend` and return the changes.
    pub fn apply_batch<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        envelopes: &[Envelope],
    ) -> Result<Changeset, ProjectError> {
        let mut ws = WorkingSet::new(backend);
        let (mut applied, mut recorded, mut skipped) = (0usize, 0usize, 0usize);

        for envelope in envelopes {
            match self.apply(&mut ws, envelope)? {
                Outcome::Applied => applied += 1,
                Outcome::Recorded => recorded += 1,
                Outcome::Skipped(_) => skipped += 1,
            }
        }

        let changes = ws.into_changeset();
        info!(
            events = envelopes.len(),
            applied,
            recorded,
            skipped,
            domains = changes.domains.len(),
            records = changes.events.len(),
            "Projected batch"
        );

        Ok(changes)
    }
}
