//! ENS event projection into a queryable entity graph.
//!
//! This crate provides:
//! - Decoding of registry, registrar, controller, resolver and name wrapper logs
//! - The projector: deterministic, in-order application of events to entities
//! - The working-set store the projector reads and writes through
//! - SQLite storage with batch prefetch and atomic changeset flush
//! - A sync engine driving historical catch-up and live polling
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  ensgraph-indexer                        │
//! │                                          │
//! │  ┌──────────────┐                        │
//! │  │ RpcProvider  │ ← Ethereum RPC         │
//! │  │ + decode_log │   contract + resolver  │
//! │  └──────┬───────┘   logs                 │
//! │         │ Vec<Envelope>, chain order     │
//! │  ┌──────▼───────┐      ┌─────────────┐   │
//! │  │  Projector   │ ───► │ WorkingSet  │   │
//! │  │ registry     │      │ (Snapshot   │   │
//! │  │ registrar    │      │  read-thru) │   │
//! │  │ resolver     │      └──────┬──────┘   │
//! │  │ wrapper      │             │Changeset │
//! │  └──────────────┘      ┌──────▼──────┐   │
//! │                        │  Storage    │   │
//! │                        │  (SQLite)   │   │
//! │                        └─────────────┘   │
//! └──────────────────────────────────────────┘
//! ```
//!
//! The projector and working set are synchronous and perform no I/O; the
//! storage layer prefetches a [`store::Snapshot`] for each batch and commits
//! the resulting [`store::Changeset`] in one transaction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod events;
pub mod listener;
pub mod model;
pub mod projector;
pub mod storage;
pub mod store;

// Re-export common types
pub use ensgraph_core::*;
pub use events::{EnsEvent, Envelope, LogMeta};
pub use projector::{Outcome, ProjectError, Projector, SkipReason};
pub use store::{Backend, Changeset, Snapshot, WorkingSet};
