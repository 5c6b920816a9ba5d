//! Yard storage abstractions.
//!
//! The engine depends on storage only through the traits in this crate:
//! - read access to master data (readers, trucks, equipment, kit templates)
//! - lookups over crossings, cases, custody and alerts, keyed by id
//! - scan claiming for idempotent consumption of raw reads
//! - a single transactional [`UnitOfWork::commit`] applying a [`ChangeSet`]
//!
//! Design stance:
//! - A relational store is the source of truth; the in-memory backend is a
//!   reference implementation with the same commit semantics.
//! - Every precondition that protects an invariant is checked at commit, and
//!   a violated precondition is reported as [`StorageError::Conflict`] so the
//!   caller can reload and recompute.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod changeset;
mod error;
pub mod memory;
mod traits;

pub use changeset::{AlertWrite, AssignmentWrite, CaseWrite, ChangeSet, CommitReceipt};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryYardStore;
pub use traits::{
    AlertStore, AssignmentStore, CaseStore, CatalogStore, CrossingStore, RulesStore, ScanStore,
    UnitOfWork, YardStore,
};
