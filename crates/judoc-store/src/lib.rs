//! Backend adapter for judoc.
//!
//! judoc keeps every object as two kinds of rows in a wide-column store:
//! block rows holding opaque payload slices, and one manifest row per key
//! describing which blocks make up the current value. This crate owns the
//! row-level contract and the policy wrapped around it.
//!
//! # Storage Backends
//!
//! All backends implement the [`RowStore`] trait:
//!
//! - [`InMemoryRowStore`] -- `BTreeMap`-based store for tests, embedding and
//!   single-node development, with per-operation fault injection
//! - `ScyllaRowStore` -- Scylla / Cassandra cluster (feature `scylla`)
//!
//! The engine never talks to a [`RowStore`] directly. It goes through
//! [`BackendAdapter`], which applies the configured consistency levels,
//! bounds every call with a timeout and batches large deletes.
//!
//! # Design Rules
//!
//! 1. Single-row atomicity only. Nothing assumes multi-row transactions.
//! 2. A missing row is `Ok(None)`; only I/O failures are errors.
//! 3. Every error names the operation and the row it concerns.
//! 4. The store never interprets block payloads.

pub mod adapter;
#[cfg(feature = "scylla")]
pub mod cql;
pub mod error;
pub mod memory;
pub mod traits;

pub use adapter::{BackendAdapter, BackendOptions};
#[cfg(feature = "scylla")]
pub use cql::{ScyllaConfig, ScyllaRowStore};
pub use error::{Operation, StoreError, StoreResult};
pub use memory::InMemoryRowStore;
pub use traits::RowStore;
