//! Chunked object engine for judoc.
//!
//! Stores byte streams of any size as fixed-size blocks in a row store that
//! only offers single-row atomicity, and reads them back as lazy streams.
//!
//! # Flows
//!
//! - **Write**: [`BlockWriter`] splits the input into blocks, persists each
//!   one, publishes a new [`Manifest`](judoc_types::Manifest), then reclaims
//!   the previous version's blocks. Failures before publish roll back.
//! - **Read**: a [`ManifestResolver`] turns the key into ordered block ids and
//!   a [`BlockReader`] fetches them one at a time.
//! - **Delete**: [`Deleter`] drops the manifest, then the blocks.
//!
//! # Resolution strategies
//!
//! - [`IndexRowResolver`] -- the manifest row lists every block id. One point
//!   read per resolve.
//! - [`RangeScanResolver`] -- the manifest row names a write version and the
//!   block ids are recovered by a paginated ascending scan.
//!
//! Fatal failures are [`EngineError`]s. Cleanup that fails after the primary
//! operation succeeded is reported as [`Cleanup::Orphaned`] and logged.

pub mod config;
pub mod deleter;
pub mod engine;
pub mod error;
pub mod ids;
pub mod reader;
pub mod report;
pub mod resolver;
pub mod writer;

pub use config::{EngineConfig, DEFAULT_BLOCK_SIZE, DEFAULT_SCAN_PAGE_SIZE};
pub use deleter::Deleter;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use ids::{BlockAllocator, IdGenerator, SequentialIds, TimeOrderedIds};
pub use reader::BlockReader;
pub use report::{Cleanup, DeleteReport, WriteReport};
pub use resolver::{IndexRowResolver, ManifestResolver, RangeScanResolver, Resolved, Strategy};
pub use writer::BlockWriter;

// Re-export the types callers need to drive the engine.
pub use judoc_store::{BackendOptions, InMemoryRowStore, RowStore, StoreError};
pub use judoc_types::{Consistency, ObjectKey};
