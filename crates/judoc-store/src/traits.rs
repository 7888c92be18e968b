use async_trait::async_trait;
use bytes::Bytes;
use judoc_types::{BlockId, Consistency, Manifest, ObjectKey};
use uuid::Uuid;

use crate::error::StoreResult;

/// Raw row-store contract backing judoc.
///
/// All implementations must satisfy these invariants:
/// - Each operation is atomic at single-row granularity only. Callers never
///   assume cross-row atomicity.
/// - A missing row is `Ok(None)`, never an error.
/// - Block payloads are opaque; the store never interprets them.
/// - Manifest rows are replaced wholesale, never appended to.
/// - All I/O errors are propagated with the operation and row they concern.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Persist one block row owned by `key`.
    async fn put_block(
        &self,
        key: &ObjectKey,
        id: &BlockId,
        payload: Bytes,
        consistency: Consistency,
    ) -> StoreResult<()>;

    /// Fetch one block payload.
    async fn get_block(
        &self,
        key: &ObjectKey,
        id: &BlockId,
        consistency: Consistency,
    ) -> StoreResult<Option<Bytes>>;

    /// Delete a set of block rows owned by `key`. Missing rows are ignored.
    async fn delete_blocks(
        &self,
        key: &ObjectKey,
        ids: &[BlockId],
        consistency: Consistency,
    ) -> StoreResult<()>;

    /// Create or replace the manifest row of `manifest.key`.
    async fn put_manifest(&self, manifest: &Manifest, consistency: Consistency) -> StoreResult<()>;

    /// Fetch the manifest row of `key`.
    async fn get_manifest(
        &self,
        key: &ObjectKey,
        consistency: Consistency,
    ) -> StoreResult<Option<Manifest>>;

    /// Delete the manifest row of `key`. Deleting a missing row succeeds.
    async fn delete_manifest(&self, key: &ObjectKey, consistency: Consistency) -> StoreResult<()>;

    /// Sequence numbers of the block rows stored under `(key, version)` that
    /// are strictly greater than `after`, ascending, at most `limit` of them.
    async fn scan_block_ids(
        &self,
        key: &ObjectKey,
        version: Uuid,
        after: u64,
        limit: usize,
        consistency: Consistency,
    ) -> StoreResult<Vec<u64>>;
}
