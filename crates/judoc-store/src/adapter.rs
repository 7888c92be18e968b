use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use judoc_types::{BlockId, Consistency, Manifest, ObjectKey};
use uuid::Uuid;

use crate::error::{Operation, StoreError, StoreResult};
use crate::traits::RowStore;

/// Consistency, timeout and batching policy applied to every backend call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendOptions {
    /// Level used for block, manifest and delete writes.
    pub write_consistency: Consistency,
    /// Level used for block fetches, manifest lookups and scans.
    pub read_consistency: Consistency,
    /// Upper bound on every single backend call.
    pub timeout: Duration,
    /// Maximum number of block ids sent in one delete statement.
    pub delete_batch: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            write_consistency: Consistency::Any,
            read_consistency: Consistency::One,
            timeout: Duration::from_secs(60),
            delete_batch: 100,
        }
    }
}

/// The engine's only path to the backend.
///
/// Wraps a [`RowStore`] and owns the consistency and timeout policy: every
/// call runs with the configured level and is bounded by
/// [`BackendOptions::timeout`], so a stuck backend surfaces as
/// [`StoreError::Timeout`] instead of a hung request. Cloning is cheap.
#[derive(Clone)]
pub struct BackendAdapter {
    store: Arc<dyn RowStore>,
    options: BackendOptions,
}

impl BackendAdapter {
    pub fn new(store: Arc<dyn RowStore>, options: BackendOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &BackendOptions {
        &self.options
    }

    pub async fn put_block(&self, key: &ObjectKey, id: &BlockId, payload: Bytes) -> StoreResult<()> {
        let size = payload.len();
        let started = Instant::now();
        self.bounded(
            Operation::PutBlock,
            || format!("{key}/{id}"),
            self.store.put_block(key, id, payload, self.options.write_consistency),
        )
        .await?;
        tracing::debug!(
            key = %key,
            block = %id,
            size,
            took_ms = started.elapsed().as_millis() as u64,
            "created block"
        );
        Ok(())
    }

    pub async fn get_block(&self, key: &ObjectKey, id: &BlockId) -> StoreResult<Option<Bytes>> {
        let started = Instant::now();
        let payload = self
            .bounded(
                Operation::GetBlock,
                || format!("{key}/{id}"),
                self.store.get_block(key, id, self.options.read_consistency),
            )
            .await?;
        tracing::debug!(
            key = %key,
            block = %id,
            size = payload.as_ref().map_or(0, Bytes::len),
            took_ms = started.elapsed().as_millis() as u64,
            "read block"
        );
        Ok(payload)
    }

    /// Delete `ids`, split into statements of at most `delete_batch` ids.
    ///
    /// Stops at the first failing batch; rows of earlier batches stay deleted.
    pub async fn delete_blocks(&self, key: &ObjectKey, ids: &[BlockId]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        for batch in ids.chunks(self.options.delete_batch.max(1)) {
            self.bounded(
                Operation::DeleteBlocks,
                || format!("{key} ({} blocks)", batch.len()),
                self.store.delete_blocks(key, batch, self.options.write_consistency),
            )
            .await?;
        }
        tracing::debug!(key = %key, blocks = ids.len(), "removed blocks");
        Ok(())
    }

    pub async fn put_manifest(&self, manifest: &Manifest) -> StoreResult<()> {
        self.bounded(
            Operation::PutManifest,
            || manifest.key.to_string(),
            self.store.put_manifest(manifest, self.options.write_consistency),
        )
        .await
    }

    pub async fn get_manifest(&self, key: &ObjectKey) -> StoreResult<Option<Manifest>> {
        self.bounded(
            Operation::GetManifest,
            || key.to_string(),
            self.store.get_manifest(key, self.options.read_consistency),
        )
        .await
    }

    pub async fn delete_manifest(&self, key: &ObjectKey) -> StoreResult<()> {
        self.bounded(
            Operation::DeleteManifest,
            || key.to_string(),
            self.store.delete_manifest(key, self.options.write_consistency),
        )
        .await
    }

    /// One page of sequence numbers greater than `after`, ascending.
    pub async fn scan_block_ids(
        &self,
        key: &ObjectKey,
        version: Uuid,
        after: u64,
        limit: usize,
    ) -> StoreResult<Vec<u64>> {
        self.bounded(
            Operation::ScanBlocks,
            || format!("{key}@{version}"),
            self.store
                .scan_block_ids(key, version, after, limit, self.options.read_consistency),
        )
        .await
    }

    async fn bounded<T, F>(
        &self,
        op: Operation,
        target: impl FnOnce() -> String,
        call: F,
    ) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.options.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                op,
                target: target(),
                after: self.options.timeout,
            }),
        }
    }
}

impl fmt::Debug for BackendAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendAdapter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
