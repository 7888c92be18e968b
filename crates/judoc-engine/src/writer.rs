use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use chrono::Utc;
use judoc_store::BackendAdapter;
use judoc_types::{BlockId, Manifest, ObjectKey};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{EngineError, EngineResult};
use crate::ids::IdGenerator;
use crate::report::{Cleanup, WriteReport};
use crate::resolver::ManifestResolver;

/// Splits an input stream into blocks, persists them, publishes the new
/// manifest and reclaims the blocks of the version it replaces.
///
/// Publishing is a read of the previous manifest followed by a blind
/// overwrite. Two writers racing on the same key both succeed; the manifest
/// written last wins and the other writer's blocks stay behind as orphans.
/// Reads always see one complete version.
#[derive(Clone)]
pub struct BlockWriter {
    backend: BackendAdapter,
    resolver: Arc<dyn ManifestResolver>,
    ids: Arc<dyn IdGenerator>,
    block_size: usize,
}

impl BlockWriter {
    pub fn new(
        backend: BackendAdapter,
        resolver: Arc<dyn ManifestResolver>,
        ids: Arc<dyn IdGenerator>,
        block_size: usize,
    ) -> Self {
        Self {
            backend,
            resolver,
            ids,
            block_size: block_size.max(1),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Store everything `input` yields as the new content of `key`.
    ///
    /// At most one block of input is held in memory. On any failure before
    /// the manifest is published, the blocks written so far are deleted again
    /// and the previous version stays readable.
    pub async fn write<R>(&self, key: &ObjectKey, mut input: R) -> EngineResult<WriteReport>
    where
        R: AsyncRead + Unpin + Send,
    {
        let started = Instant::now();
        let mut allocator = self.resolver.allocator(self.ids.as_ref());
        let mut pending = PendingBlocks::new(self.backend.clone(), key.clone());
        let mut bytes = 0u64;

        loop {
            let block = match fill_block(&mut input, self.block_size).await {
                Ok(block) => block,
                Err(source) => {
                    let cause = EngineError::Stream {
                        key: key.clone(),
                        source,
                    };
                    return Err(pending.abort(cause).await);
                }
            };
            if block.is_empty() {
                break;
            }

            let len = block.len();
            let id = allocator.next(self.ids.as_ref());
            // Tracked before the put so a timed-out put is rolled back too.
            pending.push(id);
            if let Err(e) = self.backend.put_block(key, &id, block.freeze()).await {
                return Err(pending.abort(e.into()).await);
            }
            bytes += len as u64;

            if len < self.block_size {
                break;
            }
        }

        let previous = match self.resolver.resolve(key).await {
            Ok(previous) => previous,
            Err(e) => return Err(pending.abort(e).await),
        };

        let manifest = Manifest::new(key.clone(), allocator.seal(pending.ids().to_vec()), Utc::now());
        // A cancelled manifest write may still land. From here on a dropped
        // write leaves orphans instead of rolling back.
        pending.hold();
        if let Err(e) = self.backend.put_manifest(&manifest).await {
            if !e.is_timeout() {
                return Err(pending.abort(e.into()).await);
            }
            // A timed-out write may have landed. Only roll back once the
            // manifest row is known not to name these blocks.
            match self.backend.get_manifest(key).await {
                Ok(Some(current)) if current.index == manifest.index => {
                    tracing::warn!(key = %key, error = %e, "manifest write timed out but landed");
                }
                Ok(_) => return Err(pending.abort(e.into()).await),
                Err(check) => {
                    let kept = pending.publish();
                    tracing::warn!(
                        key = %key,
                        blocks = kept.len(),
                        error = %e,
                        check = %check,
                        "manifest write timed out and could not be confirmed; blocks kept"
                    );
                    return Err(e.into());
                }
            }
        }
        let blocks = pending.publish();

        let cleanup = match previous {
            Some(previous) => self.reclaim(key, previous.blocks, &blocks).await,
            None => Cleanup::Complete,
        };

        tracing::info!(
            key = %key,
            blocks = blocks.len(),
            bytes,
            took_ms = started.elapsed().as_millis() as u64,
            "stored object"
        );
        Ok(WriteReport {
            key: key.clone(),
            blocks,
            bytes,
            cleanup,
        })
    }

    /// Delete the previous version's blocks that the new version does not
    /// reference.
    async fn reclaim(&self, key: &ObjectKey, previous: Vec<BlockId>, current: &[BlockId]) -> Cleanup {
        let live: HashSet<&BlockId> = current.iter().collect();
        let stale: Vec<BlockId> = previous.into_iter().filter(|id| !live.contains(id)).collect();
        match self.backend.delete_blocks(key, &stale).await {
            Ok(()) => Cleanup::Complete,
            Err(error) => {
                tracing::warn!(
                    key = %key,
                    blocks = stale.len(),
                    error = %error,
                    "failed to reclaim previous blocks; left as orphans"
                );
                Cleanup::Orphaned {
                    blocks: stale.len(),
                    error,
                }
            }
        }
    }
}

impl std::fmt::Debug for BlockWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockWriter")
            .field("strategy", &self.resolver.strategy())
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

/// Read up to `block_size` bytes, across as many short reads as it takes.
///
/// Returns a short block only at end of input, and an empty one once the
/// input is exhausted.
async fn fill_block<R>(input: &mut R, block_size: usize) -> io::Result<BytesMut>
where
    R: AsyncRead + Unpin,
{
    let mut block = BytesMut::with_capacity(block_size);
    while block.len() < block_size {
        let remaining = (block_size - block.len()) as u64;
        match (&mut *input).take(remaining).read_buf(&mut block).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(block)
}

/// Blocks persisted by a write that has not published its manifest yet.
///
/// Dropping an armed guard (the write future was cancelled) spawns a
/// background rollback on the current runtime.
struct PendingBlocks {
    backend: BackendAdapter,
    key: ObjectKey,
    ids: Vec<BlockId>,
    armed: bool,
}

impl PendingBlocks {
    fn new(backend: BackendAdapter, key: ObjectKey) -> Self {
        Self {
            backend,
            key,
            ids: Vec::new(),
            armed: true,
        }
    }

    fn push(&mut self, id: BlockId) {
        self.ids.push(id);
    }

    fn ids(&self) -> &[BlockId] {
        &self.ids
    }

    fn hold(&mut self) {
        self.armed = false;
    }

    fn publish(mut self) -> Vec<BlockId> {
        self.armed = false;
        std::mem::take(&mut self.ids)
    }

    /// Best-effort delete of every pending block. Returns the error to
    /// surface: `cause` itself, or `cause` wrapped with the rollback failure.
    async fn abort(mut self, cause: EngineError) -> EngineError {
        self.armed = false;
        let ids = std::mem::take(&mut self.ids);
        if ids.is_empty() {
            return cause;
        }
        match self.backend.delete_blocks(&self.key, &ids).await {
            Ok(()) => {
                tracing::warn!(
                    key = %self.key,
                    blocks = ids.len(),
                    error = %cause,
                    "write failed; rolled back partial blocks"
                );
                cause
            }
            Err(rollback) => {
                tracing::warn!(
                    key = %self.key,
                    blocks = ids.len(),
                    error = %cause,
                    rollback = %rollback,
                    "write failed and rollback failed; blocks left as orphans"
                );
                EngineError::Rollback {
                    cause: Box::new(cause),
                    orphans: ids.len(),
                    rollback,
                }
            }
        }
    }
}

impl Drop for PendingBlocks {
    fn drop(&mut self) {
        if !self.armed || self.ids.is_empty() {
            return;
        }
        let ids = std::mem::take(&mut self.ids);
        let backend = self.backend.clone();
        let key = self.key.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match backend.delete_blocks(&key, &ids).await {
                        Ok(()) => tracing::debug!(
                            key = %key,
                            blocks = ids.len(),
                            "rolled back cancelled write"
                        ),
                        Err(e) => tracing::warn!(
                            key = %key,
                            blocks = ids.len(),
                            error = %e,
                            "rollback of cancelled write failed; blocks left as orphans"
                        ),
                    }
                });
            }
            Err(_) => tracing::warn!(
                key = %key,
                blocks = ids.len(),
                "write cancelled outside a runtime; blocks left as orphans"
            ),
        }
    }
}
