use bytes::{Buf, Bytes};
use futures::Stream;
use judoc_store::BackendAdapter;
use judoc_types::{BlockId, ObjectKey};

use crate::error::{EngineError, EngineResult};

/// Lazy, sequential byte stream over a resolved block sequence.
///
/// Blocks are fetched one at a time, only when the previous one has been
/// consumed, so at most one block payload is buffered whatever the object
/// size. The reader is single-use; reading again means resolving again.
///
/// The first failed fetch terminates the reader. Bytes already returned stay
/// valid, and every later pull is [`EngineError::Terminated`].
pub struct BlockReader {
    backend: BackendAdapter,
    key: ObjectKey,
    blocks: Vec<BlockId>,
    next: usize,
    current: Bytes,
    terminated: bool,
}

impl BlockReader {
    pub fn new(backend: BackendAdapter, key: ObjectKey, blocks: Vec<BlockId>) -> Self {
        Self {
            backend,
            key,
            blocks,
            next: 0,
            current: Bytes::new(),
            terminated: false,
        }
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes fetched but not yet handed to the caller.
    pub fn buffered(&self) -> usize {
        self.current.len()
    }

    /// `true` once every block has been fetched and consumed.
    pub fn is_finished(&self) -> bool {
        self.next >= self.blocks.len() && self.current.is_empty()
    }

    /// The rest of the current block, or the next block.
    ///
    /// `Ok(None)` marks the end of the object. Blocks with an empty payload
    /// are skipped.
    pub async fn next_chunk(&mut self) -> EngineResult<Option<Bytes>> {
        if self.terminated {
            return Err(EngineError::Terminated);
        }
        if !self.current.is_empty() {
            return Ok(Some(std::mem::take(&mut self.current)));
        }

        while let Some(id) = self.blocks.get(self.next).copied() {
            match self.backend.get_block(&self.key, &id).await {
                Ok(Some(payload)) => {
                    self.next += 1;
                    if !payload.is_empty() {
                        return Ok(Some(payload));
                    }
                }
                Ok(None) => {
                    self.terminated = true;
                    return Err(EngineError::MissingBlock {
                        key: self.key.clone(),
                        block: id,
                    });
                }
                Err(e) => {
                    self.terminated = true;
                    return Err(e.into());
                }
            }
        }
        Ok(None)
    }

    /// Copy the next bytes into `buf`. Returns `0` at the end of the object
    /// (or when `buf` is empty).
    pub async fn read(&mut self, buf: &mut [u8]) -> EngineResult<usize> {
        if self.terminated {
            return Err(EngineError::Terminated);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.current.is_empty() {
            match self.next_chunk().await? {
                Some(chunk) => self.current = chunk,
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }

    /// Drain the reader into memory. Only sensible for small objects.
    pub async fn read_to_end(&mut self) -> EngineResult<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// The reader as a `Stream` of chunks, ending after the first error.
    pub fn into_stream(self) -> impl Stream<Item = EngineResult<Bytes>> + Send + 'static {
        futures::stream::try_unfold(self, |mut reader| async move {
            Ok(reader.next_chunk().await?.map(|chunk| (chunk, reader)))
        })
    }
}

impl std::fmt::Debug for BlockReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockReader")
            .field("key", &self.key)
            .field("blocks", &self.blocks.len())
            .field("next", &self.next)
            .field("buffered", &self.current.len())
            .field("terminated", &self.terminated)
            .finish()
    }
}
