use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use judoc_types::{BlockId, BlockIndex};
use uuid::Uuid;

/// Source of fresh identifiers for blocks and write versions.
///
/// Injected into the engine so tests can run with deterministic ids.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Uuid;
}

/// UUIDv7 identifiers: globally unique and ordered by creation time.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeOrderedIds;

impl IdGenerator for TimeOrderedIds {
    fn generate(&self) -> Uuid {
        Uuid::now_v7()
    }
}

/// Monotonic counter ids, unique within one generator only.
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// The counter value the next id will carry.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> Uuid {
        Uuid::from_u64_pair(0, self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for SequentialIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialIds")
            .field("next", &self.peek())
            .finish()
    }
}

/// Assigns block ids during one write and seals them into a [`BlockIndex`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockAllocator {
    /// Every block gets a fresh unique id; the manifest lists them.
    Unique,
    /// Blocks are numbered `1..` under one version; the manifest names the
    /// version only.
    Sequenced { version: Uuid, next: u64 },
}

impl BlockAllocator {
    pub fn unique() -> Self {
        Self::Unique
    }

    pub fn sequenced(version: Uuid) -> Self {
        Self::Sequenced { version, next: 1 }
    }

    pub fn next(&mut self, ids: &dyn IdGenerator) -> BlockId {
        match self {
            Self::Unique => BlockId::Unique(ids.generate()),
            Self::Sequenced { version, next } => {
                let id = BlockId::Sequence {
                    version: *version,
                    seq: *next,
                };
                *next += 1;
                id
            }
        }
    }

    /// The manifest index describing `blocks`, which must be the ids this
    /// allocator produced, in stream order.
    pub fn seal(&self, blocks: Vec<BlockId>) -> BlockIndex {
        match self {
            Self::Unique => BlockIndex::Listed(blocks),
            Self::Sequenced { version, .. } => BlockIndex::Scanned { version: *version },
        }
    }
}
