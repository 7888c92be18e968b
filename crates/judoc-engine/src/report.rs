use judoc_store::StoreError;
use judoc_types::{BlockId, ObjectKey};

/// Outcome of a best-effort cleanup step that runs after the primary
/// operation has already succeeded.
///
/// A failed cleanup never fails the operation; the rows it could not delete
/// are unreachable orphans.
#[derive(Debug)]
pub enum Cleanup {
    Complete,
    Orphaned { blocks: usize, error: StoreError },
}

impl Cleanup {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Number of block rows left behind.
    pub fn orphans(&self) -> usize {
        match self {
            Self::Complete => 0,
            Self::Orphaned { blocks, .. } => *blocks,
        }
    }
}

/// Result of a successful write.
#[derive(Debug)]
pub struct WriteReport {
    pub key: ObjectKey,
    /// Blocks of the new version, in stream order.
    pub blocks: Vec<BlockId>,
    pub bytes: u64,
    /// Reclamation of the previous version's blocks.
    pub cleanup: Cleanup,
}

/// Result of a successful delete.
#[derive(Debug)]
pub struct DeleteReport {
    pub key: ObjectKey,
    pub blocks: usize,
    pub cleanup: Cleanup,
}
