use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one block row.
///
/// Two identifier schemes exist, one per manifest-resolution strategy:
///
/// - [`BlockId::Unique`] -- a UUIDv7, globally unique and time-ordered. The
///   manifest lists these explicitly, so their order in the list is what
///   counts, not their value.
/// - [`BlockId::Sequence`] -- a sequence number scoped to one write
///   (`version`) of an object. Ordering by value is the stream order, which
///   the range-scan resolver relies on.
///
/// The derived `Ord` is a stable total order: variant first, then fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockId {
    Unique(Uuid),
    Sequence { version: Uuid, seq: u64 },
}

impl BlockId {
    /// The version a sequenced block belongs to.
    pub fn version(&self) -> Option<Uuid> {
        match self {
            Self::Unique(_) => None,
            Self::Sequence { version, .. } => Some(*version),
        }
    }

    /// The sequence number of a sequenced block.
    pub fn seq(&self) -> Option<u64> {
        match self {
            Self::Unique(_) => None,
            Self::Sequence { seq, .. } => Some(*seq),
        }
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({self})")
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unique(id) => write!(f, "{id}"),
            Self::Sequence { version, seq } => write!(f, "{version}#{seq}"),
        }
    }
}
