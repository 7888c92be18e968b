use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::block::BlockId;
use crate::key::ObjectKey;

/// How a manifest locates the blocks of its object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockIndex {
    /// The ordered block list is stored in the manifest row itself.
    Listed(Vec<BlockId>),
    /// Block rows are found by an ascending scan over `version`; the
    /// manifest only records which version is current.
    Scanned { version: Uuid },
}

impl BlockIndex {
    /// Short name of the layout, used in diagnostics.
    pub fn layout(&self) -> &'static str {
        match self {
            Self::Listed(_) => "listed",
            Self::Scanned { .. } => "scanned",
        }
    }
}

/// The authoritative description of an object's current content.
///
/// A manifest is replaced wholesale on every overwrite and never updated in
/// place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub key: ObjectKey,
    pub index: BlockIndex,
    pub modified_at: DateTime<Utc>,
}

impl Manifest {
    pub fn new(key: ObjectKey, index: BlockIndex, modified_at: DateTime<Utc>) -> Self {
        Self {
            key,
            index,
            modified_at,
        }
    }

    /// The explicit block list, if this manifest carries one.
    pub fn listed_blocks(&self) -> Option<&[BlockId]> {
        match &self.index {
            BlockIndex::Listed(blocks) => Some(blocks),
            BlockIndex::Scanned { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ObjectKey {
        ObjectKey::new("ns", "abc").unwrap()
    }

    #[test]
    fn listed_blocks_exposed() {
        let ids = vec![
            BlockId::Unique(Uuid::from_u64_pair(0, 2)),
            BlockId::Unique(Uuid::from_u64_pair(0, 1)),
        ];
        let m = Manifest::new(key(), BlockIndex::Listed(ids.clone()), Utc::now());
        // List order is authoritative, not id order.
        assert_eq!(m.listed_blocks().unwrap(), ids.as_slice());
        assert_eq!(m.index.layout(), "listed");
    }

    #[test]
    fn scanned_has_no_list() {
        let m = Manifest::new(
            key(),
            BlockIndex::Scanned { version: Uuid::from_u64_pair(0, 9) },
            Utc::now(),
        );
        assert!(m.listed_blocks().is_none());
        assert_eq!(m.index.layout(), "scanned");
    }

    #[test]
    fn empty_object_manifest() {
        let m = Manifest::new(key(), BlockIndex::Listed(vec![]), Utc::now());
        assert_eq!(m.listed_blocks().unwrap().len(), 0);
    }

    #[test]
    fn serde_roundtrip() {
        let m = Manifest::new(
            key(),
            BlockIndex::Listed(vec![BlockId::Unique(Uuid::now_v7())]),
            Utc::now(),
        );
        let json = serde_json::to_string(&m).unwrap();
        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(m, parsed);
    }
}
