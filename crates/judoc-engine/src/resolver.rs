use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use judoc_store::{BackendAdapter, Operation, StoreError};
use judoc_types::{BlockId, BlockIndex, Manifest, ObjectKey};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::ids::{BlockAllocator, IdGenerator};

/// Which manifest-resolution strategy a deployment uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// The manifest row stores the ordered block list.
    #[default]
    IndexRow,
    /// The manifest row names a version; its blocks are found by a paginated
    /// ascending scan.
    RangeScan,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IndexRow => "index-row",
            Self::RangeScan => "range-scan",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "index-row" | "index" => Ok(Self::IndexRow),
            "range-scan" | "scan" => Ok(Self::RangeScan),
            other => Err(format!("unknown strategy `{other}` (expected index-row or range-scan)")),
        }
    }
}

/// A manifest together with the complete ordered block sequence it resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub manifest: Manifest,
    pub blocks: Vec<BlockId>,
}

/// Turns an object key into the ordered block ids of its current version.
///
/// Both strategies are strict about the manifest layout they read: a
/// manifest written under the other strategy is a
/// [`EngineError::LayoutMismatch`], never a guess.
#[async_trait]
pub trait ManifestResolver: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// A fresh allocator for one write under this strategy.
    fn allocator(&self, ids: &dyn IdGenerator) -> BlockAllocator;

    /// `Ok(None)` when no manifest exists. A manifest with zero blocks
    /// resolves to an empty sequence.
    async fn resolve(&self, key: &ObjectKey) -> EngineResult<Option<Resolved>>;

    /// Like [`resolve`](Self::resolve), but a missing object is
    /// [`EngineError::NotFound`].
    async fn resolve_existing(&self, key: &ObjectKey) -> EngineResult<Resolved> {
        self.resolve(key)
            .await?
            .ok_or_else(|| EngineError::NotFound(key.clone()))
    }
}

/// Single point read of the manifest row, which lists every block.
#[derive(Clone, Debug)]
pub struct IndexRowResolver {
    backend: BackendAdapter,
}

impl IndexRowResolver {
    pub fn new(backend: BackendAdapter) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ManifestResolver for IndexRowResolver {
    fn strategy(&self) -> Strategy {
        Strategy::IndexRow
    }

    fn allocator(&self, _ids: &dyn IdGenerator) -> BlockAllocator {
        BlockAllocator::unique()
    }

    async fn resolve(&self, key: &ObjectKey) -> EngineResult<Option<Resolved>> {
        let Some(manifest) = self.backend.get_manifest(key).await? else {
            return Ok(None);
        };
        let blocks = match &manifest.index {
            BlockIndex::Listed(blocks) => blocks.clone(),
            other => {
                return Err(EngineError::LayoutMismatch {
                    key: key.clone(),
                    expected: "listed",
                    found: other.layout(),
                })
            }
        };
        Ok(Some(Resolved { manifest, blocks }))
    }
}

/// Reads the manifest row for the current version, then pages through that
/// version's block rows in ascending sequence order.
#[derive(Clone, Debug)]
pub struct RangeScanResolver {
    backend: BackendAdapter,
    page_size: usize,
}

impl RangeScanResolver {
    pub fn new(backend: BackendAdapter, page_size: usize) -> Self {
        Self {
            backend,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

#[async_trait]
impl ManifestResolver for RangeScanResolver {
    fn strategy(&self) -> Strategy {
        Strategy::RangeScan
    }

    fn allocator(&self, ids: &dyn IdGenerator) -> BlockAllocator {
        BlockAllocator::sequenced(ids.generate())
    }

    async fn resolve(&self, key: &ObjectKey) -> EngineResult<Option<Resolved>> {
        let Some(manifest) = self.backend.get_manifest(key).await? else {
            return Ok(None);
        };
        let version = match &manifest.index {
            BlockIndex::Scanned { version } => *version,
            other => {
                return Err(EngineError::LayoutMismatch {
                    key: key.clone(),
                    expected: "scanned",
                    found: other.layout(),
                })
            }
        };

        let mut seqs = Vec::new();
        let mut cursor = 0;
        let mut pages = 0usize;
        loop {
            let page = self
                .backend
                .scan_block_ids(key, version, cursor, self.page_size)
                .await?;
            let Some(&last) = page.last() else {
                break;
            };
            // A page that does not move the cursor forward would loop forever.
            if last <= cursor {
                return Err(StoreError::malformed(
                    Operation::ScanBlocks,
                    format!("{key}@{version}"),
                    format!("page ended at {last}, not past cursor {cursor}"),
                )
                .into());
            }
            cursor = last;
            pages += 1;
            seqs.extend(page);
        }
        seqs.sort_unstable();
        seqs.dedup();

        tracing::debug!(key = %key, blocks = seqs.len(), pages, "scanned block ids");
        let blocks = seqs
            .into_iter()
            .map(|seq| BlockId::Sequence { version, seq })
            .collect();
        Ok(Some(Resolved { manifest, blocks }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;
    use chrono::Utc;
    use judoc_store::{BackendOptions, InMemoryRowStore};
    use uuid::Uuid;

    fn key() -> ObjectKey {
        ObjectKey::new("ns", "resolve").unwrap()
    }

    fn backend(store: &Arc<InMemoryRowStore>) -> BackendAdapter {
        BackendAdapter::new(store.clone(), BackendOptions::default())
    }

    // -----------------------------------------------------------------------
    // Strategy
    // -----------------------------------------------------------------------

    #[test]
    fn strategy_parse_and_display() {
        assert_eq!("index-row".parse::<Strategy>().unwrap(), Strategy::IndexRow);
        assert_eq!("RANGE_SCAN".parse::<Strategy>().unwrap(), Strategy::RangeScan);
        assert!("btree".parse::<Strategy>().is_err());
        assert_eq!(Strategy::RangeScan.to_string(), "range-scan");
        assert_eq!(Strategy::default(), Strategy::IndexRow);
    }

    #[test]
    fn strategy_serde_kebab_case() {
        let json = serde_json::to_string(&Strategy::RangeScan).unwrap();
        assert_eq!(json, "\"range-scan\"");
    }

    // -----------------------------------------------------------------------
    // Index row
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn index_row_missing_is_none() {
        let store = Arc::new(InMemoryRowStore::new());
        let resolver = IndexRowResolver::new(backend(&store));
        assert!(resolver.resolve(&key()).await.unwrap().is_none());
        let err = resolver.resolve_existing(&key()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn index_row_keeps_list_order() {
        let store = Arc::new(InMemoryRowStore::new());
        let ids = vec![
            BlockId::Unique(Uuid::from_u64_pair(0, 9)),
            BlockId::Unique(Uuid::from_u64_pair(0, 3)),
        ];
        let manifest = Manifest::new(key(), BlockIndex::Listed(ids.clone()), Utc::now());
        backend(&store).put_manifest(&manifest).await.unwrap();

        let resolved = IndexRowResolver::new(backend(&store))
            .resolve(&key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.blocks, ids);
        assert_eq!(resolved.manifest, manifest);
    }

    #[tokio::test]
    async fn index_row_rejects_scanned_manifest() {
        let store = Arc::new(InMemoryRowStore::new());
        let manifest = Manifest::new(
            key(),
            BlockIndex::Scanned { version: Uuid::from_u64_pair(0, 1) },
            Utc::now(),
        );
        backend(&store).put_manifest(&manifest).await.unwrap();

        let err = IndexRowResolver::new(backend(&store))
            .resolve(&key())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::LayoutMismatch { expected: "listed", found: "scanned", .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Range scan
    // -----------------------------------------------------------------------

    async fn seed_version(store: &Arc<InMemoryRowStore>, version: Uuid, count: u64) {
        let backend = backend(store);
        for seq in 1..=count {
            backend
                .put_block(&key(), &BlockId::Sequence { version, seq }, Bytes::from_static(b"."))
                .await
                .unwrap();
        }
        let manifest = Manifest::new(key(), BlockIndex::Scanned { version }, Utc::now());
        backend.put_manifest(&manifest).await.unwrap();
    }

    #[tokio::test]
    async fn range_scan_pages_until_empty() {
        let store = Arc::new(InMemoryRowStore::new());
        let version = Uuid::from_u64_pair(0, 7);
        seed_version(&store, version, 45).await;

        let resolver = RangeScanResolver::new(backend(&store), 20);
        let resolved = resolver.resolve(&key()).await.unwrap().unwrap();
        let seqs: Vec<u64> = resolved.blocks.iter().filter_map(BlockId::seq).collect();
        assert_eq!(seqs, (1..=45).collect::<Vec<_>>());
        // 20 + 20 + 5, then the empty page.
        assert_eq!(store.calls(Operation::ScanBlocks), 4);
    }

    #[tokio::test]
    async fn range_scan_ignores_stale_versions() {
        let store = Arc::new(InMemoryRowStore::new());
        let old = Uuid::from_u64_pair(0, 1);
        let new = Uuid::from_u64_pair(0, 2);
        seed_version(&store, old, 5).await;
        seed_version(&store, new, 2).await;

        let resolved = RangeScanResolver::new(backend(&store), 20)
            .resolve(&key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            resolved.blocks,
            vec![
                BlockId::Sequence { version: new, seq: 1 },
                BlockId::Sequence { version: new, seq: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn range_scan_empty_version_resolves_to_no_blocks() {
        let store = Arc::new(InMemoryRowStore::new());
        seed_version(&store, Uuid::from_u64_pair(0, 3), 0).await;

        let resolved = RangeScanResolver::new(backend(&store), 20)
            .resolve(&key())
            .await
            .unwrap()
            .unwrap();
        assert!(resolved.blocks.is_empty());
    }

    #[tokio::test]
    async fn range_scan_rejects_listed_manifest() {
        let store = Arc::new(InMemoryRowStore::new());
        let manifest = Manifest::new(key(), BlockIndex::Listed(vec![]), Utc::now());
        backend(&store).put_manifest(&manifest).await.unwrap();

        let err = RangeScanResolver::new(backend(&store), 20)
            .resolve(&key())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::LayoutMismatch { expected: "scanned", .. }));
    }

    #[tokio::test]
    async fn range_scan_propagates_backend_errors() {
        let store = Arc::new(InMemoryRowStore::new());
        seed_version(&store, Uuid::from_u64_pair(0, 4), 3).await;
        store.fail_after(Operation::ScanBlocks, 0);

        let err = RangeScanResolver::new(backend(&store), 2)
            .resolve(&key())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Backend(_)));
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let store = Arc::new(InMemoryRowStore::new());
        assert_eq!(RangeScanResolver::new(backend(&store), 0).page_size(), 1);
    }
}
