use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use judoc_types::{BlockId, Consistency, Manifest, ObjectKey};
use uuid::Uuid;

use crate::error::{Operation, StoreError, StoreResult};
use crate::traits::RowStore;

#[derive(Clone, Copy, Debug)]
enum Fault {
    /// Let `remaining` more calls through, then fail every call.
    FailAfter { remaining: usize },
    /// Delay every call.
    Stall(Duration),
    /// Apply the write, then delay the acknowledgement.
    AckLate(Duration),
}

/// In-memory, `BTreeMap`-based row store.
///
/// Intended for tests, embedding and single-node development servers. Rows
/// live behind `RwLock`s and are lost when the store is dropped. Every
/// operation is counted, and faults can be injected per operation so callers
/// can exercise their failure paths.
pub struct InMemoryRowStore {
    blocks: RwLock<BTreeMap<(ObjectKey, BlockId), Bytes>>,
    manifests: RwLock<HashMap<ObjectKey, Manifest>>,
    calls: Mutex<BTreeMap<Operation, usize>>,
    faults: Mutex<HashMap<Operation, Fault>>,
}

impl InMemoryRowStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(BTreeMap::new()),
            manifests: RwLock::new(HashMap::new()),
            calls: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Number of block rows currently stored.
    pub fn block_count(&self) -> usize {
        self.blocks.read().expect("lock poisoned").len()
    }

    /// Number of manifest rows currently stored.
    pub fn manifest_count(&self) -> usize {
        self.manifests.read().expect("lock poisoned").len()
    }

    /// Total payload bytes across all block rows.
    pub fn total_bytes(&self) -> u64 {
        self.blocks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|payload| payload.len() as u64)
            .sum()
    }

    /// Returns `true` if the block row exists.
    pub fn has_block(&self, key: &ObjectKey, id: &BlockId) -> bool {
        self.blocks
            .read()
            .expect("lock poisoned")
            .contains_key(&(key.clone(), *id))
    }

    /// All block ids stored for `key`, in id order.
    pub fn block_ids(&self, key: &ObjectKey) -> Vec<BlockId> {
        self.blocks
            .read()
            .expect("lock poisoned")
            .keys()
            .filter(|(owner, _)| owner == key)
            .map(|(_, id)| *id)
            .collect()
    }

    /// How many times `op` has been invoked.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls
            .lock()
            .expect("lock poisoned")
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Let the next `successes` calls of `op` succeed, then fail all later ones.
    pub fn fail_after(&self, op: Operation, successes: usize) {
        self.faults
            .lock()
            .expect("lock poisoned")
            .insert(op, Fault::FailAfter { remaining: successes });
    }

    /// Delay every call of `op` by `delay`.
    pub fn stall(&self, op: Operation, delay: Duration) {
        self.faults
            .lock()
            .expect("lock poisoned")
            .insert(op, Fault::Stall(delay));
    }

    /// Apply every call of `op`, then hold back its result for `delay`.
    pub fn ack_late(&self, op: Operation, delay: Duration) {
        self.faults
            .lock()
            .expect("lock poisoned")
            .insert(op, Fault::AckLate(delay));
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.faults.lock().expect("lock poisoned").clear();
    }

    async fn enter(&self, op: Operation, target: impl std::fmt::Display + Send) -> StoreResult<()> {
        *self
            .calls
            .lock()
            .expect("lock poisoned")
            .entry(op)
            .or_insert(0) += 1;

        let stall = {
            let mut faults = self.faults.lock().expect("lock poisoned");
            match faults.get_mut(&op) {
                None | Some(Fault::AckLate(_)) => None,
                Some(Fault::Stall(delay)) => Some(*delay),
                Some(Fault::FailAfter { remaining: 0 }) => {
                    return Err(StoreError::backend(op, target, "injected failure"));
                }
                Some(Fault::FailAfter { remaining }) => {
                    *remaining -= 1;
                    None
                }
            }
        };
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn acknowledge(&self, op: Operation) {
        let delay = match self.faults.lock().expect("lock poisoned").get(&op) {
            Some(Fault::AckLate(delay)) => Some(*delay),
            _ => None,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for InMemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RowStore for InMemoryRowStore {
    async fn put_block(
        &self,
        key: &ObjectKey,
        id: &BlockId,
        payload: Bytes,
        _consistency: Consistency,
    ) -> StoreResult<()> {
        self.enter(Operation::PutBlock, format!("{key}/{id}")).await?;
        self.blocks
            .write()
            .expect("lock poisoned")
            .insert((key.clone(), *id), payload);
        self.acknowledge(Operation::PutBlock).await;
        Ok(())
    }

    async fn get_block(
        &self,
        key: &ObjectKey,
        id: &BlockId,
        _consistency: Consistency,
    ) -> StoreResult<Option<Bytes>> {
        self.enter(Operation::GetBlock, format!("{key}/{id}")).await?;
        let blocks = self.blocks.read().expect("lock poisoned");
        Ok(blocks.get(&(key.clone(), *id)).cloned())
    }

    async fn delete_blocks(
        &self,
        key: &ObjectKey,
        ids: &[BlockId],
        _consistency: Consistency,
    ) -> StoreResult<()> {
        self.enter(Operation::DeleteBlocks, format!("{key} ({} blocks)", ids.len()))
            .await?;
        {
            let mut blocks = self.blocks.write().expect("lock poisoned");
            for id in ids {
                blocks.remove(&(key.clone(), *id));
            }
        }
        self.acknowledge(Operation::DeleteBlocks).await;
        Ok(())
    }

    async fn put_manifest(&self, manifest: &Manifest, _consistency: Consistency) -> StoreResult<()> {
        self.enter(Operation::PutManifest, &manifest.key).await?;
        self.manifests
            .write()
            .expect("lock poisoned")
            .insert(manifest.key.clone(), manifest.clone());
        self.acknowledge(Operation::PutManifest).await;
        Ok(())
    }

    async fn get_manifest(
        &self,
        key: &ObjectKey,
        _consistency: Consistency,
    ) -> StoreResult<Option<Manifest>> {
        self.enter(Operation::GetManifest, key).await?;
        Ok(self.manifests.read().expect("lock poisoned").get(key).cloned())
    }

    async fn delete_manifest(
        &self,
        key: &ObjectKey,
        _consistency: Consistency,
    ) -> StoreResult<()> {
        self.enter(Operation::DeleteManifest, key).await?;
        self.manifests.write().expect("lock poisoned").remove(key);
        self.acknowledge(Operation::DeleteManifest).await;
        Ok(())
    }

    async fn scan_block_ids(
        &self,
        key: &ObjectKey,
        version: Uuid,
        after: u64,
        limit: usize,
        _consistency: Consistency,
    ) -> StoreResult<Vec<u64>> {
        self.enter(Operation::ScanBlocks, format!("{key}@{version}")).await?;
        let Some(first) = after.checked_add(1) else {
            return Ok(Vec::new());
        };
        let from = (key.clone(), BlockId::Sequence { version, seq: first });
        let to = (key.clone(), BlockId::Sequence { version, seq: u64::MAX });
        let blocks = self.blocks.read().expect("lock poisoned");
        Ok(blocks
            .range(from..=to)
            .filter_map(|((_, id), _)| id.seq())
            .take(limit)
            .collect())
    }
}

impl std::fmt::Debug for InMemoryRowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRowStore")
            .field("block_count", &self.block_count())
            .field("manifest_count", &self.manifest_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use judoc_types::BlockIndex;
    use std::sync::Arc;

    const C: Consistency = Consistency::One;

    fn key(k: &str) -> ObjectKey {
        ObjectKey::new("ns", k).unwrap()
    }

    fn seq(version: Uuid, seq: u64) -> BlockId {
        BlockId::Sequence { version, seq }
    }

    // -----------------------------------------------------------------------
    // Block rows
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_and_get_block() {
        let store = InMemoryRowStore::new();
        let id = BlockId::Unique(Uuid::now_v7());
        store.put_block(&key("a"), &id, Bytes::from_static(b"abcd"), C).await.unwrap();

        let payload = store.get_block(&key("a"), &id, C).await.unwrap();
        assert_eq!(payload.as_deref(), Some(&b"abcd"[..]));
        assert_eq!(store.total_bytes(), 4);
    }

    #[tokio::test]
    async fn get_missing_block_is_none() {
        let store = InMemoryRowStore::new();
        let id = BlockId::Unique(Uuid::now_v7());
        assert!(store.get_block(&key("a"), &id, C).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blocks_are_scoped_by_owner() {
        let store = InMemoryRowStore::new();
        let v = Uuid::from_u64_pair(0, 1);
        store.put_block(&key("a"), &seq(v, 1), Bytes::from_static(b"a"), C).await.unwrap();
        assert!(store.get_block(&key("b"), &seq(v, 1), C).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_blocks_ignores_missing() {
        let store = InMemoryRowStore::new();
        let present = BlockId::Unique(Uuid::from_u64_pair(0, 1));
        let missing = BlockId::Unique(Uuid::from_u64_pair(0, 2));
        store.put_block(&key("a"), &present, Bytes::from_static(b"x"), C).await.unwrap();

        store.delete_blocks(&key("a"), &[present, missing], C).await.unwrap();
        assert_eq!(store.block_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Manifest rows
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn manifest_replaced_wholesale() {
        let store = InMemoryRowStore::new();
        let first = Manifest::new(
            key("m"),
            BlockIndex::Listed(vec![BlockId::Unique(Uuid::from_u64_pair(0, 1))]),
            Utc::now(),
        );
        let second = Manifest::new(key("m"), BlockIndex::Listed(vec![]), Utc::now());
        store.put_manifest(&first, C).await.unwrap();
        store.put_manifest(&second, C).await.unwrap();

        let read = store.get_manifest(&key("m"), C).await.unwrap().unwrap();
        assert_eq!(read, second);
        assert_eq!(store.manifest_count(), 1);
    }

    #[tokio::test]
    async fn delete_manifest_is_idempotent() {
        let store = InMemoryRowStore::new();
        let m = Manifest::new(key("m"), BlockIndex::Listed(vec![]), Utc::now());
        store.put_manifest(&m, C).await.unwrap();

        store.delete_manifest(&key("m"), C).await.unwrap();
        store.delete_manifest(&key("m"), C).await.unwrap();
        assert!(store.get_manifest(&key("m"), C).await.unwrap().is_none());
        assert_eq!(store.manifest_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Range scan
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn scan_pages_ascending() {
        let store = InMemoryRowStore::new();
        let v = Uuid::from_u64_pair(0, 5);
        for s in [3, 1, 2, 5, 4] {
            store.put_block(&key("s"), &seq(v, s), Bytes::from_static(b"."), C).await.unwrap();
        }

        assert_eq!(store.scan_block_ids(&key("s"), v, 0, 2, C).await.unwrap(), vec![1, 2]);
        assert_eq!(store.scan_block_ids(&key("s"), v, 2, 2, C).await.unwrap(), vec![3, 4]);
        assert_eq!(store.scan_block_ids(&key("s"), v, 4, 2, C).await.unwrap(), vec![5]);
        assert!(store.scan_block_ids(&key("s"), v, 5, 2, C).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_ignores_other_versions_and_keys() {
        let store = InMemoryRowStore::new();
        let v1 = Uuid::from_u64_pair(0, 1);
        let v2 = Uuid::from_u64_pair(0, 2);
        store.put_block(&key("s"), &seq(v1, 1), Bytes::from_static(b"."), C).await.unwrap();
        store.put_block(&key("s"), &seq(v2, 1), Bytes::from_static(b"."), C).await.unwrap();
        store.put_block(&key("t"), &seq(v1, 2), Bytes::from_static(b"."), C).await.unwrap();
        store
            .put_block(&key("s"), &BlockId::Unique(v1), Bytes::from_static(b"."), C)
            .await
            .unwrap();

        assert_eq!(store.scan_block_ids(&key("s"), v1, 0, 20, C).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn scan_past_max_is_empty() {
        let store = InMemoryRowStore::new();
        let v = Uuid::from_u64_pair(0, 1);
        assert!(store.scan_block_ids(&key("s"), v, u64::MAX, 20, C).await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Fault injection and counters
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn fail_after_lets_n_calls_through() {
        let store = InMemoryRowStore::new();
        store.fail_after(Operation::PutBlock, 2);
        let k = key("f");
        for n in 0..2u128 {
            let id = BlockId::Unique(Uuid::from_u128(n));
            store.put_block(&k, &id, Bytes::from_static(b"."), C).await.unwrap();
        }
        let err = store
            .put_block(&k, &BlockId::Unique(Uuid::from_u128(9)), Bytes::from_static(b"."), C)
            .await
            .unwrap_err();
        assert_eq!(err.operation(), Some(Operation::PutBlock));
        assert_eq!(store.block_count(), 2);
        assert_eq!(store.calls(Operation::PutBlock), 3);

        store.clear_faults();
        store
            .put_block(&k, &BlockId::Unique(Uuid::from_u128(9)), Bytes::from_static(b"."), C)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stall_delays_calls() {
        let store = InMemoryRowStore::new();
        store.stall(Operation::GetManifest, Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        store.get_manifest(&key("x"), C).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn late_ack_applies_before_returning() {
        let store = Arc::new(InMemoryRowStore::new());
        store.ack_late(Operation::PutManifest, Duration::from_secs(5));
        let manifest = Manifest::new(key("late"), BlockIndex::Listed(vec![]), Utc::now());

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.put_manifest(&manifest, C).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.manifest_count(), 1);
        assert!(!pending.is_finished());

        tokio::time::sleep(Duration::from_secs(5)).await;
        pending.await.unwrap().unwrap();
    }

    #[test]
    fn debug_format() {
        let store = InMemoryRowStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryRowStore"));
        assert!(debug.contains("block_count"));
    }
}
