//! Scylla / Cassandra backend.
//!
//! Schema (created by [`ScyllaRowStore::ensure_schema`]):
//!
//! ```text
//! CREATE TABLE blocks     (id uuid PRIMARY KEY, part blob);
//! CREATE TABLE blocks_seq (namespace text, key text, version uuid, seq bigint, part blob,
//!                          PRIMARY KEY ((namespace, key, version), seq));
//! CREATE TABLE manifests  (namespace text, key text, blocks frozen<list<uuid>>,
//!                          version uuid, modified_at timestamp,
//!                          PRIMARY KEY ((namespace, key)));
//! ```
//!
//! `BlockId::Unique` rows live in `blocks`, keyed by id alone.
//! `BlockId::Sequence` rows live in `blocks_seq`, clustered by `seq` so the
//! range scan reads them in stream order.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use judoc_types::{BlockId, BlockIndex, Consistency, Manifest, ObjectKey};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::prepared::PreparedStatement;
use scylla::statement::Consistency as CqlConsistency;
use scylla::value::CqlTimestamp;
use uuid::Uuid;

use crate::error::{Operation, StoreError, StoreResult};
use crate::traits::RowStore;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS blocks (id uuid PRIMARY KEY, part blob)",
    "CREATE TABLE IF NOT EXISTS blocks_seq (namespace text, key text, version uuid, seq bigint, \
     part blob, PRIMARY KEY ((namespace, key, version), seq))",
    "CREATE TABLE IF NOT EXISTS manifests (namespace text, key text, blocks frozen<list<uuid>>, \
     version uuid, modified_at timestamp, PRIMARY KEY ((namespace, key)))",
];

/// Connection settings for [`ScyllaRowStore`].
#[derive(Clone, Debug)]
pub struct ScyllaConfig {
    /// Contact points, `host` or `host:port`.
    pub nodes: Vec<String>,
    pub keyspace: String,
    pub connect_timeout: Duration,
    /// Create missing tables on connect.
    pub create_schema: bool,
}

struct Statements {
    put_block: PreparedStatement,
    get_block: PreparedStatement,
    delete_blocks: PreparedStatement,
    put_seq_block: PreparedStatement,
    get_seq_block: PreparedStatement,
    delete_seq_blocks: PreparedStatement,
    scan_seq: PreparedStatement,
    put_manifest: PreparedStatement,
    get_manifest: PreparedStatement,
    delete_manifest: PreparedStatement,
}

/// [`RowStore`] over a Scylla or Cassandra cluster.
pub struct ScyllaRowStore {
    session: Session,
    statements: Statements,
}

impl ScyllaRowStore {
    /// Connect, select the keyspace, optionally create the tables, and
    /// prepare every statement.
    pub async fn connect(config: &ScyllaConfig) -> StoreResult<Self> {
        let session = SessionBuilder::new()
            .known_nodes(&config.nodes)
            .connection_timeout(config.connect_timeout)
            .build()
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        session
            .use_keyspace(config.keyspace.as_str(), false)
            .await
            .map_err(|e| StoreError::Connect(format!("keyspace {}: {e}", config.keyspace)))?;

        if config.create_schema {
            Self::ensure_schema(&session).await?;
        }

        let statements = Statements {
            put_block: prepare(&session, "INSERT INTO blocks (id, part) VALUES (?, ?)").await?,
            get_block: prepare(&session, "SELECT part FROM blocks WHERE id = ?").await?,
            delete_blocks: prepare(&session, "DELETE FROM blocks WHERE id IN ?").await?,
            put_seq_block: prepare(
                &session,
                "INSERT INTO blocks_seq (namespace, key, version, seq, part) VALUES (?, ?, ?, ?, ?)",
            )
            .await?,
            get_seq_block: prepare(
                &session,
                "SELECT part FROM blocks_seq WHERE namespace = ? AND key = ? AND version = ? AND seq = ?",
            )
            .await?,
            delete_seq_blocks: prepare(
                &session,
                "DELETE FROM blocks_seq WHERE namespace = ? AND key = ? AND version = ? AND seq IN ?",
            )
            .await?,
            scan_seq: prepare(
                &session,
                "SELECT seq FROM blocks_seq WHERE namespace = ? AND key = ? AND version = ? \
                 AND seq > ? LIMIT ?",
            )
            .await?,
            put_manifest: prepare(
                &session,
                "INSERT INTO manifests (namespace, key, blocks, version, modified_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .await?,
            get_manifest: prepare(
                &session,
                "SELECT blocks, version, modified_at FROM manifests WHERE namespace = ? AND key = ?",
            )
            .await?,
            delete_manifest: prepare(
                &session,
                "DELETE FROM manifests WHERE namespace = ? AND key = ?",
            )
            .await?,
        };

        tracing::info!(
            nodes = ?config.nodes,
            keyspace = %config.keyspace,
            "connected to cluster"
        );
        Ok(Self { session, statements })
    }

    async fn ensure_schema(session: &Session) -> StoreResult<()> {
        for ddl in SCHEMA {
            session
                .query_unpaged(ddl, ())
                .await
                .map_err(|e| StoreError::Connect(format!("schema: {e}")))?;
        }
        Ok(())
    }
}

async fn prepare(session: &Session, cql: &str) -> StoreResult<PreparedStatement> {
    session
        .prepare(cql)
        .await
        .map_err(|e| StoreError::Connect(format!("prepare `{cql}`: {e}")))
}

fn with_consistency(statement: &PreparedStatement, consistency: Consistency) -> PreparedStatement {
    let mut statement = statement.clone();
    statement.set_consistency(match consistency {
        Consistency::Any => CqlConsistency::Any,
        Consistency::One => CqlConsistency::One,
        Consistency::Two => CqlConsistency::Two,
        Consistency::Three => CqlConsistency::Three,
        Consistency::Quorum => CqlConsistency::Quorum,
        Consistency::All => CqlConsistency::All,
        Consistency::LocalQuorum => CqlConsistency::LocalQuorum,
        Consistency::EachQuorum => CqlConsistency::EachQuorum,
        Consistency::LocalOne => CqlConsistency::LocalOne,
    });
    statement
}

fn seq_to_cql(op: Operation, key: &ObjectKey, seq: u64) -> StoreResult<i64> {
    i64::try_from(seq).map_err(|_| StoreError::Unsupported {
        op,
        target: key.to_string(),
        reason: format!("sequence {seq} exceeds bigint"),
    })
}

#[async_trait]
impl RowStore for ScyllaRowStore {
    async fn put_block(
        &self,
        key: &ObjectKey,
        id: &BlockId,
        payload: Bytes,
        consistency: Consistency,
    ) -> StoreResult<()> {
        let op = Operation::PutBlock;
        let fail = |e: scylla::errors::ExecutionError| StoreError::backend(op, format!("{key}/{id}"), e);
        match *id {
            BlockId::Unique(uuid) => {
                let stmt = with_consistency(&self.statements.put_block, consistency);
                self.session
                    .execute_unpaged(&stmt, (uuid, payload.to_vec()))
                    .await
                    .map_err(fail)?;
            }
            BlockId::Sequence { version, seq } => {
                let seq = seq_to_cql(op, key, seq)?;
                let stmt = with_consistency(&self.statements.put_seq_block, consistency);
                self.session
                    .execute_unpaged(
                        &stmt,
                        (key.namespace(), key.key(), version, seq, payload.to_vec()),
                    )
                    .await
                    .map_err(fail)?;
            }
        }
        Ok(())
    }

    async fn get_block(
        &self,
        key: &ObjectKey,
        id: &BlockId,
        consistency: Consistency,
    ) -> StoreResult<Option<Bytes>> {
        let op = Operation::GetBlock;
        let target = || format!("{key}/{id}");
        let result = match *id {
            BlockId::Unique(uuid) => {
                let stmt = with_consistency(&self.statements.get_block, consistency);
                self.session.execute_unpaged(&stmt, (uuid,)).await
            }
            BlockId::Sequence { version, seq } => {
                let seq = seq_to_cql(op, key, seq)?;
                let stmt = with_consistency(&self.statements.get_seq_block, consistency);
                self.session
                    .execute_unpaged(&stmt, (key.namespace(), key.key(), version, seq))
                    .await
            }
        }
        .map_err(|e| StoreError::backend(op, target(), e))?;

        let rows = result
            .into_rows_result()
            .map_err(|e| StoreError::malformed(op, target(), e))?;
        let row = rows
            .maybe_first_row::<(Vec<u8>,)>()
            .map_err(|e| StoreError::malformed(op, target(), e))?;
        Ok(row.map(|(part,)| Bytes::from(part)))
    }

    async fn delete_blocks(
        &self,
        key: &ObjectKey,
        ids: &[BlockId],
        consistency: Consistency,
    ) -> StoreResult<()> {
        let op = Operation::DeleteBlocks;
        let mut unique = Vec::new();
        let mut sequenced: Vec<(Uuid, Vec<i64>)> = Vec::new();
        for id in ids {
            match *id {
                BlockId::Unique(uuid) => unique.push(uuid),
                BlockId::Sequence { version, seq } => {
                    let seq = seq_to_cql(op, key, seq)?;
                    match sequenced.iter_mut().find(|(v, _)| *v == version) {
                        Some((_, seqs)) => seqs.push(seq),
                        None => sequenced.push((version, vec![seq])),
                    }
                }
            }
        }

        if !unique.is_empty() {
            let stmt = with_consistency(&self.statements.delete_blocks, consistency);
            self.session
                .execute_unpaged(&stmt, (unique,))
                .await
                .map_err(|e| StoreError::backend(op, key, e))?;
        }
        for (version, seqs) in sequenced {
            let stmt = with_consistency(&self.statements.delete_seq_blocks, consistency);
            self.session
                .execute_unpaged(&stmt, (key.namespace(), key.key(), version, seqs))
                .await
                .map_err(|e| StoreError::backend(op, format!("{key}@{version}"), e))?;
        }
        Ok(())
    }

    async fn put_manifest(&self, manifest: &Manifest, consistency: Consistency) -> StoreResult<()> {
        let op = Operation::PutManifest;
        let key = &manifest.key;
        let (blocks, version) = match &manifest.index {
            BlockIndex::Listed(ids) => {
                let uuids = ids
                    .iter()
                    .map(|id| match id {
                        BlockId::Unique(uuid) => Ok(*uuid),
                        other => Err(StoreError::Unsupported {
                            op,
                            target: key.to_string(),
                            reason: format!("listed manifests hold unique ids only, got {other}"),
                        }),
                    })
                    .collect::<StoreResult<Vec<Uuid>>>()?;
                (Some(uuids), None)
            }
            BlockIndex::Scanned { version } => (None, Some(*version)),
        };
        let modified_at = CqlTimestamp(manifest.modified_at.timestamp_millis());

        let stmt = with_consistency(&self.statements.put_manifest, consistency);
        self.session
            .execute_unpaged(
                &stmt,
                (key.namespace(), key.key(), blocks, version, modified_at),
            )
            .await
            .map_err(|e| StoreError::backend(op, key, e))?;
        Ok(())
    }

    async fn get_manifest(
        &self,
        key: &ObjectKey,
        consistency: Consistency,
    ) -> StoreResult<Option<Manifest>> {
        let op = Operation::GetManifest;
        let stmt = with_consistency(&self.statements.get_manifest, consistency);
        let result = self
            .session
            .execute_unpaged(&stmt, (key.namespace(), key.key()))
            .await
            .map_err(|e| StoreError::backend(op, key, e))?;
        let rows = result
            .into_rows_result()
            .map_err(|e| StoreError::malformed(op, key, e))?;
        let row = rows
            .maybe_first_row::<(Option<Vec<Uuid>>, Option<Uuid>, Option<CqlTimestamp>)>()
            .map_err(|e| StoreError::malformed(op, key, e))?;

        Ok(row.map(|(blocks, version, modified_at)| {
            // An empty frozen list may come back as null.
            let index = match version {
                Some(version) => BlockIndex::Scanned { version },
                None => BlockIndex::Listed(
                    blocks
                        .unwrap_or_default()
                        .into_iter()
                        .map(BlockId::Unique)
                        .collect(),
                ),
            };
            let modified_at = modified_at
                .and_then(|ts| DateTime::<Utc>::from_timestamp_millis(ts.0))
                .unwrap_or_default();
            Manifest::new(key.clone(), index, modified_at)
        }))
    }

    async fn delete_manifest(&self, key: &ObjectKey, consistency: Consistency) -> StoreResult<()> {
        let stmt = with_consistency(&self.statements.delete_manifest, consistency);
        self.session
            .execute_unpaged(&stmt, (key.namespace(), key.key()))
            .await
            .map_err(|e| StoreError::backend(Operation::DeleteManifest, key, e))?;
        Ok(())
    }

    async fn scan_block_ids(
        &self,
        key: &ObjectKey,
        version: Uuid,
        after: u64,
        limit: usize,
        consistency: Consistency,
    ) -> StoreResult<Vec<u64>> {
        let op = Operation::ScanBlocks;
        let target = || format!("{key}@{version}");
        let Ok(after) = i64::try_from(after) else {
            return Ok(Vec::new());
        };
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);

        let stmt = with_consistency(&self.statements.scan_seq, consistency);
        let result = self
            .session
            .execute_unpaged(&stmt, (key.namespace(), key.key(), version, after, limit))
            .await
            .map_err(|e| StoreError::backend(op, target(), e))?;
        let rows = result
            .into_rows_result()
            .map_err(|e| StoreError::malformed(op, target(), e))?;
        let seqs = rows
            .rows::<(i64,)>()
            .map_err(|e| StoreError::malformed(op, target(), e))?
            .map(|row| {
                let (seq,) = row.map_err(|e| StoreError::malformed(op, target(), e))?;
                u64::try_from(seq)
                    .map_err(|_| StoreError::malformed(op, target(), format!("negative seq {seq}")))
            })
            .collect::<StoreResult<Vec<u64>>>()?;
        Ok(seqs)
    }
}
