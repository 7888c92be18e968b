use std::sync::Arc;

use judoc_store::{BackendAdapter, RowStore};
use judoc_types::ObjectKey;
use tokio::io::AsyncRead;

use crate::config::EngineConfig;
use crate::deleter::Deleter;
use crate::error::EngineResult;
use crate::ids::{IdGenerator, TimeOrderedIds};
use crate::reader::BlockReader;
use crate::report::{DeleteReport, WriteReport};
use crate::resolver::{IndexRowResolver, ManifestResolver, RangeScanResolver, Resolved, Strategy};
use crate::writer::BlockWriter;

/// The chunked object engine.
///
/// Wires one backend, one resolution strategy and one id generator into the
/// write, read and delete flows. Requests share nothing but the backend;
/// there is no lock across keys or within one key.
pub struct Engine {
    backend: BackendAdapter,
    resolver: Arc<dyn ManifestResolver>,
    writer: BlockWriter,
    deleter: Deleter,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine that draws UUIDv7 ids.
    pub fn new(store: Arc<dyn RowStore>, config: EngineConfig) -> EngineResult<Self> {
        Self::with_id_generator(store, config, Arc::new(TimeOrderedIds))
    }

    pub fn with_id_generator(
        store: Arc<dyn RowStore>,
        config: EngineConfig,
        ids: Arc<dyn IdGenerator>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let backend = BackendAdapter::new(store, config.backend.clone());
        let resolver: Arc<dyn ManifestResolver> = match config.strategy {
            Strategy::IndexRow => Arc::new(IndexRowResolver::new(backend.clone())),
            Strategy::RangeScan => {
                Arc::new(RangeScanResolver::new(backend.clone(), config.scan_page_size))
            }
        };
        let writer = BlockWriter::new(backend.clone(), resolver.clone(), ids, config.block_size);
        let deleter = Deleter::new(backend.clone(), resolver.clone());

        tracing::debug!(
            strategy = %config.strategy,
            block_size = config.block_size,
            "engine ready"
        );
        Ok(Self {
            backend,
            resolver,
            writer,
            deleter,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategy(&self) -> Strategy {
        self.resolver.strategy()
    }

    /// Replace the content of `key` with everything `input` yields.
    pub async fn write<R>(&self, key: &ObjectKey, input: R) -> EngineResult<WriteReport>
    where
        R: AsyncRead + Unpin + Send,
    {
        tracing::info!(key = %key, "setting object");
        self.writer.write(key, input).await
    }

    /// The current manifest of `key` and its ordered blocks.
    pub async fn resolve(&self, key: &ObjectKey) -> EngineResult<Resolved> {
        self.resolver.resolve_existing(key).await
    }

    /// A lazy reader over the current version of `key`.
    pub async fn read(&self, key: &ObjectKey) -> EngineResult<BlockReader> {
        let resolved = self.resolve(key).await?;
        tracing::info!(key = %key, blocks = resolved.blocks.len(), "getting object");
        Ok(BlockReader::new(
            self.backend.clone(),
            key.clone(),
            resolved.blocks,
        ))
    }

    /// Read the whole object into memory.
    pub async fn read_to_vec(&self, key: &ObjectKey) -> EngineResult<Vec<u8>> {
        self.read(key).await?.read_to_end().await
    }

    pub async fn delete(&self, key: &ObjectKey) -> EngineResult<DeleteReport> {
        tracing::info!(key = %key, "removing object");
        self.deleter.delete(key).await
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}
