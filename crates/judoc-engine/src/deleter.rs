use std::sync::Arc;

use judoc_store::BackendAdapter;
use judoc_types::ObjectKey;

use crate::error::EngineResult;
use crate::report::{Cleanup, DeleteReport};
use crate::resolver::ManifestResolver;

/// Removes an object: manifest row first, then its block rows.
///
/// Once the manifest is gone the object is unreachable, so a failed block
/// delete only leaves orphans behind.
#[derive(Clone)]
pub struct Deleter {
    backend: BackendAdapter,
    resolver: Arc<dyn ManifestResolver>,
}

impl Deleter {
    pub fn new(backend: BackendAdapter, resolver: Arc<dyn ManifestResolver>) -> Self {
        Self { backend, resolver }
    }

    pub async fn delete(&self, key: &ObjectKey) -> EngineResult<DeleteReport> {
        let resolved = self.resolver.resolve_existing(key).await?;
        self.backend.delete_manifest(key).await?;

        let blocks = resolved.blocks.len();
        let cleanup = match self.backend.delete_blocks(key, &resolved.blocks).await {
            Ok(()) => Cleanup::Complete,
            Err(error) => {
                tracing::warn!(
                    key = %key,
                    blocks,
                    error = %error,
                    "manifest removed but block cleanup failed; left as orphans"
                );
                Cleanup::Orphaned { blocks, error }
            }
        };
        tracing::info!(key = %key, blocks, "removed object");
        Ok(DeleteReport {
            key: key.clone(),
            blocks,
            cleanup,
        })
    }
}

impl std::fmt::Debug for Deleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deleter")
            .field("strategy", &self.resolver.strategy())
            .finish_non_exhaustive()
    }
}
