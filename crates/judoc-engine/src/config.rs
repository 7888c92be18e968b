use judoc_store::BackendOptions;

use crate::error::{EngineError, EngineResult};
use crate::resolver::Strategy;

/// Default block size: 4 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Default number of block ids fetched per range-scan round trip.
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 20;

/// Configuration for the chunked object engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Size of every block except possibly the last one of an object.
    pub block_size: usize,
    /// Manifest-resolution strategy, fixed for the lifetime of the engine.
    pub strategy: Strategy,
    /// Page size of the range-scan resolver.
    pub scan_page_size: usize,
    /// Consistency, timeout and batching of backend calls.
    pub backend: BackendOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            strategy: Strategy::IndexRow,
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
            backend: BackendOptions::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.block_size == 0 {
            return Err(EngineError::Config("block size must be positive".into()));
        }
        if self.scan_page_size == 0 {
            return Err(EngineError::Config("scan page size must be positive".into()));
        }
        if self.backend.timeout.is_zero() {
            return Err(EngineError::Config("backend timeout must be positive".into()));
        }
        if self.backend.delete_batch == 0 {
            return Err(EngineError::Config("delete batch size must be positive".into()));
        }
        Ok(())
    }
}
