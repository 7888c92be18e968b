use judoc_store::StoreError;
use judoc_types::{BlockId, ObjectKey};
use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// Only fatal failures are errors. Cleanup that fails after the primary
/// operation already succeeded is reported through
/// [`Cleanup`](crate::report::Cleanup) instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("object not found: {0}")]
    NotFound(ObjectKey),

    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    #[error("failed reading input for {key}: {source}")]
    Stream {
        key: ObjectKey,
        #[source]
        source: std::io::Error,
    },

    /// The write failed and removing its partially written blocks failed too.
    #[error("{cause}; rollback of {orphans} blocks also failed: {rollback}")]
    Rollback {
        cause: Box<EngineError>,
        orphans: usize,
        rollback: StoreError,
    },

    #[error("block {block} of {key} is missing from the backend")]
    MissingBlock { key: ObjectKey, block: BlockId },

    #[error("manifest of {key} is {found}, expected {expected}")]
    LayoutMismatch {
        key: ObjectKey,
        expected: &'static str,
        found: &'static str,
    },

    #[error("stream already terminated by an earlier error")]
    Terminated,

    #[error("invalid engine configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The error that started the failure, looking through rollback reports.
    pub fn root_cause(&self) -> &EngineError {
        match self {
            Self::Rollback { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use judoc_store::Operation;

    fn key() -> ObjectKey {
        ObjectKey::new("ns", "k").unwrap()
    }

    #[test]
    fn rollback_reports_cause_first() {
        let cause = EngineError::Backend(StoreError::backend(Operation::PutBlock, "ns:k/1", "reset"));
        let err = EngineError::Rollback {
            cause: Box::new(cause),
            orphans: 3,
            rollback: StoreError::backend(Operation::DeleteBlocks, "ns:k (3 blocks)", "reset"),
        };
        let text = err.to_string();
        assert!(text.starts_with("backend error: put-block failed"));
        assert!(text.contains("rollback of 3 blocks also failed"));
        assert!(matches!(err.root_cause(), EngineError::Backend(_)));
    }

    #[test]
    fn not_found_classification() {
        assert!(EngineError::NotFound(key()).is_not_found());
        assert!(!EngineError::Terminated.is_not_found());
        assert_eq!(EngineError::NotFound(key()).to_string(), "object not found: ns:k");
    }

    #[test]
    fn stream_error_keeps_source() {
        let err = EngineError::Stream {
            key: key(),
            source: std::io::Error::other("pipe closed"),
        };
        assert_eq!(err.to_string(), "failed reading input for ns:k: pipe closed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
