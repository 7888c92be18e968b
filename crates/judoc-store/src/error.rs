use std::fmt;
use std::time::Duration;

/// A backend operation, used to give every error its context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    PutBlock,
    GetBlock,
    DeleteBlocks,
    PutManifest,
    GetManifest,
    DeleteManifest,
    ScanBlocks,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PutBlock => "put-block",
            Self::GetBlock => "get-block",
            Self::DeleteBlocks => "delete-blocks",
            Self::PutManifest => "put-manifest",
            Self::GetManifest => "get-manifest",
            Self::DeleteManifest => "delete-manifest",
            Self::ScanBlocks => "scan-blocks",
        };
        f.write_str(name)
    }
}

/// Errors from backend operations.
///
/// A missing row is not an error: lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("{op} failed for {target}: {reason}")]
    Backend {
        op: Operation,
        target: String,
        reason: String,
    },

    /// The operation did not complete within the configured timeout.
    #[error("{op} timed out after {after:?} for {target}")]
    Timeout {
        op: Operation,
        target: String,
        after: Duration,
    },

    /// A row came back in a shape the adapter cannot interpret.
    #[error("malformed {op} response for {target}: {reason}")]
    Malformed {
        op: Operation,
        target: String,
        reason: String,
    },

    /// The backend cannot represent the requested row.
    #[error("{op} unsupported for {target}: {reason}")]
    Unsupported {
        op: Operation,
        target: String,
        reason: String,
    },

    /// Failure establishing the backend session.
    #[error("backend connection failed: {0}")]
    Connect(String),
}

impl StoreError {
    pub fn backend(op: Operation, target: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Backend {
            op,
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(op: Operation, target: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Malformed {
            op,
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The operation this error came from, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Backend { op, .. }
            | Self::Timeout { op, .. }
            | Self::Malformed { op, .. }
            | Self::Unsupported { op, .. } => Some(*op),
            Self::Connect(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
