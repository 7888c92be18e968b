use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("object key must not be empty")]
    EmptyKey,

    #[error("unknown consistency level: {0}")]
    UnknownConsistency(String),
}
