use thiserror::Error;

use crate::storage::StoreError;

/// Typed outcome for every engine operation. Denial, missing rows, and
/// uniqueness conflicts are ordinary results the caller branches on; only
/// `StorageFailure` signals that the collaborator itself misbehaved.
#[derive(Error, Debug)]
pub enum FlagError {
    /// Authorization refused. The reason is a short human-readable string,
    /// safe to surface verbatim.
    #[error("not authorized: {0}")]
    Denied(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("key already in use in this scope: {0}")]
    DuplicateKey(String),

    #[error("invalid input: {0}")]
    ValidationFailed(String),

    /// Collaborator I/O failure. Not retried here; retry policy belongs to
    /// the storage layer.
    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl FlagError {
    /// Short code for canonical logging. One match so codes and variants
    /// cannot drift apart.
    pub fn error_code(&self) -> &'static str {
        match self {
            FlagError::Denied(_) => "denied",
            FlagError::NotFound(_) => "not_found",
            FlagError::DuplicateKey(_) => "duplicate_key",
            FlagError::ValidationFailed(_) => "validation_failed",
            FlagError::StorageFailure(_) => "storage_failure",
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, FlagError::Denied(_))
    }

    /// True for failures of the storage collaborator rather than of the
    /// request itself.
    pub fn is_storage(&self) -> bool {
        matches!(self, FlagError::StorageFailure(_))
    }
}
