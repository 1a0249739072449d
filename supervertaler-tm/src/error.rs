//! Error types for translation memory, termbase and TMX storage.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TmError>;

/// Domain error type for `supervertaler-tm`.
///
/// Variants map onto the error kinds spec §7 names (`InvalidInput`,
/// `StorageUnavailable`, `ConstraintConflict`, plus `NotFound` for lookup
/// misses that `supervertaler-core` turns into `MissingResource`).
#[derive(Error, Debug)]
pub enum TmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("constraint conflict: {0}")]
    ConstraintConflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("xml error: {0}")]
    Xml(String),
}

impl TmError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput(_) => ErrorCategory::Validation,
            Self::StorageUnavailable(_) | Self::Sqlite(_) => ErrorCategory::Storage,
            Self::ConstraintConflict(_) => ErrorCategory::Conflict,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Serialization(_) | Self::Xml(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Per spec §7: storage-layer failures degrade gracefully rather than
    /// aborting the whole run, everything else does not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Sqlite(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Storage,
    Conflict,
    NotFound,
    Serialization,
    Io,
}
