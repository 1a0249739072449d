//! Error type for the document/segmentation/orchestration pipeline.
//!
//! Grounded on `tradocflow-core`'s `TradocumentError` for its flat,
//! many-variant `thiserror` shape; mapped 1:1 onto spec §7's error kinds
//! (`InvalidInput`, `StorageUnavailable`, `CodecFailure`, `LLMCallFailure`,
//! `MissingResource`, `ConstraintConflict`).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("this file does not contain word/document.xml; is it a valid .docx?")]
    InvalidDocx,

    #[error("corrupt XML: {0}")]
    CorruptXml(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("codec failure: {0}")]
    CodecFailure(String),

    #[error("LLM call failure: {0}")]
    LLMCallFailure(String),

    #[error("missing resource: {0}")]
    MissingResource(String),

    #[error("constraint conflict: {0}")]
    ConstraintConflict(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Tm(#[from] supervertaler_tm::TmError),
}

impl CoreError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::InvalidDocx | Self::CorruptXml(_) => "CodecFailure",
            Self::IoError(_) => "IoError",
            Self::Zip(_) => "CodecFailure",
            Self::CodecFailure(_) => "CodecFailure",
            Self::LLMCallFailure(_) => "LLMCallFailure",
            Self::MissingResource(_) => "MissingResource",
            Self::ConstraintConflict(_) => "ConstraintConflict",
            Self::InvalidOperation(_) => "InvalidOperation",
            Self::Tm(e) => match e.category() {
                supervertaler_tm::ErrorCategory::Storage => "StorageUnavailable",
                supervertaler_tm::ErrorCategory::Conflict => "ConstraintConflict",
                supervertaler_tm::ErrorCategory::NotFound => "MissingResource",
                _ => "InvalidInput",
            },
        }
    }

    /// Per spec §7: storage and per-chunk LLM failures degrade gracefully;
    /// everything else aborts the enclosing operation.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::LLMCallFailure(_) | Self::MissingResource(_) => true,
            Self::Tm(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
