use thiserror::Error;

/// Failures of the indexing and retrieval core.
#[derive(Debug, Error)]
pub enum RagError {
    /// Vector counts or widths disagree with the index or its chunk sequence.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A query arrived before any successful build or load.
    #[error("index not ready: ingest documents first")]
    IndexNotReady,

    /// The persisted vectors and chunks do not belong together.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// A chunk record was rejected at the ingestion boundary.
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;
