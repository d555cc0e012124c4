use strata_runtime_abi::{BackendError, ParseModelTypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already initialized")]
    AlreadyInitialized,

    #[error("engine is not initialized")]
    NotInitialized,

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("backend produced {len} logits, fewer than the vocabulary size {vocab_size}")]
    LogitsShape { len: usize, vocab_size: usize },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("{0}")]
    ModelType(#[from] ParseModelTypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
