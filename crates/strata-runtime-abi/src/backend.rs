use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model_type::ModelType;
use crate::token::Token;
use crate::vocab::Vocabulary;

/// What a backend hands back after parsing a model file.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub vocab: Vocabulary,
    /// n_ctx from the model hyperparameters.
    pub context_length: usize,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to load '{path}': {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("evaluation failed: {0}")]
    Eval(String),

    #[error("context overflow: n_past {n_past} + {n_tokens} tokens exceeds n_ctx {n_ctx}")]
    ContextOverflow {
        n_past: usize,
        n_tokens: usize,
        n_ctx: usize,
    },

    #[error("model type '{0}' is not supported by this backend")]
    Unsupported(ModelType),
}

impl BackendError {
    pub fn load<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        BackendError::Load {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Architecture-specific forward pass behind the generation runtime.
///
/// One implementing struct per architecture. Implementations own their
/// weights and scratch buffers and must release every native resource in
/// `Drop`.
pub trait ModelBackend {
    /// Architecture this backend implements.
    fn model_type(&self) -> ModelType;

    /// Parse the model file, keeping weights inside the backend.
    fn load(&mut self, path: &Path) -> Result<LoadedModel, BackendError>;

    /// Run the forward pass for `tokens`, treating the first `n_past`
    /// positions of the backend's cache as already evaluated.
    ///
    /// On success `logits` holds at least one vocab-sized row; the last row
    /// is the distribution for the position after `tokens`. Scratch memory
    /// may be kept and reused across calls. `threads` only sets the kernel's
    /// internal parallelism; reduction order may change with it, so logits
    /// are not guaranteed bit-identical across thread counts.
    fn eval(
        &mut self,
        tokens: &[Token],
        threads: usize,
        n_past: usize,
        logits: &mut Vec<f32>,
    ) -> Result<(), BackendError>;
}

/// Maps a model type to a concrete backend. Consulted once per load.
pub trait BackendProvider {
    type Backend: ModelBackend;

    fn create(&self, model_type: ModelType) -> Result<Self::Backend, BackendError>;
}
