//! Strata generation runtime.
//!
//! Turns token sequences into generated tokens on top of an
//! architecture-specific [`ModelBackend`](strata_runtime_abi::ModelBackend):
//! chunked evaluation, a rolling token history for repetition control,
//! top-k/top-p sampling, EOS detection and reset between generations.
//!
//! Determinism: equal seed, history and config give equal samples, except
//! that a backend's floating-point reduction order may depend on the thread
//! count, so logits (and therefore samples) can differ across `threads`.

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod sampling;

pub use config::Config;
pub use engine::{GenerationEngine, Generate, TextStream, resolve_threads};
pub use error::{EngineError, Result};
pub use history::TokenHistory;
pub use sampling::{LogitsView, resolve_seed, sample_top_k_top_p};

pub use strata_runtime_abi as abi;
