use super::GenerationEngine;
use super::utils::resolve_threads;
use crate::error::{EngineError, Result};
use strata_runtime_abi::{ModelBackend, Token};

impl<B: ModelBackend> GenerationEngine<B> {
    /// Evaluate `tokens` in order, in chunks of at most `batch_size`.
    ///
    /// Each successful chunk is appended to the token history before the
    /// next one runs. The first failing chunk aborts the call; chunks that
    /// already succeeded are not rolled back, so callers should `reset`
    /// before retrying. `threads < 0` picks `min(cpus, 4)`.
    pub fn batch_eval(&mut self, tokens: &[Token], batch_size: usize, threads: i32) -> Result<()> {
        if !self.state.initialized {
            return Err(EngineError::NotInitialized);
        }
        if batch_size == 0 {
            return Err(EngineError::InvalidBatchSize);
        }
        let threads = resolve_threads(threads);

        for (i, chunk) in tokens.chunks(batch_size).enumerate() {
            self.eval_chunk(chunk, threads).inspect_err(|e| {
                tracing::warn!("[batch_eval] chunk {i} (len {}) failed: {e}", chunk.len());
            })?;
        }
        Ok(())
    }

    /// `batch_eval` with the configured batch size and thread count.
    pub fn eval(&mut self, tokens: &[Token]) -> Result<()> {
        let (batch_size, threads) = (self.config.batch_size, self.config.threads);
        self.batch_eval(tokens, batch_size, threads)
    }

    fn eval_chunk(&mut self, chunk: &[Token], threads: usize) -> Result<()> {
        let state = &mut self.state;

        // History size *before* this chunk, never reaching past the window
        // the chunk itself needs.
        let n_past = state
            .context_length
            .saturating_sub(chunk.len())
            .min(state.history.len());
        tracing::debug!(
            "[batch_eval] chunk len {}, n_past = {n_past}, threads = {threads}",
            chunk.len()
        );

        self.backend.eval(chunk, threads, n_past, &mut state.logits)?;

        let vocab_size = state.vocab.len();
        if state.logits.len() < vocab_size {
            let len = state.logits.len();
            // A partial row must never be read as a distribution.
            state.logits.clear();
            return Err(EngineError::LogitsShape { len, vocab_size });
        }

        for &token in chunk {
            state.history.add(token);
        }
        Ok(())
    }
}
