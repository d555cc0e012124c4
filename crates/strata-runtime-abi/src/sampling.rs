use serde::{Deserialize, Serialize};

/// User-tunable sampling knobs passed to the engine's sampler.
///
/// Negative `last_n_tokens` means "the whole context window"; negative
/// `seed` means "derive from the wall clock".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub top_k: i32,     // <= 0 keeps the full vocabulary
    pub top_p: f32,     // < 1.0 enables nucleus filtering
    pub temperature: f32,
    pub repetition_penalty: f32, // 1.0 disables the penalty
    pub last_n_tokens: i32,
    pub seed: i64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            top_k: 40,
            top_p: 0.95,
            temperature: 0.8,
            repetition_penalty: 1.0,
            last_n_tokens: 64,
            seed: -1,
        }
    }
}

impl SamplingConfig {
    /// Whether the recent-token window affects sampling at all.
    #[inline]
    pub fn uses_repetition_penalty(&self) -> bool {
        self.repetition_penalty != 1.0
    }

    /// `last_n_tokens` with the negative sentinel resolved to `context_length`.
    pub fn resolved_last_n(&self, context_length: usize) -> usize {
        usize::try_from(self.last_n_tokens).unwrap_or(context_length)
    }
}
