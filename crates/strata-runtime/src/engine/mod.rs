//! Strata generation engine: shared state machine around a model backend.
//!
//! The engine owns the vocabulary, the latest logits and the token history
//! for exactly one generation session. It is driven synchronously through
//! `&mut self`; it is not meant to be shared between callers.

use std::collections::HashSet;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use strata_runtime_abi::{
    BackendProvider, ModelBackend, ModelType, SamplingConfig, Token, Vocabulary,
};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::history::TokenHistory;
use crate::sampling::{LogitsView, resolve_seed, sample_top_k_top_p};

// Child modules (private to this crate). They can access private fields here.
mod eval;
mod generate;
mod utils;

pub use generate::{Generate, TextStream};
pub use utils::resolve_threads;

/// Everything created at load time and mutated between generations.
#[derive(Debug, Default)]
struct GenerationState {
    vocab: Vocabulary,
    /// Immutable after load.
    context_length: usize,
    /// Latest backend output; empty until the first eval and after reset.
    logits: Vec<f32>,
    history: TokenHistory,
    initialized: bool,
}

/// Engine = {backend for one architecture} + {vocabulary} + {logits and
/// token history of the current session}.
pub struct GenerationEngine<B: ModelBackend> {
    backend: B,
    config: Config,
    state: GenerationState,
}

impl<B: ModelBackend> GenerationEngine<B> {
    /// Uninitialized engine with default settings; call [`init`](Self::init) next.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, Config::default())
    }

    pub fn with_config(backend: B, config: Config) -> Self {
        Self {
            backend,
            config,
            state: GenerationState::default(),
        }
    }

    /// `new` + `init`.
    pub fn load<P: AsRef<Path>>(backend: B, path: P) -> Result<Self> {
        let mut engine = Self::new(backend);
        engine.init(path)?;
        Ok(engine)
    }

    /// Resolve `model_type` once, let `provider` build that architecture's
    /// backend, then load `path` with it.
    pub fn from_provider<P, Q>(provider: &P, path: Q, model_type: &str, config: Config) -> Result<Self>
    where
        P: BackendProvider<Backend = B>,
        Q: AsRef<Path>,
    {
        let model_type: ModelType = model_type.parse()?;
        tracing::debug!("[init] selecting backend for model type '{model_type}'");
        let backend = provider.create(model_type)?;
        let mut engine = Self::with_config(backend, config);
        engine.init(path)?;
        Ok(engine)
    }

    /// Load the model through the backend and size the token history to the
    /// context length. Fails without side effects if already initialized.
    pub fn init<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.state.initialized {
            tracing::warn!("[init] engine already initialized; refusing to reload");
            return Err(EngineError::AlreadyInitialized);
        }
        let path = path.as_ref();
        let loaded = self.backend.load(path).inspect_err(|e| {
            tracing::warn!("[init] load of {} failed: {e}", path.display());
        })?;

        tracing::info!(
            "[init] loaded {} as {}: vocab = {}, n_ctx = {}",
            path.display(),
            self.backend.model_type(),
            loaded.vocab.len(),
            loaded.context_length
        );
        self.state = GenerationState {
            vocab: loaded.vocab,
            context_length: loaded.context_length,
            logits: Vec::new(),
            history: TokenHistory::new(loaded.context_length),
            initialized: true,
        };
        Ok(())
    }

    // ─────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    #[inline]
    pub fn context_length(&self) -> usize {
        self.state.context_length
    }

    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.state.vocab.len()
    }

    #[inline]
    pub fn vocab(&self) -> &Vocabulary {
        &self.state.vocab
    }

    /// Number of tokens currently held in the history.
    #[inline]
    pub fn history_len(&self) -> usize {
        self.state.history.len()
    }

    /// Latest logits buffer as written by the backend.
    #[inline]
    pub fn logits(&self) -> &[f32] {
        &self.state.logits
    }

    #[inline]
    pub fn model_type(&self) -> ModelType {
        self.backend.model_type()
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // ─────────────────────────────────────────────
    // Vocabulary passthrough
    // ─────────────────────────────────────────────

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        self.state.vocab.tokenize(text)
    }

    /// Raw piece bytes for `token`, or an empty slice if the id is unknown.
    /// A piece may hold only part of a UTF-8 character.
    pub fn detokenize(&self, token: Token) -> &[u8] {
        self.state.vocab.piece(token).unwrap_or_default()
    }

    /// Concatenated pieces decoded as UTF-8; invalid bytes become U+FFFD.
    pub fn detokenize_all(&self, tokens: &[Token]) -> String {
        let bytes: Vec<u8> = tokens
            .iter()
            .flat_map(|t| self.detokenize(*t).iter().copied())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Canonical end-of-text id (`<|endoftext|>`, else 0).
    pub fn eos_token(&self) -> Token {
        self.state.vocab.eos_token()
    }

    /// True for the end-of-text id, and, for architectures that end with a
    /// text marker, for any token decoding to that marker while the
    /// vocabulary carries special tokens.
    pub fn is_eos_token(&self, token: Token) -> bool {
        if token == self.eos_token() {
            return true;
        }
        if self.state.vocab.special_tokens().is_empty() {
            return false;
        }
        self.backend
            .model_type()
            .end_marker()
            .is_some_and(|marker| self.detokenize(token) == marker.as_bytes())
    }

    // ─────────────────────────────────────────────
    // Sampling / reset
    // ─────────────────────────────────────────────

    /// Sample the next token from the distribution of the last evaluated
    /// position. Returns the EOS token when nothing has been evaluated since
    /// load or the last reset.
    pub fn sample(&self, config: &SamplingConfig) -> Token {
        let Some(view) = LogitsView::last_row(&self.state.logits, self.vocab_size()) else {
            return self.eos_token();
        };

        let recent: HashSet<Token> = if config.uses_repetition_penalty() {
            let last_n = config.resolved_last_n(self.state.context_length);
            self.state.history.recent(last_n)
        } else {
            HashSet::new()
        };

        let seed = resolve_seed(config.seed);
        let mut rng = StdRng::seed_from_u64(seed);
        let token = sample_top_k_top_p(view, &recent, config, &mut rng);
        tracing::trace!("[sample] seed = {seed}, recent = {}, token = {token}", recent.len());
        token
    }

    /// Drop logits and history; the model stays loaded.
    pub fn reset(&mut self) {
        self.state.logits.clear();
        self.state.history.clear();
        tracing::debug!("[reset] cleared logits and token history");
    }
}
