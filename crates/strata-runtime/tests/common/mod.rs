//! Scripted in-memory backend shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;

use strata_runtime::abi::{
    BackendError, BackendProvider, LoadedModel, ModelBackend, ModelType, Token, Vocabulary,
};

pub const PIECES: [&str; 10] = [
    "<|endoftext|>",
    "Hello",
    " world",
    "!",
    " foo",
    "### End",
    " bar",
    "\n",
    "#",
    "x",
];

pub const EOS: Token = Token(0);
pub const HELLO: Token = Token(1);
pub const WORLD: Token = Token(2);
pub const BANG: Token = Token(3);
pub const FOO: Token = Token(4);
pub const END_MARKER: Token = Token(5);
pub const BAR: Token = Token(6);
pub const HASH: Token = Token(8);
pub const X: Token = Token(9);
/// Ids for the two bytes of "é" (0xC3 0xA9), inserted by tests that need them.
pub const E_HI: Token = Token(10);
pub const E_LO: Token = Token(11);

pub fn vocab() -> Vocabulary {
    Vocabulary::from_pieces(PIECES)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalCall {
    pub tokens: Vec<Token>,
    pub threads: usize,
    pub n_past: usize,
}

/// Backend whose last logits row peaks at the next scripted token
/// (EOS once the script runs out). Earlier rows peak at `HELLO` so tests can
/// tell whether the trailing row was used.
pub struct ScriptedBackend {
    pub model_type: ModelType,
    pub vocab: Vocabulary,
    pub context_length: usize,
    pub script: VecDeque<Token>,
    /// When set, every row is exactly this.
    pub fixed_row: Option<Vec<f32>>,
    /// Zero-based eval call that fails.
    pub fail_at: Option<usize>,
    pub fail_load: bool,
    pub calls: Vec<EvalCall>,
}

impl ScriptedBackend {
    pub fn new(context_length: usize) -> Self {
        Self {
            model_type: ModelType::Gpt2,
            vocab: vocab(),
            context_length,
            script: VecDeque::new(),
            fixed_row: None,
            fail_at: None,
            fail_load: false,
            calls: Vec::new(),
        }
    }

    pub fn with_script(mut self, tokens: &[Token]) -> Self {
        self.script = tokens.iter().copied().collect();
        self
    }

    pub fn with_model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    fn row_peaking_at(&self, token: Token) -> Vec<f32> {
        let mut row = vec![0.0; self.vocab.len()];
        if let Some(i) = token.index() {
            row[i] = 100.0;
        }
        row
    }
}

impl ModelBackend for ScriptedBackend {
    fn model_type(&self) -> ModelType {
        self.model_type
    }

    fn load(&mut self, path: &Path) -> Result<LoadedModel, BackendError> {
        if self.fail_load {
            return Err(BackendError::load(path, "bad magic"));
        }
        Ok(LoadedModel {
            vocab: self.vocab.clone(),
            context_length: self.context_length,
        })
    }

    fn eval(
        &mut self,
        tokens: &[Token],
        threads: usize,
        n_past: usize,
        logits: &mut Vec<f32>,
    ) -> Result<(), BackendError> {
        let call = self.calls.len();
        self.calls.push(EvalCall {
            tokens: tokens.to_vec(),
            threads,
            n_past,
        });
        if self.fail_at == Some(call) {
            return Err(BackendError::Eval(format!("injected failure at call {call}")));
        }
        if n_past + tokens.len() > self.context_length {
            return Err(BackendError::ContextOverflow {
                n_past,
                n_tokens: tokens.len(),
                n_ctx: self.context_length,
            });
        }

        logits.clear();
        if let Some(row) = &self.fixed_row {
            for _ in tokens {
                logits.extend_from_slice(row);
            }
            return Ok(());
        }
        for _ in 1..tokens.len() {
            logits.extend(self.row_peaking_at(HELLO));
        }
        let next = self.script.pop_front().unwrap_or(EOS);
        logits.extend(self.row_peaking_at(next));
        Ok(())
    }
}

/// Provider that builds a scripted backend for any model type except Llama.
pub struct ScriptedProvider {
    pub context_length: usize,
}

impl BackendProvider for ScriptedProvider {
    type Backend = ScriptedBackend;

    fn create(&self, model_type: ModelType) -> Result<ScriptedBackend, BackendError> {
        match model_type {
            ModelType::Llama => Err(BackendError::Unsupported(model_type)),
            _ => Ok(ScriptedBackend::new(self.context_length).with_model_type(model_type)),
        }
    }
}

/// Greedy sampling knobs: top_k 1 always picks the peak.
pub fn greedy() -> strata_runtime::abi::SamplingConfig {
    strata_runtime::abi::SamplingConfig {
        top_k: 1,
        seed: 7,
        ..Default::default()
    }
}
