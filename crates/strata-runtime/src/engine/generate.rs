use std::iter::FusedIterator;

use super::GenerationEngine;
use super::utils::drain_utf8;
use crate::error::Result;
use strata_runtime_abi::{ModelBackend, SamplingConfig, Token};

impl<B: ModelBackend> GenerationEngine<B> {
    /// Lazily generate tokens following `tokens`, using the engine config.
    ///
    /// Resets first when `config.reset` is set. The first pull evaluates the
    /// prompt. Every pull then samples one token and evaluates it before
    /// yielding, so history and logits always include every yielded token.
    /// The stream ends on EOS (not yielded or evaluated), after
    /// `max_new_tokens`, or after yielding an error.
    pub fn generate(&mut self, tokens: &[Token]) -> Generate<'_, B> {
        if self.config.reset {
            self.reset();
        }
        Generate {
            sampling: self.config.sampling.clone(),
            batch_size: self.config.batch_size,
            threads: self.config.threads,
            max_new_tokens: self.config.max_new_tokens,
            prompt: tokens.to_vec(),
            produced: 0,
            finished: false,
            engine: self,
        }
    }

    /// Tokenize `prompt` and stream decoded text, honoring the configured
    /// stop sequences.
    pub fn stream(&mut self, prompt: &str) -> TextStream<'_, B> {
        let tokens = self.tokenize(prompt);
        let stop: Vec<String> = self
            .config
            .stop
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect();
        tracing::debug!(
            "[stream] prompt tokens = {}, stop sequences = {}",
            tokens.len(),
            stop.len()
        );
        TextStream {
            tokens: self.generate(&tokens),
            stop,
            text: String::new(),
            staging: Vec::new(),
            done: false,
        }
    }

    /// Generate the full completion for `prompt`.
    pub fn complete(&mut self, prompt: &str) -> Result<String> {
        self.stream(prompt).collect()
    }
}

/// Token stream returned by [`GenerationEngine::generate`].
/// Dropping it is the only cancellation needed.
pub struct Generate<'a, B: ModelBackend> {
    engine: &'a mut GenerationEngine<B>,
    sampling: SamplingConfig,
    batch_size: usize,
    threads: i32,
    max_new_tokens: usize,
    /// Drained by the first pull.
    prompt: Vec<Token>,
    produced: usize,
    finished: bool,
}

impl<B: ModelBackend> Generate<'_, B> {
    /// Number of tokens yielded so far.
    #[inline]
    pub fn produced(&self) -> usize {
        self.produced
    }

    #[inline]
    pub fn engine(&self) -> &GenerationEngine<B> {
        &*self.engine
    }
}

impl<B: ModelBackend> Iterator for Generate<'_, B> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.produced >= self.max_new_tokens {
            tracing::debug!("[generate] reached max_new_tokens = {}", self.max_new_tokens);
            self.finished = true;
            return None;
        }

        let prompt = std::mem::take(&mut self.prompt);
        if let Err(e) = self.engine.batch_eval(&prompt, self.batch_size, self.threads) {
            self.finished = true;
            return Some(Err(e));
        }

        let token = self.engine.sample(&self.sampling);
        if self.engine.is_eos_token(token) {
            tracing::debug!("[generate] EOS ({token}) after {} tokens", self.produced);
            self.finished = true;
            return None;
        }

        if let Err(e) = self.engine.batch_eval(&[token], self.batch_size, self.threads) {
            self.finished = true;
            return Some(Err(e));
        }
        self.produced += 1;
        Some(Ok(token))
    }
}

impl<B: ModelBackend> FusedIterator for Generate<'_, B> {}

/// Text stream returned by [`GenerationEngine::stream`].
///
/// Piece bytes are staged until they form complete UTF-8 characters, so a
/// character split across tokens is emitted whole. Text is cut at the
/// earliest stop sequence. A trailing piece that could still grow into a
/// stop sequence is held back until it is resolved.
pub struct TextStream<'a, B: ModelBackend> {
    tokens: Generate<'a, B>,
    stop: Vec<String>,
    text: String,
    staging: Vec<u8>,
    done: bool,
}

impl<B: ModelBackend> Iterator for TextStream<'_, B> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                if self.text.is_empty() {
                    return None;
                }
                return Some(Ok(std::mem::take(&mut self.text)));
            }

            let token = match self.tokens.next() {
                Some(Ok(token)) => token,
                Some(Err(e)) => {
                    self.done = true;
                    self.text.clear();
                    self.staging.clear();
                    return Some(Err(e));
                }
                None => {
                    if !self.staging.is_empty() {
                        tracing::warn!(
                            "[stream] {} trailing bytes are not valid UTF-8",
                            self.staging.len()
                        );
                        self.text.push_str(&String::from_utf8_lossy(&self.staging));
                        self.staging.clear();
                    }
                    self.done = true;
                    continue;
                }
            };
            self.staging.extend_from_slice(self.tokens.engine().detokenize(token));
            drain_utf8(&mut self.staging, &mut self.text);

            // The stop sequence may sit anywhere in the pending text.
            if let Some(pos) = earliest_stop(&self.text, &self.stop) {
                tracing::debug!("[stream] stop sequence hit at byte {pos}");
                self.text.truncate(pos);
                self.staging.clear();
                self.done = true;
                continue;
            }

            let end = self.text.len() - longest_partial_stop(&self.text, &self.stop);
            if end > 0 {
                let held = self.text.split_off(end);
                return Some(Ok(std::mem::replace(&mut self.text, held)));
            }
        }
    }
}

impl<B: ModelBackend> FusedIterator for TextStream<'_, B> {}

fn earliest_stop(text: &str, stop: &[String]) -> Option<usize> {
    stop.iter().filter_map(|s| text.find(s.as_str())).min()
}

/// Length of the longest suffix of `text` that is a proper prefix of a stop sequence.
fn longest_partial_stop(text: &str, stop: &[String]) -> usize {
    stop.iter()
        .filter_map(|s| {
            (1..s.len())
                .rev()
                .filter(|&i| s.is_char_boundary(i))
                .find(|&i| text.ends_with(&s[..i]))
        })
        .max()
        .unwrap_or(0)
}
