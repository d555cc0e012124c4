//! Top-k / top-p sampling over one vocab-sized logits row.
//!
//! The generator is always passed in by the caller, so the same seed, logits,
//! recent set and knobs always pick the same token.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use strata_runtime_abi::{SamplingConfig, Token};

/// Bounded view of the distribution for the last evaluated position.
#[derive(Debug, Clone, Copy)]
pub struct LogitsView<'a> {
    row: &'a [f32],
}

impl<'a> LogitsView<'a> {
    /// Trailing `vocab_size` scores of `logits`, or `None` if the buffer is
    /// shorter than one row (including the empty "not evaluated" buffer).
    pub fn last_row(logits: &'a [f32], vocab_size: usize) -> Option<Self> {
        if vocab_size == 0 || logits.len() < vocab_size {
            return None;
        }
        Some(Self {
            row: &logits[logits.len() - vocab_size..],
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.row.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.row.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &'a [f32] {
        self.row
    }
}

/// Seed for the sampling generator; negative means "now" in seconds.
pub fn resolve_seed(seed: i64) -> u64 {
    if let Ok(s) = u64::try_from(seed) {
        return s;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Pick one token from `logits`.
///
/// Order: repetition penalty on `recent`, temperature, top-k, softmax,
/// top-p, then a weighted draw from `rng`. `last_n_tokens` and `seed` in
/// `config` are ignored here; the caller resolves them into `recent` and
/// `rng`. A non-positive temperature degrades to argmax.
pub fn sample_top_k_top_p<R: Rng + ?Sized>(
    logits: LogitsView<'_>,
    recent: &HashSet<Token>,
    config: &SamplingConfig,
    rng: &mut R,
) -> Token {
    let penalty = f64::from(config.repetition_penalty);
    let penalized = |i: usize, l: f32| -> f64 {
        let l = f64::from(l);
        // NaN would otherwise outrank every finite score.
        if l.is_nan() {
            return f64::NEG_INFINITY;
        }
        if penalty != 1.0 && recent.contains(&Token(i as i32)) {
            if l < 0.0 { l * penalty } else { l / penalty }
        } else {
            l
        }
    };

    let temperature = f64::from(config.temperature);
    if !(temperature > 0.0 && temperature.is_finite()) {
        let scores = logits.as_slice().iter().enumerate().map(|(i, &l)| (penalized(i, l), i));
        return Token(argmax(scores) as i32);
    }

    let scale = 1.0 / temperature;
    let mut candidates: Vec<(f64, usize)> = logits
        .as_slice()
        .iter()
        .enumerate()
        .map(|(i, &l)| (penalized(i, l) * scale, i))
        .collect();

    // Top-k: highest first, ties broken by lower id.
    let by_score = |a: &(f64, usize), b: &(f64, usize)| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1));
    let n = candidates.len();
    let top_k = usize::try_from(config.top_k)
        .ok()
        .filter(|&k| k > 0 && k < n)
        .unwrap_or(n);
    if top_k < n {
        candidates.select_nth_unstable_by(top_k - 1, by_score);
        candidates.truncate(top_k);
    }
    candidates.sort_unstable_by(by_score);

    // Softmax over survivors.
    let max = candidates.first().map(|c| c.0).unwrap_or(0.0);
    let mut probs: Vec<f64> = candidates.iter().map(|(s, _)| (s - max).exp()).collect();
    let sum: f64 = probs.iter().sum();
    for p in &mut probs {
        *p /= sum;
    }

    // Nucleus: smallest prefix reaching top_p, renormalized.
    let top_p = f64::from(config.top_p);
    if top_p < 1.0 {
        let mut cumsum = 0.0;
        for i in 0..probs.len() {
            cumsum += probs[i];
            if cumsum >= top_p {
                probs.truncate(i + 1);
                candidates.truncate(i + 1);
                break;
            }
        }
        for p in &mut probs {
            *p /= cumsum;
        }
    }

    let idx = match WeightedIndex::new(&probs) {
        Ok(dist) => dist.sample(rng),
        Err(e) => {
            tracing::warn!("[sample] degenerate distribution ({e}); taking top candidate");
            0
        }
    };
    Token(candidates[idx].1 as i32)
}

/// Index of the highest score; the lowest index wins a tie.
fn argmax<I: Iterator<Item = (f64, usize)>>(scores: I) -> usize {
    scores
        .max_by(|a, b| a.0.total_cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, i)| i)
        .unwrap_or(0)
}
