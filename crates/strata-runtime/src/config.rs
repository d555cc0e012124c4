//! Engine-level settings: sampling knobs plus eval and generation limits.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strata_runtime_abi::SamplingConfig;

use crate::error::Result;

/// Defaults used by `eval`, `generate`, `stream` and `complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub sampling: SamplingConfig,

    // eval
    pub batch_size: usize,
    pub threads: i32, // < 0 → min(cpus, 4)

    // generate
    pub max_new_tokens: usize,
    pub stop: Vec<String>,
    /// Reset logits and history before each generation.
    pub reset: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            batch_size: 8,
            threads: -1,
            max_new_tokens: 256,
            stop: Vec::new(),
            reset: true,
        }
    }
}

impl Config {
    /// Read a JSON config; missing fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Defaults with `STRATA_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut c = Self::default();
        c.apply_env_overrides();
        c
    }

    /// Env overrides:
    /// `STRATA_BATCH_SIZE`, `STRATA_THREADS`, `STRATA_MAX_NEW_TOKENS`,
    /// `STRATA_SEED`, `STRATA_TOP_K`, `STRATA_TEMPERATURE`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with a
    /// caller-supplied lookup. Unparseable values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = parse_override::<usize, _>(&lookup, "STRATA_BATCH_SIZE") {
            self.batch_size = n.max(1);
        }
        if let Some(n) = parse_override(&lookup, "STRATA_THREADS") {
            self.threads = n;
        }
        if let Some(n) = parse_override(&lookup, "STRATA_MAX_NEW_TOKENS") {
            self.max_new_tokens = n;
        }
        if let Some(n) = parse_override(&lookup, "STRATA_SEED") {
            self.sampling.seed = n;
        }
        if let Some(n) = parse_override(&lookup, "STRATA_TOP_K") {
            self.sampling.top_k = n;
        }
        if let Some(t) = parse_override(&lookup, "STRATA_TEMPERATURE") {
            self.sampling.temperature = t;
        }
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("[config] ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}
