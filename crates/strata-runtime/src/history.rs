//! Fixed-capacity rolling record of the tokens fed to the backend.
//! Feeds the repetition penalty and the `n_past` computation.

use std::collections::HashSet;

use strata_runtime_abi::Token;

/// Ring buffer of the most recent tokens, capacity = context length.
#[derive(Default, Debug, Clone)]
pub struct TokenHistory {
    capacity: usize,
    tokens: Vec<Token>,
    /// Next slot to overwrite once full.
    cursor: usize,
}

impl TokenHistory {
    #[inline]
    pub fn new(capacity: usize) -> Self {
        let mut h = Self::default();
        h.init(capacity);
        h
    }

    /// Set the capacity and drop all contents.
    pub fn init(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.tokens = Vec::with_capacity(capacity);
        self.clear();
    }

    /// Record a token, overwriting the oldest one when full.
    /// A zero-capacity history records nothing.
    pub fn add(&mut self, token: Token) {
        if self.capacity == 0 {
            return;
        }
        if self.tokens.len() < self.capacity {
            self.tokens.push(token);
        } else {
            self.tokens[self.cursor] = token;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// Membership set of the last `min(len, n)` tokens added.
    pub fn recent(&self, n: usize) -> HashSet<Token> {
        let size = self.tokens.len();
        let n = n.min(size);
        if n == 0 {
            return HashSet::new();
        }

        // n <= size and cursor <= size, so this never underflows.
        let start = (self.cursor + size - n) % size;
        if start < self.cursor {
            self.tokens[start..self.cursor].iter().copied().collect()
        } else {
            self.tokens[start..]
                .iter()
                .chain(&self.tokens[..self.cursor])
                .copied()
                .collect()
        }
    }

    /// Drop all contents; capacity is retained.
    #[inline]
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.cursor = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
