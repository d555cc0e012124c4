use serde::{Deserialize, Serialize};

/// Wrapper for a model token (ID). Using a newtype avoids accidental
/// mixing with unrelated `i32`s and keeps conversions explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub i32);

// i32 matches the id width of the ggml-family vocabularies. Backends with
// u32 ids convert at their boundary and keep this type consistent in core.

impl Token {
    /// Index into a vocab-sized logits row, if the id is non-negative.
    #[inline]
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    /// True if the id falls inside `[0, vocab_size)`.
    #[inline]
    pub fn is_in_vocab(self, vocab_size: usize) -> bool {
        self.index().is_some_and(|i| i < vocab_size)
    }
}

impl From<i32> for Token {
    #[inline]
    fn from(value: i32) -> Self {
        Token(value)
    }
}

impl From<Token> for i32 {
    #[inline]
    fn from(token: Token) -> i32 {
        token.0
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
