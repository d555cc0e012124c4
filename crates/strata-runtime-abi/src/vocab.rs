//! Bidirectional token ↔ piece mapping plus the greedy tokenizer every
//! ggml-family architecture shares.

use std::collections::HashMap;

use crate::token::Token;

/// Piece that marks the canonical end-of-text token.
pub const END_OF_TEXT: &str = "<|endoftext|>";

const CONTRACTIONS: [&str; 7] = ["'s", "'t", "'re", "'ve", "'m", "'ll", "'d"];

/// Token vocabulary as produced by a backend's loader.
///
/// Pieces are raw bytes: byte-level vocabularies may split one multi-byte
/// character across several tokens, so a single piece need not be valid
/// UTF-8. Ids are unique; insertion order carries no meaning. The optional
/// special-token table lists pieces that must be matched verbatim before
/// normal word splitting (some architectures also use it to signal
/// completion through text, see `ModelType::end_marker`).
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    token_to_id: HashMap<Vec<u8>, Token>,
    id_to_token: HashMap<Token, Vec<u8>>,
    special_tokens: Vec<String>,
}

impl Vocabulary {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a vocabulary assigning ids `0..n` in iteration order.
    pub fn from_pieces<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        let mut vocab = Self::new();
        for (i, piece) in pieces.into_iter().enumerate() {
            vocab.insert(Token(i as i32), piece);
        }
        vocab
    }

    /// Insert (or replace) the mapping for `token`.
    pub fn insert<S: Into<Vec<u8>>>(&mut self, token: Token, piece: S) {
        let piece = piece.into();
        if let Some(old) = self.id_to_token.insert(token, piece.clone()) {
            if self.token_to_id.get(&old) == Some(&token) {
                self.token_to_id.remove(&old);
            }
        }
        self.token_to_id.insert(piece, token);
    }

    /// Register a piece in the special-token table.
    pub fn add_special_token<S: Into<String>>(&mut self, piece: S) {
        let piece = piece.into();
        if !piece.is_empty() && !self.special_tokens.contains(&piece) {
            self.special_tokens.push(piece);
        }
    }

    #[inline]
    pub fn special_tokens(&self) -> &[String] {
        &self.special_tokens
    }

    /// Vocabulary size (number of ids).
    #[inline]
    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    #[inline]
    pub fn id_of<P: AsRef<[u8]>>(&self, piece: P) -> Option<Token> {
        self.token_to_id.get(piece.as_ref()).copied()
    }

    #[inline]
    pub fn piece(&self, token: Token) -> Option<&[u8]> {
        self.id_to_token.get(&token).map(Vec::as_slice)
    }

    /// Id of `<|endoftext|>`, falling back to token 0.
    pub fn eos_token(&self) -> Token {
        self.id_of(END_OF_TEXT).unwrap_or(Token(0))
    }

    /// Convert text to tokens.
    ///
    /// Special tokens are matched verbatim first; the remaining text is split
    /// into GPT-2 style words and each word is encoded by greedy
    /// longest-prefix matching. Characters with no matching piece are skipped.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut rest = text;
        while let Some((pos, special)) = self.find_special(rest) {
            self.tokenize_plain(&rest[..pos], &mut tokens);
            match self.id_of(special) {
                Some(id) => tokens.push(id),
                None => self.tokenize_plain(special, &mut tokens),
            }
            rest = &rest[pos + special.len()..];
        }
        self.tokenize_plain(rest, &mut tokens);
        tokens
    }

    /// Earliest special-token occurrence; longest piece wins a tie.
    fn find_special<'a>(&'a self, text: &str) -> Option<(usize, &'a str)> {
        self.special_tokens
            .iter()
            .filter_map(|s| text.find(s.as_str()).map(|pos| (pos, s.as_str())))
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.len().cmp(&a.1.len())))
    }

    fn tokenize_plain(&self, text: &str, out: &mut Vec<Token>) {
        for word in split_words(text) {
            self.encode_word(word, out);
        }
    }

    fn encode_word(&self, word: &str, out: &mut Vec<Token>) {
        let mut i = 0;
        while i < word.len() {
            let rest = &word[i..];
            let ends: Vec<usize> = rest.char_indices().map(|(k, c)| k + c.len_utf8()).collect();
            let hit = ends
                .iter()
                .rev()
                .find_map(|&end| self.id_of(&rest[..end]).map(|t| (end, t)));
            match hit {
                Some((end, token)) => {
                    out.push(token);
                    i += end;
                }
                None => {
                    let skip = ends.first().copied().unwrap_or(rest.len());
                    tracing::warn!("[tokenize] no piece for {:?}, skipping", &rest[..skip]);
                    i += skip;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Letter,
    Digit,
    Space,
    Other,
}

fn class_of(c: char) -> CharClass {
    if c.is_alphabetic() {
        CharClass::Letter
    } else if c.is_numeric() {
        CharClass::Digit
    } else if c.is_whitespace() {
        CharClass::Space
    } else {
        CharClass::Other
    }
}

/// GPT-2 word split: contractions, ` ?letters`, ` ?digits`, ` ?other`,
/// and whitespace runs that leave their last char to the following word.
fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let (word, tail) = rest.split_at(next_word_len(rest));
        words.push(word);
        rest = tail;
    }
    words
}

fn next_word_len(s: &str) -> usize {
    if let Some(c) = CONTRACTIONS.iter().find(|c| s.starts_with(**c)) {
        return c.len();
    }
    let Some(first) = s.chars().next() else {
        return 0;
    };

    let (run_start, class) = match (first, s[first.len_utf8()..].chars().next().map(class_of)) {
        (' ', Some(next)) if next != CharClass::Space => (1, next),
        _ => (0, class_of(first)),
    };

    if class == CharClass::Space {
        let run: Vec<(usize, char)> = s.char_indices().take_while(|(_, c)| c.is_whitespace()).collect();
        let Some(&(last_idx, last)) = run.last() else {
            return first.len_utf8();
        };
        let end = last_idx + last.len_utf8();
        return if end < s.len() && run.len() > 1 { last_idx } else { end };
    }

    let body: usize = s[run_start..]
        .chars()
        .take_while(|c| class_of(*c) == class)
        .map(char::len_utf8)
        .sum();
    run_start + body
}
