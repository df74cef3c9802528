//! Text tokenizer for inverted indexes.

use std::collections::HashSet;

/// English words dropped by the default tokenizer.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
    "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
    "these", "they", "this", "to", "was", "will", "with",
];

/// Configuration for the text tokenizer.
#[derive(Debug, Clone)]
pub struct TokenizerConfig {
    /// Minimum token length (in characters) to index.
    pub min_token_length: usize,
    /// Maximum token length (in characters) to index.
    pub max_token_length: usize,
    /// Whether tokens are lowercased.
    pub case_insensitive: bool,
    /// Additional characters to treat as separators.
    pub extra_separators: Vec<char>,
    /// Tokens dropped after case folding.
    pub stopwords: HashSet<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_token_length: 1,
            max_token_length: 256,
            case_insensitive: true,
            extra_separators: vec![],
            stopwords: DEFAULT_STOPWORDS.iter().map(|w| (*w).to_string()).collect(),
        }
    }
}

impl TokenizerConfig {
    /// Creates a new tokenizer configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets minimum token length.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_token_length = len;
        self
    }

    /// Sets maximum token length.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_token_length = len;
        self
    }

    /// Sets case sensitivity.
    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }

    /// Adds extra separator characters.
    #[must_use]
    pub fn with_separators(mut self, chars: &[char]) -> Self {
        self.extra_separators.extend_from_slice(chars);
        self
    }

    /// Replaces the stopword set.
    #[must_use]
    pub fn stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stopwords = words.into_iter().map(Into::into).collect();
        self
    }

    /// Disables stopword filtering.
    #[must_use]
    pub fn without_stopwords(mut self) -> Self {
        self.stopwords.clear();
        self
    }

    /// Normalizes a single query term the same way document tokens are.
    ///
    /// Returns `None` if the term would never be indexed.
    pub fn normalize(&self, term: &str) -> Option<String> {
        let term = if self.case_insensitive {
            term.to_lowercase()
        } else {
            term.to_string()
        };
        let len = term.chars().count();
        if len < self.min_token_length.max(1)
            || len > self.max_token_length
            || self.stopwords.contains(&term)
        {
            return None;
        }
        Some(term)
    }

    fn is_separator(&self, c: char) -> bool {
        !c.is_alphanumeric() || self.extra_separators.contains(&c)
    }

    /// Splits `text` into normalized tokens, in order of appearance.
    ///
    /// Duplicates are kept.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c| self.is_separator(c))
            .filter_map(|word| self.normalize(word))
            .collect()
    }

    /// Distinct normalized tokens of `text`, sorted.
    pub fn distinct_tokens(&self, text: &str) -> Vec<String> {
        let mut tokens = self.tokenize(text);
        tokens.sort_unstable();
        tokens.dedup();
        tokens
    }
}
