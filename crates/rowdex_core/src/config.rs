//! Index subsystem configuration.

use crate::index::TokenizerConfig;

/// Configuration for the index manager and the strategies it creates.
///
/// None of these values are part of the persisted catalog; they are tuning
/// parameters and may change between runs.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Maximum number of keys per ordered-index node before it splits.
    pub ordered_fanout: usize,

    /// Number of buckets a new hash index starts with.
    pub hash_initial_buckets: usize,

    /// Maximum `entries / buckets` ratio before a hash index rehashes.
    pub hash_load_factor: f64,

    /// Multiplier applied to the bucket count on rehash.
    pub hash_growth_factor: usize,

    /// Maximum number of distinct values a bitmap index accepts.
    pub bitmap_cardinality_ceiling: usize,

    /// Tokenizer settings for inverted text indexes.
    pub tokenizer: TokenizerConfig,

    /// Whether to validate every index against the heap when opening.
    pub validate_on_open: bool,

    /// Whether to create the index directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            ordered_fanout: 64,
            hash_initial_buckets: 16,
            hash_load_factor: 0.75,
            hash_growth_factor: 2,
            bitmap_cardinality_ceiling: 1024,
            tokenizer: TokenizerConfig::default(),
            validate_on_open: true,
            create_if_missing: true,
        }
    }
}

impl IndexConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ordered-index fan-out. Values below 3 are raised to 3.
    #[must_use]
    pub fn ordered_fanout(mut self, fanout: usize) -> Self {
        self.ordered_fanout = fanout.max(3);
        self
    }

    /// Sets the initial hash bucket count. Zero is raised to 1.
    #[must_use]
    pub fn hash_initial_buckets(mut self, buckets: usize) -> Self {
        self.hash_initial_buckets = buckets.max(1);
        self
    }

    /// Sets the hash load-factor threshold.
    #[must_use]
    pub fn hash_load_factor(mut self, load_factor: f64) -> Self {
        self.hash_load_factor = load_factor;
        self
    }

    /// Sets the hash growth factor. Values below 2 are raised to 2.
    #[must_use]
    pub fn hash_growth_factor(mut self, factor: usize) -> Self {
        self.hash_growth_factor = factor.max(2);
        self
    }

    /// Sets the bitmap cardinality ceiling.
    #[must_use]
    pub fn bitmap_cardinality_ceiling(mut self, ceiling: usize) -> Self {
        self.bitmap_cardinality_ceiling = ceiling;
        self
    }

    /// Sets the tokenizer configuration.
    #[must_use]
    pub fn tokenizer(mut self, tokenizer: TokenizerConfig) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Sets whether indexes are validated against the heap on open.
    #[must_use]
    pub fn validate_on_open(mut self, value: bool) -> Self {
        self.validate_on_open = value;
        self
    }

    /// Sets whether to create the index directory if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}
