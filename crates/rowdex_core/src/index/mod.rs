//! Index strategies.
//!
//! Every index is one of four strategies, chosen from the descriptor's
//! kind when the index is created:
//!
//! - [`OrderedIndex`]: B+ tree with equality and range lookups
//!   ([`ClusteredIndex`] when rows live in the leaves)
//! - [`HashIndex`]: chained buckets, equality only
//! - [`BitmapIndex`]: one bit-vector per distinct value
//! - [`InvertedIndex`]: term → posting list for text search
//!
//! All of them implement [`Index`]; [`IndexInstance`] is the tagged union
//! the manager stores.

mod bitmap;
mod hash;
mod inverted;
mod ordered;
mod traits;

pub use bitmap::{BitOp, BitVector, BitmapImage, BitmapIndex, Predicate};
pub use hash::HashIndex;
pub use inverted::{InvertedImage, InvertedIndex, TokenizerConfig, DEFAULT_STOPWORDS};
pub use ordered::{ClusteredIndex, ClusteredRow, OrderedIndex, TreeShape};
pub use traits::Index;

use crate::config::IndexConfig;
use crate::descriptor::{IndexDescriptor, IndexKind};

/// A strategy instance, dispatched on the descriptor's kind.
pub enum IndexInstance {
    /// Ordered index with locator payloads.
    Ordered(OrderedIndex),
    /// Ordered index with row payloads.
    Clustered(ClusteredIndex),
    /// Hash index.
    Hash(HashIndex),
    /// Bitmap index.
    Bitmap(BitmapIndex),
    /// Inverted text index.
    Inverted(InvertedIndex),
}

impl IndexInstance {
    /// Creates an empty strategy instance for `descriptor`.
    pub fn build(descriptor: &IndexDescriptor, config: &IndexConfig) -> Self {
        let name = descriptor.name.clone();
        match descriptor.kind {
            IndexKind::Ordered if descriptor.clustered => Self::Clustered(ClusteredIndex::new(
                name,
                descriptor.unique,
                config.ordered_fanout,
            )),
            IndexKind::Ordered => Self::Ordered(OrderedIndex::new(
                name,
                descriptor.unique,
                config.ordered_fanout,
            )),
            IndexKind::Hash => Self::Hash(HashIndex::new(
                name,
                descriptor.unique,
                config.hash_initial_buckets,
                config.hash_load_factor,
                config.hash_growth_factor,
            )),
            IndexKind::Bitmap => {
                Self::Bitmap(BitmapIndex::new(name, config.bitmap_cardinality_ceiling))
            }
            IndexKind::Inverted => {
                Self::Inverted(InvertedIndex::new(name, config.tokenizer.clone()))
            }
        }
    }

    /// The instance as a trait object.
    pub fn as_index(&self) -> &dyn Index {
        match self {
            Self::Ordered(index) => index,
            Self::Clustered(index) => index,
            Self::Hash(index) => index,
            Self::Bitmap(index) => index,
            Self::Inverted(index) => index,
        }
    }
}
