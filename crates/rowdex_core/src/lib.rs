//! # Rowdex Core
//!
//! Secondary index subsystem for a relational storage engine.
//!
//! Given rows stored in a table heap, this crate maintains auxiliary
//! structures that answer equality, range, set-membership and full-text
//! queries without scanning the heap.
//!
//! ## Strategies
//!
//! - [`OrderedIndex`] - B+ tree for equality and range lookups
//!   ([`ClusteredIndex`] when rows live in the leaves)
//! - [`HashIndex`] - chained buckets for equality lookups
//! - [`BitmapIndex`] - bit-vectors for low-cardinality columns
//! - [`InvertedIndex`] - posting lists for text search
//!
//! ## Manager
//!
//! [`IndexManager`] owns the catalog of indexes, routes operations by
//! [`IndexHandle`], backfills and validates indexes against a
//! [`RowSource`], and persists descriptors and snapshots through an
//! [`IndexDir`].
//!
//! ## Example
//!
//! ```rust
//! use rowdex_core::{ColumnType, IndexConfig, IndexDescriptor, IndexKind, IndexManager, Key, RowLocator};
//! use std::ops::Bound;
//!
//! let manager = IndexManager::new(IndexConfig::default());
//! let by_age = manager
//!     .create_index(IndexDescriptor::new("by_age", "people", IndexKind::Ordered).column("age", ColumnType::Int))
//!     .unwrap();
//!
//! manager.insert(by_age, &Key::single(41i64), RowLocator::new(0)).unwrap();
//! manager.insert(by_age, &Key::single(17i64), RowLocator::new(1)).unwrap();
//!
//! let adults = Key::single(18i64);
//! let hits = manager.range(by_age, Bound::Included(&adults), Bound::Unbounded).unwrap();
//! assert_eq!(hits, vec![RowLocator::new(0)]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod config;
mod descriptor;
mod dir;
mod error;
mod heap;
mod index;
mod key;
mod manager;
mod persistence;
mod stats;
mod types;

pub use catalog::{Catalog, CatalogRecord, CATALOG_MAGIC, CATALOG_VERSION};
pub use config::IndexConfig;
pub use descriptor::{ColumnDef, IndexDescriptor, IndexKind};
pub use dir::IndexDir;
pub use error::{IndexError, IndexResult};
pub use heap::{HeapRow, MemoryHeap, RowSource};
pub use index::{
    BitOp, BitVector, BitmapImage, BitmapIndex, ClusteredIndex, ClusteredRow, HashIndex, Index,
    IndexInstance, InvertedImage, InvertedIndex, OrderedIndex, Predicate, TokenizerConfig,
    TreeShape, DEFAULT_STOPWORDS,
};
pub use key::{ColumnType, Key, Value};
pub use manager::{IndexManager, IndexSummary};
pub use persistence::{Snapshot, SnapshotBody, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use stats::{IndexStats, StatsSnapshot};
pub use types::{IndexHandle, IndexId, RowLocator};
