//! Ordered (B+ tree) indexes.
//!
//! [`OrderedIndex`] maps keys to row locators and answers equality and
//! range lookups in key order. [`ClusteredIndex`] uses the same tree but
//! stores whole rows as leaf payloads.

mod node;
mod tree;

pub use tree::TreeShape;

use crate::descriptor::IndexKind;
use crate::error::{IndexError, IndexResult};
use crate::index::traits::Index;
use crate::key::{Key, Value};
use crate::types::RowLocator;
use std::cmp::Ordering;
use std::ops::Bound;
use tree::BTree;

/// An ordered index over one or more columns.
///
/// Supports:
/// - Equality lookups
/// - Range scans with inclusive, exclusive or unbounded ends
/// - Full traversal in key order
///
/// # Example
///
/// ```
/// use rowdex_core::{Index, Key, OrderedIndex, RowLocator};
/// use std::ops::Bound;
///
/// let index = OrderedIndex::new("by_age", false, 64);
/// index.insert(&Key::single(30i64), RowLocator::new(1)).unwrap();
/// index.insert(&Key::single(25i64), RowLocator::new(2)).unwrap();
///
/// let low = Key::single(20i64);
/// let hits = index.range(Bound::Included(&low), Bound::Unbounded).unwrap();
/// assert_eq!(hits, vec![RowLocator::new(2), RowLocator::new(1)]);
/// ```
pub struct OrderedIndex {
    tree: BTree<RowLocator>,
}

impl OrderedIndex {
    /// Creates an empty index whose nodes hold at most `fanout` keys.
    pub fn new(name: impl Into<String>, unique: bool, fanout: usize) -> Self {
        Self {
            tree: BTree::new(name, unique, fanout),
        }
    }

    /// Returns true if the index enforces uniqueness.
    pub fn is_unique(&self) -> bool {
        self.tree.is_unique()
    }

    /// Locators for keys in `[low, high]`.
    pub fn between(&self, low: &Key, high: &Key) -> IndexResult<Vec<RowLocator>> {
        self.range(Bound::Included(low), Bound::Included(high))
    }

    /// Every `(key, locator)` pair in key order.
    pub fn scan_ordered(&self) -> IndexResult<Vec<(Key, RowLocator)>> {
        let mut out = Vec::with_capacity(self.len());
        self.tree.scan(Bound::Unbounded, Bound::Unbounded, |key, locators| {
            out.extend(locators.iter().map(|&loc| (key.clone(), loc)));
            true
        })?;
        Ok(out)
    }

    /// Smallest indexed key.
    pub fn min_key(&self) -> IndexResult<Option<Key>> {
        self.tree.min_key()
    }

    /// Largest indexed key.
    pub fn max_key(&self) -> IndexResult<Option<Key>> {
        self.tree.max_key()
    }

    /// Number of levels in the tree.
    pub fn height(&self) -> IndexResult<usize> {
        self.tree.height()
    }

    /// Walks the tree and returns its shape.
    pub fn shape(&self) -> IndexResult<TreeShape> {
        self.tree.check_integrity()
    }

    /// Replaces the contents with `entries`.
    pub fn rebuild<I>(&self, entries: I) -> IndexResult<()>
    where
        I: IntoIterator<Item = (Key, RowLocator)>,
    {
        self.tree.clear();
        for (key, locator) in entries {
            self.tree.insert(key, locator)?;
        }
        Ok(())
    }
}

impl Index for OrderedIndex {
    fn name(&self) -> &str {
        self.tree.name()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Ordered
    }

    fn insert(&self, key: &Key, locator: RowLocator) -> IndexResult<()> {
        self.tree.insert(key.clone(), locator).map(|_| ())
    }

    fn delete(&self, key: &Key, locator: RowLocator) -> IndexResult<()> {
        if self.tree.delete(key, &locator)? {
            Ok(())
        } else {
            Err(IndexError::not_found(format!(
                "{key} -> {locator} in index '{}'",
                self.name()
            )))
        }
    }

    fn lookup_equal(&self, key: &Key) -> IndexResult<Vec<RowLocator>> {
        self.tree.get(key)
    }

    fn range(&self, low: Bound<&Key>, high: Bound<&Key>) -> IndexResult<Vec<RowLocator>> {
        let mut out = Vec::new();
        self.tree.scan(low, high, |_, locators| {
            out.extend(locators.iter().copied());
            true
        })?;
        Ok(out)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn clear(&self) {
        self.tree.clear();
    }

    fn check_integrity(&self) -> IndexResult<()> {
        self.tree.check_integrity().map(|_| ())
    }
}

/// A row stored in a clustered index leaf.
///
/// Identity is the locator alone, so a row can be removed knowing only
/// where it lives.
#[derive(Debug, Clone)]
pub struct ClusteredRow {
    /// Logical address of the row.
    pub locator: RowLocator,
    /// Column values.
    pub values: Vec<Value>,
}

impl PartialEq for ClusteredRow {
    fn eq(&self, other: &Self) -> bool {
        self.locator == other.locator
    }
}

impl Eq for ClusteredRow {}

impl PartialOrd for ClusteredRow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClusteredRow {
    fn cmp(&self, other: &Self) -> Ordering {
        self.locator.cmp(&other.locator)
    }
}

/// An ordered index whose leaves hold the table's rows.
pub struct ClusteredIndex {
    tree: BTree<ClusteredRow>,
}

impl ClusteredIndex {
    /// Creates an empty clustered index.
    pub fn new(name: impl Into<String>, unique: bool, fanout: usize) -> Self {
        Self {
            tree: BTree::new(name, unique, fanout),
        }
    }

    /// Stores `values` under `key`.
    ///
    /// Storing a row at a locator already present under `key` keeps the
    /// existing row.
    pub fn insert_row(&self, key: &Key, locator: RowLocator, values: Vec<Value>) -> IndexResult<()> {
        self.tree
            .insert(key.clone(), ClusteredRow { locator, values })
            .map(|_| ())
    }

    /// Rows stored under exactly `key`.
    pub fn rows_equal(&self, key: &Key) -> IndexResult<Vec<ClusteredRow>> {
        self.tree.get(key)
    }

    /// Rows whose keys fall within the bounds, in key order.
    pub fn rows_in_range(&self, low: Bound<&Key>, high: Bound<&Key>) -> IndexResult<Vec<ClusteredRow>> {
        let mut out = Vec::new();
        self.tree.scan(low, high, |_, rows| {
            out.extend(rows.iter().cloned());
            true
        })?;
        Ok(out)
    }

    /// Every `(key, row)` pair in key order.
    pub fn scan_ordered(&self) -> IndexResult<Vec<(Key, ClusteredRow)>> {
        let mut out = Vec::with_capacity(self.len());
        self.tree.scan(Bound::Unbounded, Bound::Unbounded, |key, rows| {
            out.extend(rows.iter().map(|row| (key.clone(), row.clone())));
            true
        })?;
        Ok(out)
    }

    /// Number of levels in the tree.
    pub fn height(&self) -> IndexResult<usize> {
        self.tree.height()
    }

    /// Replaces the contents with `entries`.
    pub fn rebuild<I>(&self, entries: I) -> IndexResult<()>
    where
        I: IntoIterator<Item = (Key, ClusteredRow)>,
    {
        self.tree.clear();
        for (key, row) in entries {
            self.tree.insert(key, row)?;
        }
        Ok(())
    }
}

impl Index for ClusteredIndex {
    fn name(&self) -> &str {
        self.tree.name()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Ordered
    }

    /// Stores the key's own values as the row.
    fn insert(&self, key: &Key, locator: RowLocator) -> IndexResult<()> {
        self.insert_row(key, locator, key.values().to_vec())
    }

    fn delete(&self, key: &Key, locator: RowLocator) -> IndexResult<()> {
        let probe = ClusteredRow {
            locator,
            values: Vec::new(),
        };
        if self.tree.delete(key, &probe)? {
            Ok(())
        } else {
            Err(IndexError::not_found(format!(
                "{key} -> {locator} in clustered index '{}'",
                self.name()
            )))
        }
    }

    fn lookup_equal(&self, key: &Key) -> IndexResult<Vec<RowLocator>> {
        Ok(self.rows_equal(key)?.into_iter().map(|row| row.locator).collect())
    }

    fn range(&self, low: Bound<&Key>, high: Bound<&Key>) -> IndexResult<Vec<RowLocator>> {
        let mut out = Vec::new();
        self.tree.scan(low, high, |_, rows| {
            out.extend(rows.iter().map(|row| row.locator));
            true
        })?;
        Ok(out)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn clear(&self) {
        self.tree.clear();
    }

    fn check_integrity(&self) -> IndexResult<()> {
        self.tree.check_integrity().map(|_| ())
    }
}
