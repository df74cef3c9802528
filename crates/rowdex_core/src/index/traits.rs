//! Operations shared by every index strategy.

use crate::descriptor::IndexKind;
use crate::error::{IndexError, IndexResult};
use crate::key::Key;
use crate::types::RowLocator;
use std::ops::Bound;

/// Core index trait.
///
/// All strategies are internally synchronized: every method takes `&self`
/// and may be called from any thread.
pub trait Index: Send + Sync {
    /// Name of the index, as used in error messages.
    fn name(&self) -> &str;

    /// Strategy kind.
    fn kind(&self) -> IndexKind;

    /// Adds a key → locator mapping.
    ///
    /// Re-inserting an existing pair is a no-op for ordered, clustered and
    /// hash indexes. Bitmap and inverted indexes hold one entry per locator
    /// and reject a locator that is already present with `DuplicateKey`.
    /// Constraint violations leave the index unchanged.
    fn insert(&self, key: &Key, locator: RowLocator) -> IndexResult<()>;

    /// Removes a key → locator mapping. Fails with `NotFound` if absent.
    fn delete(&self, key: &Key, locator: RowLocator) -> IndexResult<()>;

    /// Locators stored under exactly `key`.
    fn lookup_equal(&self, key: &Key) -> IndexResult<Vec<RowLocator>>;

    /// Locators whose keys fall within the bounds, in key order.
    fn range(&self, low: Bound<&Key>, high: Bound<&Key>) -> IndexResult<Vec<RowLocator>> {
        let _ = (low, high);
        Err(IndexError::unsupported(
            self.kind().as_str(),
            "range scans require an ordered index",
        ))
    }

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Returns true if the index holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    fn clear(&self);

    /// Verifies the structure's internal invariants.
    fn check_integrity(&self) -> IndexResult<()>;
}
