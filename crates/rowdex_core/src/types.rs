//! Core type definitions for Rowdex.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a row inside the table heap.
///
/// The heap assigns logical addresses densely, so the raw value is also the
/// row's position in the bitmap row space. Indexes never dereference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowLocator(pub u64);

impl RowLocator {
    /// Creates a new row locator.
    #[must_use]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw logical address.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row:{}", self.0)
    }
}

/// Stable identifier of an index within the catalog.
///
/// Index IDs are assigned at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexId(pub u64);

impl IndexId {
    /// Creates a new index ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idx:{}", self.0)
    }
}

/// Handle returned by `create_index` and used for all subsequent calls.
///
/// A handle stays valid until its index is dropped; using it afterwards
/// yields `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexHandle {
    pub(crate) id: IndexId,
}

impl IndexHandle {
    pub(crate) const fn new(id: IndexId) -> Self {
        Self { id }
    }

    /// Returns the index ID this handle refers to.
    #[must_use]
    pub const fn id(self) -> IndexId {
        self.id
    }
}
