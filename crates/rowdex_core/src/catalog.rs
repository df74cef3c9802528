//! Persisted catalog of index descriptors.

use crate::descriptor::IndexDescriptor;
use crate::error::IndexResult;
use crate::persistence::{decode_frame, encode_frame};
use crate::types::IndexId;
use serde::{Deserialize, Serialize};

/// Magic bytes for the catalog file: "RDXC".
pub const CATALOG_MAGIC: [u8; 4] = *b"RDXC";

/// Current catalog version.
pub const CATALOG_VERSION: u16 = 1;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Stable index ID.
    pub id: IndexId,
    /// Index definition.
    pub descriptor: IndexDescriptor,
}

/// Every index definition, keyed by name.
///
/// The catalog stores:
/// - Next index ID to assign
/// - One descriptor record per index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Next index ID to assign. IDs are never reused.
    pub next_id: u64,
    /// Records sorted by index ID.
    pub records: Vec<CatalogRecord>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

impl Catalog {
    /// Looks up a record by index name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogRecord> {
        self.records.iter().find(|r| r.descriptor.name == name)
    }

    /// Encodes the catalog to bytes.
    pub fn encode(&self) -> IndexResult<Vec<u8>> {
        encode_frame(CATALOG_MAGIC, CATALOG_VERSION, self)
    }

    /// Decodes a catalog from bytes.
    pub fn decode(data: &[u8]) -> IndexResult<Self> {
        decode_frame(CATALOG_MAGIC, CATALOG_VERSION, data)
    }
}
