//! Index snapshots and the checksummed frame shared with the catalog.
//!
//! ## Frame
//!
//! ```text
//! magic:    [u8; 4]
//! version:  u16 LE
//! length:   u32 LE   // payload bytes
//! checksum: u32 LE   // CRC32 of payload
//! payload:  CBOR
//! ```
//!
//! Snapshots are an optimization, not the source of truth: every index can
//! be rebuilt from the heap, so a missing or damaged snapshot triggers a
//! rebuild rather than an error.

use crate::error::{IndexError, IndexResult};
use crate::index::{BitmapImage, ClusteredRow, IndexInstance, InvertedImage};
use crate::key::{Key, Value};
use crate::types::{IndexId, RowLocator};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Magic bytes for snapshot files: "RDXS".
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"RDXS";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 4 + 4;

/// Wraps a CBOR-encoded `value` in a checksummed frame.
pub fn encode_frame<T: Serialize>(magic: [u8; 4], version: u16, value: &T) -> IndexResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(value, &mut payload)
        .map_err(|e| IndexError::invalid_format(format!("CBOR encoding failed: {e:?}")))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| IndexError::invalid_format("payload exceeds 4 GiB"))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&magic);
    buf.extend_from_slice(&version.to_le_bytes());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Verifies a frame and decodes its payload.
pub fn decode_frame<T: DeserializeOwned>(magic: [u8; 4], max_version: u16, data: &[u8]) -> IndexResult<T> {
    if data.len() < HEADER_LEN {
        return Err(IndexError::invalid_format("frame too short"));
    }
    if data[0..4] != magic {
        return Err(IndexError::invalid_format(format!(
            "bad magic {:?}, expected {:?}",
            &data[0..4],
            magic
        )));
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version == 0 || version > max_version {
        return Err(IndexError::invalid_format(format!(
            "unsupported format version: {version}"
        )));
    }
    let length = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
    let checksum = u32::from_le_bytes([data[10], data[11], data[12], data[13]]);

    let payload = &data[HEADER_LEN..];
    if payload.len() != length {
        return Err(IndexError::invalid_format(format!(
            "payload is {} bytes, header says {length}",
            payload.len()
        )));
    }
    let actual = crc32fast::hash(payload);
    if actual != checksum {
        return Err(IndexError::invalid_format(format!(
            "checksum mismatch: stored {checksum:#010x}, computed {actual:#010x}"
        )));
    }
    ciborium::from_reader(payload)
        .map_err(|e| IndexError::invalid_format(format!("CBOR decoding failed: {e:?}")))
}

/// Contents of one index, by strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SnapshotBody {
    /// Ordered index entries in key order.
    Ordered(Vec<(Key, RowLocator)>),
    /// Clustered index entries in key order.
    Clustered(Vec<(Key, RowLocator, Vec<Value>)>),
    /// Hash index entries.
    Hash(Vec<(Key, RowLocator)>),
    /// Bitmap vectors and tombstones.
    Bitmap(BitmapImage),
    /// Inverted index reverse map.
    Inverted(InvertedImage),
}

/// A persisted image of one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Catalog ID of the index.
    pub index_id: IndexId,
    /// Index name at capture time.
    pub name: String,
    /// Structure contents.
    pub body: SnapshotBody,
}

impl Snapshot {
    /// Captures the current contents of `instance`.
    pub fn capture(index_id: IndexId, name: &str, instance: &IndexInstance) -> IndexResult<Self> {
        let body = match instance {
            IndexInstance::Ordered(index) => SnapshotBody::Ordered(index.scan_ordered()?),
            IndexInstance::Clustered(index) => SnapshotBody::Clustered(
                index
                    .scan_ordered()?
                    .into_iter()
                    .map(|(key, row)| (key, row.locator, row.values))
                    .collect(),
            ),
            IndexInstance::Hash(index) => SnapshotBody::Hash(index.entries()),
            IndexInstance::Bitmap(index) => SnapshotBody::Bitmap(index.image()),
            IndexInstance::Inverted(index) => SnapshotBody::Inverted(index.image()),
        };
        Ok(Self {
            index_id,
            name: name.to_string(),
            body,
        })
    }

    /// Loads the snapshot into an empty `instance` of the same strategy.
    pub fn restore_into(self, instance: &IndexInstance) -> IndexResult<()> {
        match (instance, self.body) {
            (IndexInstance::Ordered(index), SnapshotBody::Ordered(entries)) => index.rebuild(entries),
            (IndexInstance::Clustered(index), SnapshotBody::Clustered(entries)) => index.rebuild(
                entries
                    .into_iter()
                    .map(|(key, locator, values)| (key, ClusteredRow { locator, values })),
            ),
            (IndexInstance::Hash(index), SnapshotBody::Hash(entries)) => index.rebuild(entries),
            (IndexInstance::Bitmap(index), SnapshotBody::Bitmap(image)) => index.restore(image),
            (IndexInstance::Inverted(index), SnapshotBody::Inverted(image)) => index.restore(image),
            _ => Err(IndexError::invalid_format(format!(
                "snapshot of '{}' does not match the index strategy",
                self.name
            ))),
        }
    }

    /// Encodes the snapshot as a frame.
    pub fn encode(&self) -> IndexResult<Vec<u8>> {
        encode_frame(SNAPSHOT_MAGIC, SNAPSHOT_VERSION, self)
    }

    /// Decodes a snapshot frame.
    pub fn decode(data: &[u8]) -> IndexResult<Self> {
        decode_frame(SNAPSHOT_MAGIC, SNAPSHOT_VERSION, data)
    }
}
