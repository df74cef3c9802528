//! Index directory management.
//!
//! ```text
//! <dir>/
//! ├─ CATALOG           # Descriptor records
//! ├─ LOCK              # Advisory lock, one manager per directory
//! └─ snapshots/
//!    └─ <index-id>.idx # Snapshot of one index
//! ```

use crate::catalog::Catalog;
use crate::error::{IndexError, IndexResult};
use crate::types::IndexId;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const CATALOG_FILE: &str = "CATALOG";
const CATALOG_TEMP: &str = "CATALOG.tmp";
const LOCK_FILE: &str = "LOCK";
const SNAPSHOTS_DIR: &str = "snapshots";

/// An index directory held under an exclusive lock.
///
/// Only one `IndexDir` can exist per directory at a time; the lock is
/// released when the value is dropped.
#[derive(Debug)]
pub struct IndexDir {
    path: PathBuf,
    _lock_file: File,
}

impl IndexDir {
    /// Opens or creates an index directory.
    ///
    /// # Errors
    ///
    /// - `InvalidFormat` if the directory is missing and `create_if_missing`
    ///   is false, or the path is not a directory
    /// - `CatalogLocked` if another manager holds the directory
    pub fn open(path: &Path, create_if_missing: bool) -> IndexResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(IndexError::invalid_format(format!(
                    "index directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(IndexError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(IndexError::CatalogLocked);
        }

        fs::create_dir_all(path.join(SNAPSHOTS_DIR))?;

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the CATALOG file.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.path.join(CATALOG_FILE)
    }

    /// Returns the path of the snapshot for `id`.
    #[must_use]
    pub fn snapshot_path(&self, id: IndexId) -> PathBuf {
        self.path.join(SNAPSHOTS_DIR).join(format!("{}.idx", id.as_u64()))
    }

    /// Loads the catalog. Returns `None` for a new directory.
    pub fn load_catalog(&self) -> IndexResult<Option<Catalog>> {
        match read_optional(&self.catalog_path())? {
            Some(data) if !data.is_empty() => Catalog::decode(&data).map(Some),
            _ => Ok(None),
        }
    }

    /// Saves the catalog atomically.
    ///
    /// 1. Write to a temporary file and sync it
    /// 2. Rename it over CATALOG
    /// 3. Sync the directory so the rename is durable
    pub fn save_catalog(&self, catalog: &Catalog) -> IndexResult<()> {
        let data = catalog.encode()?;
        let temp_path = self.path.join(CATALOG_TEMP);
        write_synced(&temp_path, &data)?;
        fs::rename(&temp_path, self.catalog_path())?;
        debug!(indexes = catalog.records.len(), bytes = data.len(), "saved catalog");
        sync_dir(&self.path)
    }

    /// Reads the raw snapshot for `id`, if one exists.
    pub fn load_snapshot(&self, id: IndexId) -> IndexResult<Option<Vec<u8>>> {
        read_optional(&self.snapshot_path(id))
    }

    /// Writes the snapshot for `id` atomically.
    pub fn save_snapshot(&self, id: IndexId, data: &[u8]) -> IndexResult<()> {
        let path = self.snapshot_path(id);
        let temp_path = path.with_extension("idx.tmp");
        write_synced(&temp_path, data)?;
        fs::rename(&temp_path, &path)?;
        debug!(index = %id, bytes = data.len(), "saved snapshot");
        sync_dir(&self.path.join(SNAPSHOTS_DIR))
    }

    /// Deletes the snapshot for `id`. A missing snapshot is not an error.
    pub fn remove_snapshot(&self, id: IndexId) -> IndexResult<()> {
        match fs::remove_file(self.snapshot_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn read_optional(path: &Path) -> IndexResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_synced(path: &Path, data: &[u8]) -> IndexResult<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

/// Syncs a directory so renames inside it are durable.
#[cfg(unix)]
fn sync_dir(path: &Path) -> IndexResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

// NTFS journals metadata; directories cannot be opened for sync.
#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> IndexResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRecord;
    use crate::descriptor::{IndexDescriptor, IndexKind};
    use crate::key::ColumnType;
    use tempfile::TempDir;

    #[test]
    fn create_new_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("idx");

        let dir = IndexDir::open(&path, true).unwrap();
        assert!(path.join(LOCK_FILE).exists());
        assert!(path.join(SNAPSHOTS_DIR).is_dir());
        assert!(dir.load_catalog().unwrap().is_none());
    }

    #[test]
    fn missing_directory_without_create() {
        let temp = TempDir::new().unwrap();
        let result = IndexDir::open(&temp.path().join("nope"), false);
        assert!(matches!(result, Err(IndexError::InvalidFormat { .. })));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = TempDir::new().unwrap();
        let _first = IndexDir::open(temp.path(), true).unwrap();
        let second = IndexDir::open(temp.path(), true);
        assert!(matches!(second, Err(IndexError::CatalogLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        drop(IndexDir::open(temp.path(), true).unwrap());
        assert!(IndexDir::open(temp.path(), true).is_ok());
    }

    #[test]
    fn catalog_persists() {
        let temp = TempDir::new().unwrap();
        let catalog = Catalog {
            next_id: 2,
            records: vec![CatalogRecord {
                id: IndexId::new(1),
                descriptor: IndexDescriptor::new("a", "t", IndexKind::Ordered)
                    .column("x", ColumnType::Int),
            }],
        };
        {
            let dir = IndexDir::open(temp.path(), true).unwrap();
            dir.save_catalog(&catalog).unwrap();
            assert!(!temp.path().join(CATALOG_TEMP).exists());
        }
        let dir = IndexDir::open(temp.path(), true).unwrap();
        assert_eq!(dir.load_catalog().unwrap(), Some(catalog));
    }

    #[test]
    fn snapshot_files() {
        let temp = TempDir::new().unwrap();
        let dir = IndexDir::open(temp.path(), true).unwrap();
        let id = IndexId::new(4);

        assert!(dir.load_snapshot(id).unwrap().is_none());
        dir.save_snapshot(id, b"abc").unwrap();
        assert_eq!(dir.load_snapshot(id).unwrap().as_deref(), Some(&b"abc"[..]));
        dir.remove_snapshot(id).unwrap();
        dir.remove_snapshot(id).unwrap();
        assert!(dir.load_snapshot(id).unwrap().is_none());
    }
}
