//! CLI command implementations.

pub mod inspect;
pub mod verify;

use rowdex_core::{
    Catalog, CatalogRecord, IndexConfig, IndexDir, IndexError, IndexInstance, IndexResult, Snapshot,
};
use std::path::Path;

/// Opens an existing index directory and reads its catalog.
///
/// Holding the directory lock keeps a running manager from rewriting
/// files underneath us.
pub fn open_catalog(path: &Path) -> Result<(IndexDir, Catalog), Box<dyn std::error::Error>> {
    let dir = IndexDir::open(path, false)?;
    let catalog = dir
        .load_catalog()?
        .ok_or_else(|| format!("No index catalog found at {}", path.display()))?;
    Ok((dir, catalog))
}

/// Loads the snapshot of `record` into a fresh instance.
///
/// Returns `Ok(None)` when the index has no snapshot yet.
pub fn load_instance(dir: &IndexDir, record: &CatalogRecord) -> IndexResult<Option<IndexInstance>> {
    let Some(bytes) = dir.load_snapshot(record.id)? else {
        return Ok(None);
    };
    let snapshot = Snapshot::decode(&bytes)?;
    if snapshot.index_id != record.id {
        return Err(IndexError::invalid_format(format!(
            "snapshot belongs to {}, catalog says {}",
            snapshot.index_id, record.id
        )));
    }
    // Inspection must accept whatever ceiling the writer was configured with.
    let config = IndexConfig::default().bitmap_cardinality_ceiling(usize::MAX);
    let instance = IndexInstance::build(&record.descriptor, &config);
    snapshot.restore_into(&instance)?;
    Ok(Some(instance))
}
