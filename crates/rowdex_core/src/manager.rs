//! Index manager: the catalog of indexes and the entry point for all
//! index operations.
//!
//! The manager owns every descriptor and strategy instance. A call that
//! takes an [`IndexHandle`] resolves it under the catalog lock, releases the
//! lock, then runs against the index's own synchronization.
//!
//! An index whose structure fails an integrity check is marked unusable.
//! Every later call on it fails with `CorruptStructure` until
//! [`IndexManager::rebuild_index`] repopulates it from the heap.

use crate::catalog::{Catalog, CatalogRecord};
use crate::config::IndexConfig;
use crate::descriptor::{IndexDescriptor, IndexKind};
use crate::dir::IndexDir;
use crate::error::{IndexError, IndexResult};
use crate::heap::RowSource;
use crate::index::{BitOp, BitVector, BitmapIndex, Index, IndexInstance, Predicate};
use crate::key::{Key, Value};
use crate::persistence::Snapshot;
use crate::stats::IndexStats;
use crate::types::{IndexHandle, IndexId, RowLocator};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One index as held by the manager.
struct ManagedIndex {
    id: IndexId,
    descriptor: IndexDescriptor,
    instance: IndexInstance,
    poisoned: AtomicBool,
}

impl ManagedIndex {
    fn new(id: IndexId, descriptor: IndexDescriptor, config: &IndexConfig) -> Self {
        let instance = IndexInstance::build(&descriptor, config);
        Self {
            id,
            descriptor,
            instance,
            poisoned: AtomicBool::new(false),
        }
    }

    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn is_usable(&self) -> bool {
        !self.poisoned.load(Ordering::Acquire)
    }

    fn ensure_usable(&self) -> IndexResult<()> {
        if self.is_usable() {
            Ok(())
        } else {
            Err(IndexError::corrupt(
                self.name(),
                "index is marked unusable until rebuilt",
            ))
        }
    }

    fn unsupported(&self, operation: &str) -> IndexError {
        IndexError::unsupported(
            self.descriptor.kind.as_str(),
            format!("{operation} is not available on index '{}'", self.name()),
        )
    }

    fn bitmap(&self) -> IndexResult<&BitmapIndex> {
        match &self.instance {
            IndexInstance::Bitmap(index) => Ok(index),
            _ => Err(self.unsupported("bitmap lookup")),
        }
    }
}

#[derive(Default)]
struct CatalogState {
    next_id: u64,
    by_id: HashMap<IndexId, Arc<ManagedIndex>>,
    by_name: HashMap<String, IndexId>,
}

impl CatalogState {
    fn register(&mut self, entry: Arc<ManagedIndex>) {
        self.by_name.insert(entry.descriptor.name.clone(), entry.id);
        self.by_id.insert(entry.id, entry);
    }

    fn clustered_on(&self, table: &str) -> Option<&str> {
        self.by_id
            .values()
            .find(|e| e.descriptor.clustered && e.descriptor.table == table)
            .map(|e| e.name())
    }

    fn check_new(&self, descriptor: &IndexDescriptor) -> IndexResult<()> {
        if self.by_name.contains_key(&descriptor.name) {
            return Err(IndexError::DuplicateName {
                name: descriptor.name.clone(),
            });
        }
        if descriptor.clustered {
            if let Some(existing) = self.clustered_on(&descriptor.table) {
                return Err(IndexError::ClusteredIndexExists {
                    table: descriptor.table.clone(),
                    existing: existing.to_string(),
                });
            }
        }
        Ok(())
    }

    fn sorted(&self) -> Vec<Arc<ManagedIndex>> {
        let mut entries: Vec<_> = self.by_id.values().cloned().collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    fn to_catalog(&self) -> Catalog {
        Catalog {
            next_id: self.next_id,
            records: self
                .sorted()
                .into_iter()
                .map(|e| CatalogRecord {
                    id: e.id,
                    descriptor: e.descriptor.clone(),
                })
                .collect(),
        }
    }
}

/// Per-index summary, as reported by [`IndexManager::index_stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSummary {
    /// Catalog ID.
    pub id: IndexId,
    /// Index name.
    pub name: String,
    /// Indexed table.
    pub table: String,
    /// Strategy.
    pub kind: IndexKind,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Whether the index stores rows in its leaves.
    pub clustered: bool,
    /// Whether the index can serve requests.
    pub usable: bool,
    /// Stored entries (documents for inverted, live rows for bitmap).
    pub entries: usize,
    /// Tree height, for ordered indexes.
    pub height: Option<usize>,
    /// Bucket count, for hash indexes.
    pub buckets: Option<usize>,
    /// Current load factor, for hash indexes.
    pub load_factor: Option<f64>,
    /// Distinct values, for bitmap indexes.
    pub distinct_values: Option<usize>,
    /// Row-position space, for bitmap indexes.
    pub row_space: Option<u64>,
    /// Distinct terms, for inverted indexes.
    pub terms: Option<usize>,
}

/// The index subsystem.
///
/// # Example
///
/// ```
/// use rowdex_core::{ColumnType, IndexConfig, IndexDescriptor, IndexKind, IndexManager, Key, RowLocator};
///
/// let manager = IndexManager::new(IndexConfig::default());
/// let handle = manager
///     .create_index(
///         IndexDescriptor::new("users_email", "users", IndexKind::Hash)
///             .column("email", ColumnType::Text)
///             .unique(),
///     )
///     .unwrap();
///
/// let key = Key::single("ann@example.com");
/// manager.insert(handle, &key, RowLocator::new(0)).unwrap();
/// assert_eq!(manager.lookup_equal(handle, &key).unwrap(), vec![RowLocator::new(0)]);
/// assert!(manager.insert(handle, &key, RowLocator::new(1)).is_err());
/// ```
pub struct IndexManager {
    config: IndexConfig,
    heap: Option<Arc<dyn RowSource>>,
    dir: Mutex<Option<IndexDir>>,
    catalog: RwLock<CatalogState>,
    stats: IndexStats,
    is_open: RwLock<bool>,
}

impl IndexManager {
    /// Creates an in-memory manager with no heap and no persistence.
    pub fn new(config: IndexConfig) -> Self {
        Self::build(config, None, None, CatalogState::default())
    }

    /// Creates an in-memory manager that backfills new indexes from `heap`.
    pub fn with_heap(config: IndexConfig, heap: Arc<dyn RowSource>) -> Self {
        Self::build(config, Some(heap), None, CatalogState::default())
    }

    fn build(
        config: IndexConfig,
        heap: Option<Arc<dyn RowSource>>,
        dir: Option<IndexDir>,
        mut state: CatalogState,
    ) -> Self {
        state.next_id = state.next_id.max(1);
        Self {
            config,
            heap,
            dir: Mutex::new(dir),
            catalog: RwLock::new(state),
            stats: IndexStats::new(),
            is_open: RwLock::new(true),
        }
    }

    /// Opens the index directory at `path`.
    ///
    /// Every catalogued index is reconstructed from its snapshot, or from
    /// `heap` when the snapshot is missing or unreadable. With
    /// `validate_on_open`, each index is then checked against the heap and
    /// rebuilt if inconsistent; an index that still fails is marked
    /// unusable rather than failing the open.
    pub fn open(path: &Path, config: IndexConfig, heap: Option<Arc<dyn RowSource>>) -> IndexResult<Self> {
        let dir = IndexDir::open(path, config.create_if_missing)?;
        let catalog = dir.load_catalog()?.unwrap_or_default();

        let mut state = CatalogState {
            next_id: catalog.next_id,
            ..CatalogState::default()
        };
        for record in catalog.records {
            let entry = ManagedIndex::new(record.id, record.descriptor, &config);
            load_entry(&entry, &dir, heap.as_deref(), &config);
            state.next_id = state.next_id.max(record.id.as_u64() + 1);
            state.register(Arc::new(entry));
        }

        info!(
            path = %path.display(),
            indexes = state.by_id.len(),
            "opened index directory"
        );
        let manager = Self::build(config, heap, Some(dir), state);
        let poisoned = manager
            .catalog
            .read()
            .by_id
            .values()
            .filter(|e| !e.is_usable())
            .count();
        for _ in 0..poisoned {
            manager.stats.record_corruption();
        }
        Ok(manager)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Returns the manager-wide counters.
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Checks if the manager is open.
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> IndexResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(IndexError::ManagerClosed)
        }
    }

    fn resolve(&self, handle: IndexHandle) -> IndexResult<Arc<ManagedIndex>> {
        self.ensure_open()?;
        self.catalog
            .read()
            .by_id
            .get(&handle.id())
            .cloned()
            .ok_or_else(|| IndexError::not_found(format!("index {}", handle.id())))
    }

    fn save_catalog(&self) -> IndexResult<()> {
        let dir = self.dir.lock();
        if let Some(dir) = dir.as_ref() {
            let catalog = self.catalog.read().to_catalog();
            dir.save_catalog(&catalog)?;
        }
        Ok(())
    }

    /// Marks an index unusable after `err` revealed corruption.
    fn poison(&self, entry: &ManagedIndex, err: &IndexError) {
        if !entry.poisoned.swap(true, Ordering::AcqRel) {
            self.stats.record_corruption();
            error!(index = %entry.name(), error = %err, "index marked unusable");
        }
    }

    fn read<T>(
        &self,
        handle: IndexHandle,
        f: impl FnOnce(&ManagedIndex) -> IndexResult<T>,
    ) -> IndexResult<T> {
        let entry = self.resolve(handle)?;
        entry.ensure_usable()?;
        self.stats.record_lookup();
        let result = f(&entry);
        if let Err(err) = &result {
            if err.is_corruption() {
                self.poison(&entry, err);
            }
        }
        result
    }

    fn write(
        &self,
        handle: IndexHandle,
        f: impl FnOnce(&ManagedIndex) -> IndexResult<()>,
    ) -> IndexResult<()> {
        let entry = self.resolve(handle)?;
        entry.ensure_usable()?;
        let result = f(&entry);
        match &result {
            Ok(()) => self.stats.record_update(),
            Err(err) if err.is_corruption() => self.poison(&entry, err),
            Err(_) => self.stats.record_rejected_write(),
        }
        result
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Creates an index and backfills it from the heap.
    ///
    /// # Errors
    ///
    /// - `DuplicateName` if an index with the same name exists
    /// - `ClusteredIndexExists` if the table already has a clustered index
    /// - `UnsupportedColumnType` if the strategy cannot index the columns,
    ///   including a bitmap backfill that exceeds the cardinality ceiling
    /// - `DuplicateKey` if a unique index meets duplicate heap rows
    ///
    /// On error no index is created.
    pub fn create_index(&self, descriptor: IndexDescriptor) -> IndexResult<IndexHandle> {
        self.ensure_open()?;
        descriptor.validate()?;
        self.catalog.read().check_new(&descriptor)?;

        // The ID is provisional until the index is registered.
        let entry = ManagedIndex::new(IndexId::new(0), descriptor, &self.config);
        if let Some(heap) = self.heap.as_deref() {
            populate(&entry, heap)?;
        }

        let handle = {
            let mut state = self.catalog.write();
            state.check_new(&entry.descriptor)?;
            let id = IndexId::new(state.next_id);
            state.next_id += 1;
            let entry = ManagedIndex { id, ..entry };
            info!(
                index = %entry.name(),
                table = %entry.descriptor.table,
                kind = %entry.descriptor.kind,
                entries = entry.instance.as_index().len(),
                "created index"
            );
            state.register(Arc::new(entry));
            IndexHandle::new(id)
        };
        self.save_catalog()?;
        Ok(handle)
    }

    /// Drops an index by name.
    pub fn drop_index(&self, name: &str) -> IndexResult<()> {
        self.ensure_open()?;
        let entry = {
            let mut state = self.catalog.write();
            let id = state
                .by_name
                .remove(name)
                .ok_or_else(|| IndexError::not_found(format!("index '{name}'")))?;
            state.by_id.remove(&id)
        };
        self.save_catalog()?;
        if let (Some(entry), Some(dir)) = (entry, self.dir.lock().as_ref()) {
            dir.remove_snapshot(entry.id)?;
        }
        info!(index = %name, "dropped index");
        Ok(())
    }

    /// Looks up the handle of a named index.
    pub fn handle(&self, name: &str) -> IndexResult<IndexHandle> {
        self.ensure_open()?;
        self.catalog
            .read()
            .by_name
            .get(name)
            .map(|&id| IndexHandle::new(id))
            .ok_or_else(|| IndexError::not_found(format!("index '{name}'")))
    }

    /// Returns the descriptor of an index.
    pub fn descriptor(&self, handle: IndexHandle) -> IndexResult<IndexDescriptor> {
        Ok(self.resolve(handle)?.descriptor.clone())
    }

    /// Returns every descriptor in creation order.
    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.catalog
            .read()
            .sorted()
            .into_iter()
            .map(|e| e.descriptor.clone())
            .collect()
    }

    /// Summarizes one index.
    pub fn index_stats(&self, handle: IndexHandle) -> IndexResult<IndexSummary> {
        let entry = self.resolve(handle)?;
        let desc = &entry.descriptor;
        let mut summary = IndexSummary {
            id: entry.id,
            name: desc.name.clone(),
            table: desc.table.clone(),
            kind: desc.kind,
            unique: desc.unique,
            clustered: desc.clustered,
            usable: entry.is_usable(),
            entries: entry.instance.as_index().len(),
            height: None,
            buckets: None,
            load_factor: None,
            distinct_values: None,
            row_space: None,
            terms: None,
        };
        match &entry.instance {
            IndexInstance::Ordered(index) => summary.height = index.height().ok(),
            IndexInstance::Clustered(index) => summary.height = index.height().ok(),
            IndexInstance::Hash(index) => {
                summary.buckets = Some(index.bucket_count());
                summary.load_factor = Some(index.load_factor());
            }
            IndexInstance::Bitmap(index) => {
                summary.distinct_values = Some(index.distinct_values());
                summary.row_space = Some(index.row_space());
            }
            IndexInstance::Inverted(index) => summary.terms = Some(index.term_count()),
        }
        Ok(summary)
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Adds `key → locator`.
    ///
    /// For an inverted index the key is a single text value; for a bitmap
    /// index the locator is the row position.
    pub fn insert(&self, handle: IndexHandle, key: &Key, locator: RowLocator) -> IndexResult<()> {
        self.write(handle, |entry| {
            entry.descriptor.check_key(key)?;
            if let (IndexInstance::Bitmap(_), Some(heap)) = (&entry.instance, self.heap.as_deref()) {
                let table = &entry.descriptor.table;
                let row_count = heap.row_count(table)?;
                if locator.as_u64() >= row_count {
                    return Err(IndexError::not_found(format!(
                        "{locator} in table '{table}', which has {row_count} row addresses"
                    )));
                }
            }
            entry.instance.as_index().insert(key, locator)
        })
    }

    /// Stores a full row in a clustered index.
    pub fn insert_row(
        &self,
        handle: IndexHandle,
        key: &Key,
        locator: RowLocator,
        values: Vec<Value>,
    ) -> IndexResult<()> {
        self.write(handle, |entry| {
            entry.descriptor.check_key(key)?;
            match &entry.instance {
                IndexInstance::Clustered(index) => index.insert_row(key, locator, values),
                _ => Err(entry.unsupported("row storage")),
            }
        })
    }

    /// Removes `key → locator`.
    ///
    /// Bitmap and inverted indexes remove by locator alone and ignore the key.
    pub fn delete(&self, handle: IndexHandle, key: &Key, locator: RowLocator) -> IndexResult<()> {
        self.write(handle, |entry| entry.instance.as_index().delete(key, locator))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Locators stored under exactly `key`.
    pub fn lookup_equal(&self, handle: IndexHandle, key: &Key) -> IndexResult<Vec<RowLocator>> {
        self.read(handle, |entry| {
            entry.descriptor.check_key(key)?;
            entry.instance.as_index().lookup_equal(key)
        })
    }

    /// Locators whose keys fall within the bounds, in key order.
    ///
    /// Only ordered indexes support ranges.
    pub fn range(
        &self,
        handle: IndexHandle,
        low: Bound<&Key>,
        high: Bound<&Key>,
    ) -> IndexResult<Vec<RowLocator>> {
        self.read(handle, |entry| entry.instance.as_index().range(low, high))
    }

    /// Documents containing `term`.
    pub fn lookup_term(&self, handle: IndexHandle, term: &str) -> IndexResult<Vec<RowLocator>> {
        self.read(handle, |entry| match &entry.instance {
            IndexInstance::Inverted(index) => Ok(index.lookup_term(term)),
            _ => Err(entry.unsupported("term lookup")),
        })
    }

    /// Documents containing every term.
    pub fn lookup_all<S: AsRef<str>>(
        &self,
        handle: IndexHandle,
        terms: &[S],
    ) -> IndexResult<Vec<RowLocator>> {
        self.read(handle, |entry| match &entry.instance {
            IndexInstance::Inverted(index) => Ok(index.lookup_all(terms)),
            _ => Err(entry.unsupported("term lookup")),
        })
    }

    /// Documents containing any of the terms.
    pub fn lookup_any<S: AsRef<str>>(
        &self,
        handle: IndexHandle,
        terms: &[S],
    ) -> IndexResult<Vec<RowLocator>> {
        self.read(handle, |entry| match &entry.instance {
            IndexInstance::Inverted(index) => Ok(index.lookup_any(terms)),
            _ => Err(entry.unsupported("term lookup")),
        })
    }

    /// Documents containing a term that starts with `prefix`.
    pub fn lookup_prefix(&self, handle: IndexHandle, prefix: &str) -> IndexResult<Vec<RowLocator>> {
        self.read(handle, |entry| match &entry.instance {
            IndexInstance::Inverted(index) => Ok(index.lookup_prefix(prefix)),
            _ => Err(entry.unsupported("prefix lookup")),
        })
    }

    /// Live row positions holding `value`.
    pub fn lookup_bitmap(&self, handle: IndexHandle, value: &Value) -> IndexResult<BitVector> {
        self.read(handle, |entry| Ok(entry.bitmap()?.lookup_bitmap(value)))
    }

    /// Combines bit-vectors from one bitmap index.
    pub fn lookup_combine(
        &self,
        handle: IndexHandle,
        vectors: &[BitVector],
        op: BitOp,
    ) -> IndexResult<BitVector> {
        self.read(handle, |entry| entry.bitmap()?.lookup_combine(vectors, op))
    }

    /// Evaluates a predicate against one bitmap snapshot.
    pub fn evaluate(&self, handle: IndexHandle, predicate: &Predicate) -> IndexResult<BitVector> {
        self.read(handle, |entry| Ok(entry.bitmap()?.evaluate(predicate)))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Verifies the structure of one index, marking it unusable on failure.
    pub fn check_integrity(&self, handle: IndexHandle) -> IndexResult<()> {
        let entry = self.resolve(handle)?;
        entry.ensure_usable()?;
        let result = validate(&entry, self.heap.as_deref());
        if let Err(err) = &result {
            if err.is_corruption() {
                self.poison(&entry, err);
            }
        }
        result
    }

    /// Verifies every usable index and reports the result per name.
    pub fn verify_all(&self) -> Vec<(String, IndexResult<()>)> {
        let entries = self.catalog.read().sorted();
        entries
            .into_iter()
            .map(|entry| {
                let name = entry.name().to_string();
                (name, self.check_integrity(IndexHandle::new(entry.id)))
            })
            .collect()
    }

    /// Repopulates an index from the heap and makes it usable again.
    ///
    /// The new contents are built and validated off to the side, then
    /// swapped in. On error the index keeps its previous contents and
    /// usability.
    pub fn rebuild_index(&self, handle: IndexHandle) -> IndexResult<()> {
        let entry = self.resolve(handle)?;
        let heap = self
            .heap
            .as_deref()
            .ok_or_else(|| entry.unsupported("rebuild without a row source"))?;

        let fresh = ManagedIndex::new(entry.id, entry.descriptor.clone(), &self.config);
        if let Err(err) = populate(&fresh, heap).and_then(|()| validate(&fresh, Some(heap))) {
            warn!(index = %entry.name(), error = %err, "rebuild failed; index left as it was");
            return Err(err);
        }

        let entries = fresh.instance.as_index().len();
        {
            let mut state = self.catalog.write();
            if !state.by_id.contains_key(&entry.id) {
                return Err(IndexError::not_found(format!("index {}", entry.id)));
            }
            state.register(Arc::new(fresh));
        }
        self.stats.record_rebuild();
        info!(index = %entry.name(), entries, "rebuilt index");
        Ok(())
    }

    /// Writes the catalog and a snapshot of every usable index.
    ///
    /// Does nothing for an in-memory manager.
    pub fn flush(&self) -> IndexResult<()> {
        self.ensure_open()?;
        self.flush_inner()
    }

    fn flush_inner(&self) -> IndexResult<()> {
        let dir = self.dir.lock();
        let Some(dir) = dir.as_ref() else {
            return Ok(());
        };
        let (catalog, entries) = {
            let state = self.catalog.read();
            (state.to_catalog(), state.sorted())
        };
        dir.save_catalog(&catalog)?;
        for entry in entries.iter().filter(|e| e.is_usable()) {
            let snapshot = Snapshot::capture(entry.id, entry.name(), &entry.instance)?;
            dir.save_snapshot(entry.id, &snapshot.encode()?)?;
        }
        debug!(indexes = entries.len(), "flushed index directory");
        Ok(())
    }

    /// Flushes and releases the directory lock.
    ///
    /// Later calls fail with `ManagerClosed`. Closing twice is a no-op.
    pub fn close(&self) -> IndexResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.flush_inner()?;
        self.dir.lock().take();
        *is_open = false;
        Ok(())
    }
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("indexes", &self.catalog.read().by_id.len())
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Drop for IndexManager {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close index manager");
        }
    }
}

/// Restores one catalogued index on open, rebuilding or poisoning as needed.
fn load_entry(entry: &ManagedIndex, dir: &IndexDir, heap: Option<&dyn RowSource>, config: &IndexConfig) {
    let restored = match restore_snapshot(entry, dir) {
        Ok(restored) => restored,
        Err(err) => {
            warn!(index = %entry.name(), error = %err, "discarding unreadable snapshot");
            entry.instance.as_index().clear();
            false
        }
    };

    if !restored {
        match heap {
            Some(heap) => {
                if let Err(err) = populate(entry, heap) {
                    entry.poisoned.store(true, Ordering::Release);
                    error!(index = %entry.name(), error = %err, "rebuild from heap failed");
                    return;
                }
                debug!(index = %entry.name(), "rebuilt index from heap");
            }
            None => debug!(index = %entry.name(), "no snapshot and no row source; index starts empty"),
        }
    }

    let heap_for_checks = if config.validate_on_open { heap } else { None };
    if let Err(err) = validate(entry, heap_for_checks) {
        let Some(heap) = heap.filter(|_| restored) else {
            entry.poisoned.store(true, Ordering::Release);
            error!(index = %entry.name(), error = %err, "index marked unusable");
            return;
        };
        warn!(index = %entry.name(), error = %err, "snapshot inconsistent with heap, rebuilding");
        if let Err(err) = populate(entry, heap).and_then(|()| validate(entry, Some(heap))) {
            entry.poisoned.store(true, Ordering::Release);
            error!(index = %entry.name(), error = %err, "index marked unusable");
        }
    }
}

fn restore_snapshot(entry: &ManagedIndex, dir: &IndexDir) -> IndexResult<bool> {
    let Some(bytes) = dir.load_snapshot(entry.id)? else {
        return Ok(false);
    };
    let snapshot = Snapshot::decode(&bytes)?;
    if snapshot.index_id != entry.id {
        return Err(IndexError::invalid_format(format!(
            "snapshot belongs to {}, expected {}",
            snapshot.index_id, entry.id
        )));
    }
    snapshot.restore_into(&entry.instance)?;
    Ok(true)
}

/// Replaces an index's contents with the live rows of its table.
fn populate(entry: &ManagedIndex, heap: &dyn RowSource) -> IndexResult<()> {
    let desc = &entry.descriptor;
    let index = entry.instance.as_index();
    index.clear();

    match &entry.instance {
        IndexInstance::Clustered(clustered) => {
            let columns = heap.columns(&desc.table)?;
            let positions = desc
                .columns
                .iter()
                .map(|col| {
                    columns.iter().position(|c| *c == col.name).ok_or_else(|| {
                        IndexError::not_found(format!("column '{}' in table '{}'", col.name, desc.table))
                    })
                })
                .collect::<IndexResult<Vec<_>>>()?;
            for row in heap.scan(&desc.table, &[])? {
                let key = positions
                    .iter()
                    .map(|&p| row.values.get(p).cloned())
                    .collect::<Option<Vec<_>>>()
                    .map(Key::new)
                    .ok_or_else(|| {
                        IndexError::invalid_key(format!("{} is missing indexed columns", row.locator))
                    })?;
                desc.check_key(&key)?;
                clustered.insert_row(&key, row.locator, row.values)?;
            }
        }
        instance => {
            for row in heap.scan(&desc.table, &desc.column_names())? {
                let key = Key::new(row.values);
                desc.check_key(&key)?;
                index.insert(&key, row.locator)?;
            }
            if let IndexInstance::Bitmap(bitmap) = instance {
                bitmap.extend_row_space(heap.row_count(&desc.table)?)?;
            }
        }
    }
    Ok(())
}

/// Checks the structure and, given a heap, its consistency with the table.
fn validate(entry: &ManagedIndex, heap: Option<&dyn RowSource>) -> IndexResult<()> {
    let index = entry.instance.as_index();
    index.check_integrity()?;
    let Some(heap) = heap else {
        return Ok(());
    };

    let desc = &entry.descriptor;
    let live = heap.scan(&desc.table, &desc.column_names())?;
    let mismatch = |message: String| IndexError::corrupt(entry.name(), message);
    match &entry.instance {
        IndexInstance::Bitmap(bitmap) => {
            let row_count = heap.row_count(&desc.table)?;
            if bitmap.row_space() != row_count {
                return Err(mismatch(format!(
                    "row space is {}, heap holds {row_count} rows",
                    bitmap.row_space()
                )));
            }
            if bitmap.live_rows() != live.len() as u64 {
                return Err(mismatch(format!(
                    "{} live positions, heap holds {} live rows",
                    bitmap.live_rows(),
                    live.len()
                )));
            }
        }
        IndexInstance::Inverted(inverted) => {
            let mut locators: Vec<_> = live.iter().map(|row| row.locator).collect();
            locators.sort_unstable();
            if inverted.document_locators() != locators {
                return Err(mismatch(format!(
                    "reverse index covers {} documents, heap holds {} live rows",
                    inverted.document_count(),
                    locators.len()
                )));
            }
        }
        _ => {
            if index.len() != live.len() {
                return Err(mismatch(format!(
                    "{} entries, heap holds {} live rows",
                    index.len(),
                    live.len()
                )));
            }
        }
    }
    Ok(())
}
