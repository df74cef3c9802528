//! The table heap as seen from the index subsystem.
//!
//! Indexes never read rows on their own. When an index must be backfilled,
//! rebuilt or validated, the manager asks a [`RowSource`] for the live rows
//! of a table.

use crate::error::{IndexError, IndexResult};
use crate::key::Value;
use crate::types::RowLocator;
use parking_lot::RwLock;
use std::collections::HashMap;

/// One live row returned by a heap scan.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapRow {
    /// Logical address of the row.
    pub locator: RowLocator,
    /// Requested column values, in request order.
    pub values: Vec<Value>,
}

/// Read access to the table heap.
pub trait RowSource: Send + Sync {
    /// Number of logical addresses ever assigned in `table`, live or not.
    fn row_count(&self, table: &str) -> IndexResult<u64>;

    /// Column names of `table`, in storage order.
    fn columns(&self, table: &str) -> IndexResult<Vec<String>>;

    /// Live rows of `table` in locator order, projected onto `columns`.
    ///
    /// An empty column list selects every column.
    fn scan(&self, table: &str, columns: &[String]) -> IndexResult<Vec<HeapRow>>;
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<String>,
    /// Indexed by locator; `None` marks a deleted row.
    rows: Vec<Option<Vec<Value>>>,
}

impl MemoryTable {
    fn positions(&self, table: &str, columns: &[String]) -> IndexResult<Vec<usize>> {
        if columns.is_empty() {
            return Ok((0..self.columns.len()).collect());
        }
        columns
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| IndexError::not_found(format!("column '{name}' in table '{table}'")))
            })
            .collect()
    }
}

/// An in-memory heap with dense row addresses.
///
/// Used by tests, benchmarks and tools that have no real heap at hand.
#[derive(Debug, Default)]
pub struct MemoryHeap {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemoryHeap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table. Recreating an existing table is a no-op.
    pub fn create_table<S: Into<String>>(&self, table: &str, columns: impl IntoIterator<Item = S>) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_insert_with(|| MemoryTable {
                columns: columns.into_iter().map(Into::into).collect(),
                rows: Vec::new(),
            });
    }

    /// Appends a row and returns its locator.
    pub fn insert(&self, table: &str, values: Vec<Value>) -> IndexResult<RowLocator> {
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| IndexError::not_found(format!("table '{table}'")))?;
        if values.len() != t.columns.len() {
            return Err(IndexError::invalid_key(format!(
                "table '{table}' has {} columns, row has {}",
                t.columns.len(),
                values.len()
            )));
        }
        let locator = RowLocator::new(t.rows.len() as u64);
        t.rows.push(Some(values));
        Ok(locator)
    }

    /// Deletes a row and returns its values.
    pub fn delete(&self, table: &str, locator: RowLocator) -> IndexResult<Vec<Value>> {
        let mut tables = self.tables.write();
        tables
            .get_mut(table)
            .and_then(|t| t.rows.get_mut(locator.as_u64() as usize))
            .and_then(Option::take)
            .ok_or_else(|| IndexError::not_found(format!("{locator} in table '{table}'")))
    }

    /// Returns the values of a live row.
    pub fn get(&self, table: &str, locator: RowLocator) -> Option<Vec<Value>> {
        let tables = self.tables.read();
        tables
            .get(table)
            .and_then(|t| t.rows.get(locator.as_u64() as usize))
            .and_then(Clone::clone)
    }
}

impl RowSource for MemoryHeap {
    fn row_count(&self, table: &str) -> IndexResult<u64> {
        let tables = self.tables.read();
        tables
            .get(table)
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| IndexError::not_found(format!("table '{table}'")))
    }

    fn columns(&self, table: &str) -> IndexResult<Vec<String>> {
        let tables = self.tables.read();
        tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| IndexError::not_found(format!("table '{table}'")))
    }

    fn scan(&self, table: &str, columns: &[String]) -> IndexResult<Vec<HeapRow>> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| IndexError::not_found(format!("table '{table}'")))?;
        let positions = t.positions(table, columns)?;
        Ok(t.rows
            .iter()
            .enumerate()
            .filter_map(|(addr, row)| {
                row.as_ref().map(|values| HeapRow {
                    locator: RowLocator::new(addr as u64),
                    values: positions.iter().map(|&p| values[p].clone()).collect(),
                })
            })
            .collect())
    }
}
