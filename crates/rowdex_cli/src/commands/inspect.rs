//! Inspect command implementation.

use super::{load_instance, open_catalog};
use rowdex_core::{CatalogRecord, Index, IndexDir, IndexInstance, IndexKind};
use serde::Serialize;
use std::path::Path;

/// Index directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Directory path.
    pub path: String,
    /// Next index ID the catalog will assign.
    pub next_id: u64,
    /// Catalogued indexes.
    pub indexes: Vec<IndexReport>,
}

/// Report for a single index.
#[derive(Debug, Serialize)]
pub struct IndexReport {
    /// Catalog ID.
    pub id: u64,
    /// Index name.
    pub name: String,
    /// Indexed table.
    pub table: String,
    /// Strategy.
    pub kind: IndexKind,
    /// Indexed columns, in key order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Whether the index is clustered.
    pub clustered: bool,
    /// Snapshot file size in bytes, if one exists.
    pub snapshot_size: Option<u64>,
    /// Structure details (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IndexDetails>,
}

/// Structure details loaded from a snapshot.
#[derive(Debug, Default, Serialize)]
pub struct IndexDetails {
    /// Stored entries.
    pub entries: usize,
    /// Tree height (ordered).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<usize>,
    /// Bucket count (hash).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buckets: Option<usize>,
    /// Distinct values (bitmap).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct_values: Option<usize>,
    /// Row-position space (bitmap).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_space: Option<u64>,
    /// Distinct terms (inverted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<usize>,
    /// Error raised while loading the snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, detailed: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, detailed)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Builds the inspection report without printing it.
pub fn inspect(path: &Path, detailed: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let (dir, catalog) = open_catalog(path)?;

    let mut indexes = Vec::with_capacity(catalog.records.len());
    for record in &catalog.records {
        let snapshot_size = std::fs::metadata(dir.snapshot_path(record.id))
            .ok()
            .map(|m| m.len());
        let details = detailed.then(|| describe(&dir, record));
        let desc = &record.descriptor;
        indexes.push(IndexReport {
            id: record.id.as_u64(),
            name: desc.name.clone(),
            table: desc.table.clone(),
            kind: desc.kind,
            columns: desc.column_names(),
            unique: desc.unique,
            clustered: desc.clustered,
            snapshot_size,
            details,
        });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        next_id: catalog.next_id,
        indexes,
    })
}

fn describe(dir: &IndexDir, record: &CatalogRecord) -> IndexDetails {
    let instance = match load_instance(dir, record) {
        Ok(Some(instance)) => instance,
        Ok(None) => return IndexDetails::default(),
        Err(e) => {
            return IndexDetails {
                error: Some(e.to_string()),
                ..IndexDetails::default()
            }
        }
    };

    let mut details = IndexDetails {
        entries: instance.as_index().len(),
        ..IndexDetails::default()
    };
    match &instance {
        IndexInstance::Ordered(index) => details.height = index.height().ok(),
        IndexInstance::Clustered(index) => details.height = index.height().ok(),
        IndexInstance::Hash(index) => details.buckets = Some(index.bucket_count()),
        IndexInstance::Bitmap(index) => {
            details.distinct_values = Some(index.distinct_values());
            details.row_space = Some(index.row_space());
        }
        IndexInstance::Inverted(index) => details.terms = Some(index.term_count()),
    }
    details
}

fn print_text_output(result: &InspectResult) {
    println!("Rowdex Index Directory Inspection");
    println!("=================================");
    println!();
    println!("Path:    {}", result.path);
    println!("Indexes: {}", result.indexes.len());
    println!("Next ID: {}", result.next_id);

    for index in &result.indexes {
        println!();
        let mut flags = Vec::new();
        if index.unique {
            flags.push("unique");
        }
        if index.clustered {
            flags.push("clustered");
        }
        println!(
            "[{}] {} ({} on {}({})){}",
            index.id,
            index.name,
            index.kind,
            index.table,
            index.columns.join(", "),
            if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            }
        );
        match index.snapshot_size {
            Some(size) => println!("  Snapshot: {}", format_size(size)),
            None => println!("  Snapshot: none (rebuilt from heap on open)"),
        }
        if let Some(details) = &index.details {
            if let Some(error) = &details.error {
                println!("  Error:    {error}");
                continue;
            }
            println!("  Entries:  {}", details.entries);
            if let Some(height) = details.height {
                println!("  Height:   {height}");
            }
            if let Some(buckets) = details.buckets {
                println!("  Buckets:  {buckets}");
            }
            if let (Some(values), Some(space)) = (details.distinct_values, details.row_space) {
                println!("  Values:   {values} over {space} row positions");
            }
            if let Some(terms) = details.terms {
                println!("  Terms:    {terms}");
            }
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
