//! Verify command implementation.

use super::{load_instance, open_catalog};
use rowdex_core::{Index, IndexError};
use serde::Serialize;
use std::path::Path;

/// Outcome for one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Snapshot decoded and passed the structure checks.
    Ok,
    /// No snapshot on disk; the index is rebuilt from the heap on open.
    NoSnapshot,
    /// Snapshot could not be read or decoded.
    Unreadable,
    /// Snapshot decoded but the structure violates an invariant.
    Corrupt,
}

/// Verification result for one index.
#[derive(Debug, Serialize)]
pub struct IndexVerification {
    /// Index name.
    pub name: String,
    /// Outcome.
    pub status: Status,
    /// Stored entries, when the snapshot loaded.
    pub entries: Option<usize>,
    /// Error detail, when the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Verification result for the whole directory.
#[derive(Debug, Serialize)]
pub struct VerifyResult {
    /// Directory path.
    pub path: String,
    /// Per-index results.
    pub indexes: Vec<IndexVerification>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.indexes
            .iter()
            .all(|i| matches!(i.status, Status::Ok | Status::NoSnapshot))
    }
}

/// Runs the verify command.
pub fn run(path: &Path, only: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = verify(path, only)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }

    if result.is_ok() {
        Ok(())
    } else {
        Err("Verification failed".into())
    }
}

/// Checks the catalog and every snapshot, or only the one named `only`.
pub fn verify(path: &Path, only: Option<&str>) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let (dir, catalog) = open_catalog(path)?;
    if let Some(name) = only {
        if catalog.get(name).is_none() {
            return Err(format!("No index named '{name}' in the catalog").into());
        }
    }

    let mut indexes = Vec::new();
    for record in catalog
        .records
        .iter()
        .filter(|r| only.map_or(true, |name| r.descriptor.name == name))
    {
        tracing::debug!(index = %record.descriptor.name, id = %record.id, "verifying");
        let name = record.descriptor.name.clone();
        let verification = match load_instance(&dir, record) {
            Ok(None) => IndexVerification {
                name,
                status: Status::NoSnapshot,
                entries: None,
                error: None,
            },
            Ok(Some(instance)) => {
                let index = instance.as_index();
                let (status, error) = match index.check_integrity() {
                    Ok(()) => (Status::Ok, None),
                    Err(e) => (Status::Corrupt, Some(e.to_string())),
                };
                IndexVerification {
                    name,
                    status,
                    entries: Some(index.len()),
                    error,
                }
            }
            Err(e) => IndexVerification {
                name,
                status: classify(&e),
                entries: None,
                error: Some(e.to_string()),
            },
        };
        indexes.push(verification);
    }

    Ok(VerifyResult {
        path: path.display().to_string(),
        indexes,
    })
}

fn classify(err: &IndexError) -> Status {
    if err.is_corruption() {
        Status::Corrupt
    } else {
        Status::Unreadable
    }
}

fn print_text_output(result: &VerifyResult) {
    println!("Verifying index directory at {}", result.path);
    println!();
    for index in &result.indexes {
        match index.status {
            Status::Ok => println!(
                "  ✓ {}: {} entries",
                index.name,
                index.entries.unwrap_or_default()
            ),
            Status::NoSnapshot => println!("  - {}: no snapshot, rebuilt from heap on open", index.name),
            Status::Unreadable | Status::Corrupt => println!(
                "  ✗ {}: {}",
                index.name,
                index.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    println!();
    if result.is_ok() {
        println!("✓ Index directory verification passed");
    } else {
        println!("✗ Index directory verification failed");
    }
}
