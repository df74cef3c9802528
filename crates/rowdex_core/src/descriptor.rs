//! Index descriptors.
//!
//! A descriptor is the immutable definition of one index. The catalog owns
//! all descriptors and persists them across restarts.

use crate::error::{IndexError, IndexResult};
use crate::key::{ColumnType, Key};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// Balanced multi-way tree; equality and range lookups.
    Ordered,
    /// Chained hash table; equality lookups only.
    Hash,
    /// One bit-vector per distinct value; low-cardinality columns.
    Bitmap,
    /// Term to posting-list mapping over tokenized text.
    Inverted,
}

impl IndexKind {
    /// Returns the lowercase name of the strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            IndexKind::Ordered => "ordered",
            IndexKind::Hash => "hash",
            IndexKind::Bitmap => "bitmap",
            IndexKind::Inverted => "inverted",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An indexed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name in the table.
    pub name: String,
    /// Declared column type.
    pub ty: ColumnType,
}

impl ColumnDef {
    /// Creates a column definition.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Definition of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Unique index name.
    pub name: String,
    /// Table the index belongs to.
    pub table: String,
    /// Indexed columns, in key order.
    pub columns: Vec<ColumnDef>,
    /// Strategy.
    pub kind: IndexKind,
    /// Whether a key may map to at most one row.
    pub unique: bool,
    /// Whether key order dictates physical row order.
    pub clustered: bool,
}

impl IndexDescriptor {
    /// Creates a descriptor with no columns.
    pub fn new(name: impl Into<String>, table: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
            kind,
            unique: false,
            clustered: false,
        }
    }

    /// Appends an indexed column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(ColumnDef::new(name, ty));
        self
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Makes this the table's clustered index.
    #[must_use]
    pub fn clustered(mut self) -> Self {
        self.clustered = true;
        self
    }

    /// Returns the column names in key order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Checks that the strategy can index the declared columns.
    pub fn validate(&self) -> IndexResult<()> {
        if self.name.is_empty() {
            return Err(IndexError::invalid_key("index name must not be empty"));
        }
        if self.columns.is_empty() {
            return Err(IndexError::unsupported_column(format!(
                "index '{}' declares no columns",
                self.name
            )));
        }
        match self.kind {
            IndexKind::Ordered | IndexKind::Hash => {}
            IndexKind::Bitmap => {
                if self.columns.len() != 1 {
                    return Err(IndexError::unsupported_column(format!(
                        "bitmap index '{}' must cover exactly one column",
                        self.name
                    )));
                }
                if self.unique {
                    return Err(IndexError::unsupported(
                        self.kind.as_str(),
                        "bitmap indexes cannot enforce uniqueness",
                    ));
                }
            }
            IndexKind::Inverted => {
                if self.columns.len() != 1 || self.columns[0].ty != ColumnType::Text {
                    return Err(IndexError::unsupported_column(format!(
                        "inverted index '{}' requires a single text column",
                        self.name
                    )));
                }
                if self.unique {
                    return Err(IndexError::unsupported(
                        self.kind.as_str(),
                        "inverted indexes cannot enforce uniqueness",
                    ));
                }
            }
        }
        if self.clustered && self.kind != IndexKind::Ordered {
            return Err(IndexError::unsupported(
                self.kind.as_str(),
                "only ordered indexes can be clustered",
            ));
        }
        Ok(())
    }

    /// Checks a key's arity and value types against the declared columns.
    pub fn check_key(&self, key: &Key) -> IndexResult<()> {
        if key.arity() != self.columns.len() {
            return Err(IndexError::invalid_key(format!(
                "index '{}' expects {} column(s), got {}",
                self.name,
                self.columns.len(),
                key.arity()
            )));
        }
        for (value, column) in key.values().iter().zip(&self.columns) {
            if !value.fits(column.ty) {
                return Err(IndexError::invalid_key(format!(
                    "column '{}' of index '{}' is {}, got {}",
                    column.name, self.name, column.ty, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Value;

    #[test]
    fn builder() {
        let desc = IndexDescriptor::new("users_email", "users", IndexKind::Hash)
            .column("email", ColumnType::Text)
            .unique();

        assert_eq!(desc.name, "users_email");
        assert_eq!(desc.column_names(), vec!["email".to_string()]);
        assert!(desc.unique);
        assert!(!desc.clustered);
        desc.validate().unwrap();
    }

    #[test]
    fn inverted_requires_text() {
        let desc = IndexDescriptor::new("bad", "t", IndexKind::Inverted).column("n", ColumnType::Int);
        assert!(matches!(
            desc.validate(),
            Err(IndexError::UnsupportedColumnType { .. })
        ));
    }

    #[test]
    fn bitmap_requires_single_column() {
        let desc = IndexDescriptor::new("bad", "t", IndexKind::Bitmap)
            .column("a", ColumnType::Bool)
            .column("b", ColumnType::Bool);
        assert!(matches!(
            desc.validate(),
            Err(IndexError::UnsupportedColumnType { .. })
        ));
    }

    #[test]
    fn clustered_requires_ordered() {
        let desc = IndexDescriptor::new("bad", "t", IndexKind::Hash)
            .column("id", ColumnType::Int)
            .clustered();
        assert!(matches!(
            desc.validate(),
            Err(IndexError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn check_key_arity_and_types() {
        let desc = IndexDescriptor::new("name_age", "people", IndexKind::Ordered)
            .column("name", ColumnType::Text)
            .column("age", ColumnType::Int);

        desc.check_key(&Key::new(vec![Value::from("ann"), Value::Int(3)]))
            .unwrap();
        desc.check_key(&Key::new(vec![Value::from("ann"), Value::Null]))
            .unwrap();
        assert!(desc.check_key(&Key::single("ann")).is_err());
        assert!(desc
            .check_key(&Key::new(vec![Value::Int(1), Value::Int(3)]))
            .is_err());
    }
}
