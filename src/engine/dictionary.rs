//! Resolved schema metadata consumed by the builder and executor
//!
//! Nothing here is fetched or cached by this crate; callers construct these
//! from the engine's dictionary and share them behind `Arc`.

use std::fmt;

/// Layout of one column inside a native row image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Column name
    pub name: String,
    /// Byte offset within the row
    pub offset: usize,
    /// Byte length reserved for the value
    pub length: usize,
    /// Whether the column may hold NULL
    pub nullable: bool,
}

/// Record descriptor: column layout plus the total row image size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    columns: Vec<ColumnLayout>,
    row_size: usize,
}

impl Record {
    /// Creates a record from explicit layouts. The row size is the end of the
    /// furthest column.
    pub fn new(columns: Vec<ColumnLayout>) -> Self {
        let row_size = columns
            .iter()
            .map(|c| c.offset + c.length)
            .max()
            .unwrap_or(0);
        Self { columns, row_size }
    }

    /// Creates a record with columns packed back to back in the given order.
    pub fn packed<'a>(columns: impl IntoIterator<Item = (&'a str, usize)>) -> Self {
        let mut offset = 0;
        let layouts = columns
            .into_iter()
            .map(|(name, length)| {
                let layout = ColumnLayout {
                    name: name.to_string(),
                    offset,
                    length,
                    nullable: false,
                };
                offset += length;
                layout
            })
            .collect();
        Self::new(layouts)
    }

    /// Total size of one row image in bytes
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    pub fn columns(&self) -> &[ColumnLayout] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Finds a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnLayout> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Slices the bytes of a named column out of a row image.
    pub fn value<'r>(&self, name: &str, row: &'r [u8]) -> Option<&'r [u8]> {
        let col = self.column(name)?;
        row.get(col.offset..col.offset + col.length)
    }
}

/// Table metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    /// All column names in table order
    pub columns: Vec<String>,
    /// Primary key column names in key order
    pub primary_key: Vec<String>,
}

impl TableRef {
    pub fn new(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
        primary_key: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            primary_key: primary_key.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Index kinds known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// The table's primary key
    PrimaryKey,
    /// Unique hash index: single-row lookup
    UniqueHash,
    /// Ordered index: range scans
    Ordered,
    /// Any index type the query builder cannot use
    Undefined,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::PrimaryKey => "PRIMARY_KEY",
            IndexKind::UniqueHash => "UNIQUE_HASH",
            IndexKind::Ordered => "ORDERED",
            IndexKind::Undefined => "UNDEFINED",
        }
    }

    /// True for index kinds that resolve to at most one row
    pub fn is_unique(&self) -> bool {
        matches!(self, IndexKind::PrimaryKey | IndexKind::UniqueHash)
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRef {
    pub name: String,
    pub kind: IndexKind,
    /// Indexed column names in index order
    pub columns: Vec<String>,
}

impl IndexRef {
    pub fn new(
        name: impl Into<String>,
        kind: IndexKind,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}
