//! Caller-supplied query specification
//!
//! An ordered chain of levels. The root is keyed by constants; every later
//! level names the parent columns its key columns join against, matched by
//! position to the level's index (or primary key) columns.

use std::sync::Arc;

use crate::engine::{IndexKind, IndexRef, Record, TableRef};

/// Table, access path and row layout for one level
#[derive(Debug, Clone)]
pub struct LevelSource {
    pub table: Arc<TableRef>,
    /// `None` reads by primary key
    pub index: Option<Arc<IndexRef>>,
    /// Layout of the rows this level returns
    pub row_record: Arc<Record>,
}

impl LevelSource {
    pub fn new(table: Arc<TableRef>, row_record: Arc<Record>) -> Self {
        Self {
            table,
            index: None,
            row_record,
        }
    }

    pub fn with_index(mut self, index: Arc<IndexRef>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.index
            .as_ref()
            .map_or(true, |i| i.kind == IndexKind::PrimaryKey)
    }

    /// True when the level resolves to at most one row per key
    pub fn is_unique(&self) -> bool {
        self.index.as_ref().map_or(true, |i| i.kind.is_unique())
    }

    pub fn is_scan(&self) -> bool {
        self.index
            .as_ref()
            .is_some_and(|i| i.kind == IndexKind::Ordered)
    }

    /// Columns the level is keyed on, in key order
    pub fn key_columns(&self) -> &[String] {
        match &self.index {
            Some(index) => &index.columns,
            None => &self.table.primary_key,
        }
    }
}

/// How a level is keyed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelKey {
    /// Literal key values (root only)
    Constants(Vec<Vec<u8>>),
    /// Parent output columns to link against (every other level)
    ParentColumns(Vec<String>),
}

/// One level of the chain
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub source: LevelSource,
    pub key: LevelKey,
    pub depth: usize,
    /// Intermediate join table; its rows only link parent and child
    pub join_only: bool,
}

impl OperationSpec {
    pub fn is_primary_key(&self) -> bool {
        self.source.is_primary_key()
    }

    pub fn is_scan(&self) -> bool {
        self.source.is_scan()
    }
}

/// Full chain of levels, root first
#[derive(Debug, Clone)]
pub struct QuerySpec {
    levels: Vec<OperationSpec>,
    root_scan_index: Option<Arc<IndexRef>>,
}

impl QuerySpec {
    /// Start a chain at a root keyed by constant values
    pub fn root(source: LevelSource, keys: Vec<Vec<u8>>) -> Self {
        Self {
            levels: vec![OperationSpec {
                source,
                key: LevelKey::Constants(keys),
                depth: 0,
                join_only: false,
            }],
            root_scan_index: None,
        }
    }

    /// Append a level joined to the current last level
    pub fn join(
        mut self,
        source: LevelSource,
        parent_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.push_level(source, parent_columns, false);
        self
    }

    /// Append a many-to-many relation: a join-only intermediate table linked
    /// to the current last level, then the target linked to the intermediate.
    pub fn join_through(
        mut self,
        via: LevelSource,
        via_parent_columns: impl IntoIterator<Item = impl Into<String>>,
        target: LevelSource,
        target_via_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.push_level(via, via_parent_columns, true);
        self.push_level(target, target_via_columns, false);
        self
    }

    /// Ordered index on the root table used when the root has to be turned
    /// into a scan because a later level scans.
    pub fn with_root_scan_index(mut self, index: Arc<IndexRef>) -> Self {
        self.root_scan_index = Some(index);
        self
    }

    fn push_level(
        &mut self,
        source: LevelSource,
        parent_columns: impl IntoIterator<Item = impl Into<String>>,
        join_only: bool,
    ) {
        let depth = self.levels.len();
        self.levels.push(OperationSpec {
            source,
            key: LevelKey::ParentColumns(parent_columns.into_iter().map(Into::into).collect()),
            depth,
            join_only,
        });
    }

    pub fn levels(&self) -> &[OperationSpec] {
        &self.levels
    }

    pub fn level(&self, depth: usize) -> Option<&OperationSpec> {
        self.levels.get(depth)
    }

    /// The level after `level` in the chain
    pub fn next(&self, level: &OperationSpec) -> Option<&OperationSpec> {
        self.levels.get(level.depth + 1)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn root_scan_index(&self) -> Option<&Arc<IndexRef>> {
        self.root_scan_index.as_ref()
    }
}
