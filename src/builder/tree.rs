//! Compiled operation tree
//!
//! A root key/index lookup (or scan) followed by one join per level, each
//! keyed on named output columns of its parent.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::engine::{IndexRef, Record, TableRef};

/// Handle to an operation defined on a [`super::QueryTreeBuilder`]
///
/// Handles are positions in the builder's definition order, so the root is
/// always handle 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpHandle(pub(crate) usize);

impl OpHandle {
    /// Definition order number
    pub fn number(&self) -> usize {
        self.0
    }
}

impl fmt::Display for OpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// One key operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Literal key bytes in the engine's native column format
    Const(Vec<u8>),
    /// Value of a named output column of a parent operation
    Linked { parent: OpHandle, column: String },
}

impl Operand {
    pub fn constant(bytes: impl Into<Vec<u8>>) -> Self {
        Operand::Const(bytes.into())
    }

    pub fn linked(parent: OpHandle, column: impl Into<String>) -> Self {
        Operand::Linked {
            parent,
            column: column.into(),
        }
    }

    pub fn parent(&self) -> Option<OpHandle> {
        match self {
            Operand::Const(_) => None,
            Operand::Linked { parent, .. } => Some(*parent),
        }
    }
}

/// Bound for an ordered index scan
///
/// Built from the same operand list a lookup would use: an equality bound on
/// the leading index columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBound {
    pub low: Vec<Operand>,
    pub low_inclusive: bool,
    pub high: Vec<Operand>,
    pub high_inclusive: bool,
}

impl IndexBound {
    /// Inclusive equality bound on a key prefix
    pub fn equal(keys: Vec<Operand>) -> Self {
        Self {
            low: keys.clone(),
            low_inclusive: true,
            high: keys,
            high_inclusive: true,
        }
    }

    /// True when the bound covers the whole index
    pub fn is_unbounded(&self) -> bool {
        self.low.is_empty() && self.high.is_empty()
    }
}

/// Compiled operation for one level
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationDefinition {
    /// Primary key read
    ReadTuple {
        table: Arc<TableRef>,
        keys: Vec<Operand>,
    },
    /// Unique hash index read
    UniqueLookup {
        index: Arc<IndexRef>,
        table: Arc<TableRef>,
        keys: Vec<Operand>,
    },
    /// Ordered index range scan
    IndexScan {
        index: Arc<IndexRef>,
        table: Arc<TableRef>,
        bound: IndexBound,
    },
}

impl OperationDefinition {
    pub fn table(&self) -> &Arc<TableRef> {
        match self {
            OperationDefinition::ReadTuple { table, .. }
            | OperationDefinition::UniqueLookup { table, .. }
            | OperationDefinition::IndexScan { table, .. } => table,
        }
    }

    pub fn index(&self) -> Option<&Arc<IndexRef>> {
        match self {
            OperationDefinition::ReadTuple { .. } => None,
            OperationDefinition::UniqueLookup { index, .. }
            | OperationDefinition::IndexScan { index, .. } => Some(index),
        }
    }

    /// Key operands (the low bound for scans)
    pub fn operands(&self) -> &[Operand] {
        match self {
            OperationDefinition::ReadTuple { keys, .. }
            | OperationDefinition::UniqueLookup { keys, .. } => keys,
            OperationDefinition::IndexScan { bound, .. } => &bound.low,
        }
    }

    pub fn is_scan(&self) -> bool {
        matches!(self, OperationDefinition::IndexScan { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            OperationDefinition::ReadTuple { .. } => "READ_TUPLE",
            OperationDefinition::UniqueLookup { .. } => "UNIQUE_LOOKUP",
            OperationDefinition::IndexScan { .. } => "INDEX_SCAN",
        }
    }
}

/// One node of the tree
#[derive(Debug, Clone)]
pub struct OperationNode {
    pub(crate) number: usize,
    pub(crate) parent: Option<usize>,
    pub(crate) depth: usize,
    pub(crate) definition: OperationDefinition,
    pub(crate) row_record: Option<Arc<Record>>,
    pub(crate) join_only: bool,
}

impl OperationNode {
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn definition(&self) -> &OperationDefinition {
        &self.definition
    }

    /// Record descriptor for this level's result rows, if one was attached
    pub fn row_record(&self) -> Option<&Arc<Record>> {
        self.row_record.as_ref()
    }

    /// True for intermediate join tables whose rows are not user-visible
    pub fn is_join_only(&self) -> bool {
        self.join_only
    }
}

/// Finalized, executable tree
///
/// Nodes are stored in level order: `node(level).depth() == level`.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    id: Uuid,
    nodes: Vec<OperationNode>,
}

impl PreparedQuery {
    pub(crate) fn new(nodes: Vec<OperationNode>) -> Self {
        Self {
            id: Uuid::new_v4(),
            nodes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root(&self) -> &OperationNode {
        &self.nodes[0]
    }

    /// Handle of the root, for building linked operands against it
    pub fn root_handle(&self) -> OpHandle {
        OpHandle(0)
    }

    pub fn nodes(&self) -> &[OperationNode] {
        &self.nodes
    }

    pub fn node(&self, level: usize) -> Option<&OperationNode> {
        self.nodes.get(level)
    }

    /// Number of levels
    pub fn levels(&self) -> usize {
        self.nodes.len()
    }

    /// Parent level of `level`, `None` for the root
    pub fn parent_of(&self, level: usize) -> Option<usize> {
        self.nodes.get(level).and_then(|n| n.parent)
    }

    /// True when any level scans, so the query may return many root rows
    pub fn has_scan(&self) -> bool {
        self.nodes.iter().any(|n| n.definition.is_scan())
    }
}
