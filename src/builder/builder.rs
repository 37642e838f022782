//! Query tree builder
//!
//! Turns per-level lookup definitions into a [`PreparedQuery`].
//!
//! Operation kind selection:
//! 1. No index (or the primary key): primary key read
//! 2. Unique hash index: single-row key lookup
//! 3. Ordered index: bound scan over the supplied operands
//! 4. Anything else: definition error, nothing is added to the tree
//!
//! A level's parent is the one operation its linked operands point at.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::errors::{BuilderError, BuilderResult};
use super::tree::{
    IndexBound, OpHandle, Operand, OperationDefinition, OperationNode, PreparedQuery,
};
use crate::engine::{IndexKind, IndexRef, Record, TableRef};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// Maximum number of levels in one tree
pub const MAX_QUERY_LEVELS: usize = 32;

/// Builds an operation tree level by level
///
/// A failed definition leaves the tree unchanged and records the error,
/// readable through [`QueryTreeBuilder::error`]; the caller decides whether
/// to abort or try a different definition for that level.
#[derive(Debug, Default)]
pub struct QueryTreeBuilder {
    nodes: Vec<OperationNode>,
    last_error: Option<BuilderError>,
}

impl QueryTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define one lookup.
    ///
    /// `operands` are constants for the root, and linked parent columns
    /// (optionally mixed with constants) for every later level.
    pub fn define_lookup(
        &mut self,
        index: Option<Arc<IndexRef>>,
        table: Arc<TableRef>,
        operands: Vec<Operand>,
    ) -> BuilderResult<OpHandle> {
        let level = self.nodes.len();
        match self.compile(index, table, operands) {
            Ok(node) => {
                let handle = OpHandle(node.number);
                self.nodes.push(node);
                Ok(handle)
            }
            Err(err) => Err(self.reject(err.at_level(level))),
        }
    }

    /// Attach the record descriptor for a level's result rows.
    pub fn set_row_record(&mut self, handle: OpHandle, record: Arc<Record>) -> BuilderResult<()> {
        let node = self
            .nodes
            .get_mut(handle.0)
            .ok_or_else(|| BuilderError::unknown_parent(handle.0))?;
        node.row_record = Some(record);
        Ok(())
    }

    /// Flag a level as an intermediate join table.
    pub fn mark_join_only(&mut self, handle: OpHandle) -> BuilderResult<()> {
        let node = self
            .nodes
            .get_mut(handle.0)
            .ok_or_else(|| BuilderError::unknown_parent(handle.0))?;
        node.join_only = true;
        Ok(())
    }

    /// Error left by the most recent failed definition
    pub fn error(&self) -> Option<&BuilderError> {
        self.last_error.as_ref()
    }

    /// Number of operations defined so far
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finalize the tree rooted at `root`. Consumes the builder.
    pub fn prepare(self, root: OpHandle) -> BuilderResult<PreparedQuery> {
        let checked = Self::check_tree(&self.nodes, root);
        if let Err(err) = checked {
            log_rejection(&err);
            return Err(err);
        }

        let query = PreparedQuery::new(self.nodes);
        let id = query.id().to_string();
        let levels = query.levels().to_string();
        log_event_with_fields(
            Event::QueryPrepared,
            &[
                ("levels", &levels),
                ("query", &id),
                ("root", query.root().definition().kind_name()),
            ],
        );
        Ok(query)
    }

    fn check_tree(nodes: &[OperationNode], root: OpHandle) -> BuilderResult<()> {
        if nodes.is_empty() {
            return Err(BuilderError::zero_operations());
        }
        if root.0 != 0 {
            return Err(BuilderError::illegal_state(format!(
                "{} is not the first defined operation",
                root
            )));
        }
        for (level, node) in nodes.iter().enumerate() {
            if node.depth != level {
                return Err(BuilderError::illegal_state(format!(
                    "depth {} at level {}; depths must increase by one per level",
                    node.depth, level
                ))
                .at_level(level));
            }
        }
        Ok(())
    }

    fn compile(
        &self,
        index: Option<Arc<IndexRef>>,
        table: Arc<TableRef>,
        operands: Vec<Operand>,
    ) -> BuilderResult<OperationNode> {
        if self.nodes.len() >= MAX_QUERY_LEVELS {
            return Err(BuilderError::definition_too_large(MAX_QUERY_LEVELS));
        }

        let parent = self.resolve_parent(&operands)?;
        if parent.is_none() && !self.nodes.is_empty() {
            return Err(BuilderError::illegal_state(
                "only the root operation may be keyed by constants alone",
            ));
        }
        self.check_linked_columns(&operands)?;

        let definition = match index {
            None => {
                check_key_count(&table.name, table.primary_key.len(), operands.len())?;
                OperationDefinition::ReadTuple {
                    table,
                    keys: operands,
                }
            }
            Some(index) => match index.kind {
                IndexKind::PrimaryKey => {
                    check_key_count(&index.name, index.columns.len(), operands.len())?;
                    OperationDefinition::ReadTuple {
                        table,
                        keys: operands,
                    }
                }
                IndexKind::UniqueHash => {
                    check_key_count(&index.name, index.columns.len(), operands.len())?;
                    OperationDefinition::UniqueLookup {
                        index,
                        table,
                        keys: operands,
                    }
                }
                IndexKind::Ordered => {
                    if operands.len() > index.columns.len() {
                        return Err(BuilderError::too_many_key_values(
                            &index.name,
                            index.columns.len(),
                            operands.len(),
                        ));
                    }
                    OperationDefinition::IndexScan {
                        index,
                        table,
                        bound: IndexBound::equal(operands),
                    }
                }
                IndexKind::Undefined => {
                    return Err(BuilderError::wrong_index_type(&index.name, index.kind));
                }
            },
        };

        // The engine cannot run a scan beneath a lookup root.
        if definition.is_scan() && parent.is_some() {
            if let Some(root) = self.nodes.first() {
                if !root.definition.is_scan() {
                    return Err(BuilderError::wrong_operation_type(
                        "scan with a root lookup operation is not supported",
                    ));
                }
            }
        }

        let depth = parent.map_or(0, |p| self.nodes[p].depth + 1);
        Ok(OperationNode {
            number: self.nodes.len(),
            parent,
            depth,
            definition,
            row_record: None,
            join_only: false,
        })
    }

    fn resolve_parent(&self, operands: &[Operand]) -> BuilderResult<Option<usize>> {
        let parents: BTreeSet<usize> = operands
            .iter()
            .filter_map(Operand::parent)
            .map(|h| h.0)
            .collect();

        if let Some(&unknown) = parents.iter().find(|&&p| p >= self.nodes.len()) {
            return Err(BuilderError::unknown_parent(unknown));
        }
        if parents.len() > 1 {
            return Err(BuilderError::multiple_parents());
        }
        Ok(parents.into_iter().next())
    }

    fn check_linked_columns(&self, operands: &[Operand]) -> BuilderResult<()> {
        for operand in operands {
            if let Operand::Linked { parent, column } = operand {
                let table = self.nodes[parent.0].definition.table();
                if !table.has_column(column) {
                    return Err(BuilderError::unknown_column(column, &table.name));
                }
            }
        }
        Ok(())
    }

    fn reject(&mut self, err: BuilderError) -> BuilderError {
        log_rejection(&err);
        self.last_error = Some(err.clone());
        err
    }
}

fn check_key_count(target: &str, expected: usize, got: usize) -> BuilderResult<()> {
    if got < expected {
        return Err(BuilderError::too_few_key_values(target, expected, got));
    }
    if got > expected {
        return Err(BuilderError::too_many_key_values(target, expected, got));
    }
    Ok(())
}

fn log_rejection(err: &BuilderError) {
    MetricsRegistry::global().increment_definitions_rejected();
    let number = err.number().to_string();
    let level = err.level().map(|l| l.to_string()).unwrap_or_default();
    log_event_with_fields(
        Event::DefinitionRejected,
        &[
            ("code", err.code().code()),
            ("level", &level),
            ("message", err.message()),
            ("number", &number),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuilderErrorCode;

    fn customer() -> Arc<TableRef> {
        Arc::new(TableRef::new("customer", ["id", "name"], ["id"]))
    }

    fn orders() -> Arc<TableRef> {
        Arc::new(TableRef::new(
            "orders",
            ["order_id", "customer_id", "total"],
            ["order_id"],
        ))
    }

    fn by_customer() -> Arc<IndexRef> {
        Arc::new(IndexRef::new(
            "orders_by_customer",
            IndexKind::Ordered,
            ["customer_id"],
        ))
    }

    #[test]
    fn test_primary_key_root() {
        let mut builder = QueryTreeBuilder::new();
        let root = builder
            .define_lookup(None, customer(), vec![Operand::constant(vec![1u8, 0, 0, 0])])
            .unwrap();
        assert_eq!(root.number(), 0);

        let query = builder.prepare(root).unwrap();
        assert_eq!(query.levels(), 1);
        assert!(matches!(
            query.root().definition(),
            OperationDefinition::ReadTuple { .. }
        ));
    }

    #[test]
    fn test_unique_index_root() {
        let index = Arc::new(IndexRef::new("customer_name", IndexKind::UniqueHash, ["name"]));
        let mut builder = QueryTreeBuilder::new();
        let root = builder
            .define_lookup(Some(index), customer(), vec![Operand::constant(b"ann".to_vec())])
            .unwrap();
        let query = builder.prepare(root).unwrap();
        assert_eq!(query.root().definition().kind_name(), "UNIQUE_LOOKUP");
    }

    #[test]
    fn test_ordered_index_root_is_scan() {
        let mut builder = QueryTreeBuilder::new();
        let root = builder
            .define_lookup(
                Some(by_customer()),
                orders(),
                vec![Operand::constant(vec![1u8])],
            )
            .unwrap();
        let query = builder.prepare(root).unwrap();
        assert!(query.has_scan());
    }

    #[test]
    fn test_undefined_index_rejected() {
        let index = Arc::new(IndexRef::new("weird", IndexKind::Undefined, ["name"]));
        let mut builder = QueryTreeBuilder::new();
        let result =
            builder.define_lookup(Some(index), customer(), vec![Operand::constant(vec![1u8])]);

        assert!(result.is_err());
        assert!(builder.is_empty());
        let err = builder.error().unwrap();
        assert_eq!(err.code(), BuilderErrorCode::QryWrongIndexType);
        assert_ne!(err.number(), 0);
        assert_eq!(err.level(), Some(0));
    }

    #[test]
    fn test_missing_key_values() {
        let mut builder = QueryTreeBuilder::new();
        let err = builder.define_lookup(None, customer(), vec![]).unwrap_err();
        assert_eq!(err.code(), BuilderErrorCode::QryTooFewKeyValues);
    }

    #[test]
    fn test_join_on_parent_column() {
        let mut builder = QueryTreeBuilder::new();
        let root = builder
            .define_lookup(None, customer(), vec![Operand::constant(vec![1u8])])
            .unwrap();
        let child = builder
            .define_lookup(None, orders(), vec![Operand::linked(root, "id")])
            .unwrap();
        let query = builder.prepare(root).unwrap();

        assert_eq!(query.levels(), 2);
        assert_eq!(query.parent_of(child.number()), Some(0));
        assert_eq!(query.node(1).unwrap().depth(), 1);
    }

    #[test]
    fn test_join_on_unknown_column() {
        let mut builder = QueryTreeBuilder::new();
        let root = builder
            .define_lookup(None, customer(), vec![Operand::constant(vec![1u8])])
            .unwrap();
        let err = builder
            .define_lookup(None, orders(), vec![Operand::linked(root, "email")])
            .unwrap_err();
        assert_eq!(err.code(), BuilderErrorCode::QryUnknownColumn);
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_join_on_unknown_parent() {
        let mut builder = QueryTreeBuilder::new();
        builder
            .define_lookup(None, customer(), vec![Operand::constant(vec![1u8])])
            .unwrap();
        let err = builder
            .define_lookup(None, orders(), vec![Operand::linked(OpHandle(5), "id")])
            .unwrap_err();
        assert_eq!(err.code(), BuilderErrorCode::QryUnknownParent);
    }

    #[test]
    fn test_child_with_constants_only_rejected() {
        let mut builder = QueryTreeBuilder::new();
        builder
            .define_lookup(None, customer(), vec![Operand::constant(vec![1u8])])
            .unwrap();
        let err = builder
            .define_lookup(None, orders(), vec![Operand::constant(vec![2u8])])
            .unwrap_err();
        assert_eq!(err.code(), BuilderErrorCode::QryIllegalState);
    }

    #[test]
    fn test_scan_under_lookup_root_rejected() {
        let mut builder = QueryTreeBuilder::new();
        let root = builder
            .define_lookup(None, customer(), vec![Operand::constant(vec![1u8])])
            .unwrap();
        let err = builder
            .define_lookup(
                Some(by_customer()),
                orders(),
                vec![Operand::linked(root, "id")],
            )
            .unwrap_err();
        assert_eq!(err.code(), BuilderErrorCode::QryWrongOperationType);
        assert_eq!(err.number(), 4820);
    }

    #[test]
    fn test_prepare_empty_builder() {
        let err = QueryTreeBuilder::new().prepare(OpHandle(0)).unwrap_err();
        assert_eq!(err.code(), BuilderErrorCode::QryHasZeroOperations);
    }

    #[test]
    fn test_prepare_rejects_sibling_levels() {
        let mut builder = QueryTreeBuilder::new();
        let root = builder
            .define_lookup(None, customer(), vec![Operand::constant(vec![1u8])])
            .unwrap();
        builder
            .define_lookup(None, orders(), vec![Operand::linked(root, "id")])
            .unwrap();
        builder
            .define_lookup(None, orders(), vec![Operand::linked(root, "id")])
            .unwrap();

        let err = builder.prepare(root).unwrap_err();
        assert_eq!(err.code(), BuilderErrorCode::QryIllegalState);
        assert_eq!(err.level(), Some(2));
    }

    #[test]
    fn test_row_record_and_join_flag() {
        let mut builder = QueryTreeBuilder::new();
        let root = builder
            .define_lookup(None, customer(), vec![Operand::constant(vec![1u8])])
            .unwrap();
        builder
            .set_row_record(root, Arc::new(Record::packed([("id", 4)])))
            .unwrap();
        builder.mark_join_only(root).unwrap();

        let query = builder.prepare(root).unwrap();
        assert_eq!(query.root().row_record().unwrap().row_size(), 4);
        assert!(query.root().is_join_only());
    }
}
