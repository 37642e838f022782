//! Projection of a [`QuerySpec`] chain onto the tree builder
//!
//! The root is keyed by constants, each later level by linked parent
//! columns. The engine has no "scan under a lookup root", so a chain whose
//! root is a primary/unique lookup but which scans further down gets its
//! root rewritten into a scan over the spec's root scan index.

use std::sync::Arc;

use super::builder::QueryTreeBuilder;
use super::errors::{BuilderError, BuilderResult};
use super::spec::{LevelKey, OperationSpec, QuerySpec};
use super::tree::{OpHandle, Operand, PreparedQuery};
use crate::engine::{IndexKind, IndexRef};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// Compile a specification chain into a prepared tree.
pub fn build_query(spec: &QuerySpec) -> BuilderResult<PreparedQuery> {
    let levels = spec.levels();
    let root = levels.first().ok_or_else(BuilderError::zero_operations)?;
    MetricsRegistry::global().increment_root_projections();

    let child_scans = levels.iter().skip(1).any(OperationSpec::is_scan);
    let root_index = if child_scans && root.source.is_unique() {
        Some(rewrite_root_as_scan(spec)?)
    } else {
        root.source.index.clone()
    };

    let mut builder = QueryTreeBuilder::new();
    let mut parent: Option<OpHandle> = None;
    let mut root_handle = None;

    for level in levels {
        let position = builder.len();
        if level.depth != position {
            return Err(BuilderError::illegal_state(format!(
                "level {} declares depth {}",
                position, level.depth
            ))
            .at_level(position));
        }

        let index = if position == 0 {
            root_index.clone()
        } else {
            level.source.index.clone()
        };
        let operands = level_operands(level, parent)?;
        let handle = builder.define_lookup(index, level.source.table.clone(), operands)?;
        builder.set_row_record(handle, level.source.row_record.clone())?;
        if level.join_only {
            builder.mark_join_only(handle)?;
        }

        root_handle.get_or_insert(handle);
        parent = Some(handle);
    }

    let root_handle = root_handle.ok_or_else(BuilderError::zero_operations)?;
    builder.prepare(root_handle)
}

fn level_operands(level: &OperationSpec, parent: Option<OpHandle>) -> BuilderResult<Vec<Operand>> {
    match (&level.key, parent) {
        (LevelKey::Constants(keys), None) => Ok(keys.iter().cloned().map(Operand::Const).collect()),
        (LevelKey::ParentColumns(columns), Some(parent)) => Ok(columns
            .iter()
            .map(|column| Operand::linked(parent, column.as_str()))
            .collect()),
        (LevelKey::Constants(_), Some(_)) => Err(BuilderError::illegal_state(
            "only the root level may be keyed by constants",
        )
        .at_level(level.depth)),
        (LevelKey::ParentColumns(_), None) => Err(BuilderError::illegal_state(
            "the root level cannot join to a parent",
        )
        .at_level(level.depth)),
    }
}

fn rewrite_root_as_scan(spec: &QuerySpec) -> BuilderResult<Arc<IndexRef>> {
    let index = spec
        .root_scan_index()
        .filter(|i| i.kind == IndexKind::Ordered)
        .cloned()
        .ok_or_else(|| {
            BuilderError::wrong_operation_type("could not rewrite root lookup to use a scan")
                .at_level(0)
        })?;

    MetricsRegistry::global().increment_rewritten_to_scan();
    let table = spec
        .level(0)
        .map(|l| l.source.table.name.clone())
        .unwrap_or_default();
    log_event_with_fields(
        Event::ProjectionRewrittenToScan,
        &[("index", &index.name), ("table", &table)],
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::spec::LevelSource;
    use crate::builder::{BuilderErrorCode, OperationDefinition};
    use crate::engine::{Record, TableRef};

    fn customer() -> LevelSource {
        LevelSource::new(
            Arc::new(TableRef::new("customer", ["id", "name"], ["id"])),
            Arc::new(Record::packed([("id", 4), ("name", 8)])),
        )
    }

    fn orders_by_customer() -> LevelSource {
        LevelSource::new(
            Arc::new(TableRef::new(
                "orders",
                ["order_id", "customer_id"],
                ["order_id"],
            )),
            Arc::new(Record::packed([("order_id", 4), ("customer_id", 4)])),
        )
        .with_index(Arc::new(IndexRef::new(
            "orders_by_customer",
            IndexKind::Ordered,
            ["customer_id"],
        )))
    }

    fn customer_scan_index() -> Arc<IndexRef> {
        Arc::new(IndexRef::new("customer_pk_ordered", IndexKind::Ordered, ["id"]))
    }

    #[test]
    fn test_lookup_chain_keeps_root_lookup() {
        let spec = QuerySpec::root(customer(), vec![vec![1, 0, 0, 0]]);
        let query = build_query(&spec).unwrap();
        assert!(matches!(
            query.root().definition(),
            OperationDefinition::ReadTuple { .. }
        ));
        assert_eq!(query.root().row_record().unwrap().row_size(), 12);
    }

    #[test]
    fn test_scanning_child_rewrites_root() {
        let before = MetricsRegistry::global().snapshot().rewritten_to_scan;
        let spec = QuerySpec::root(customer(), vec![vec![1, 0, 0, 0]])
            .join(orders_by_customer(), ["id"])
            .with_root_scan_index(customer_scan_index());

        let query = build_query(&spec).unwrap();
        assert!(query.root().definition().is_scan());
        assert!(query.node(1).unwrap().definition().is_scan());
        assert!(MetricsRegistry::global().snapshot().rewritten_to_scan > before);
    }

    #[test]
    fn test_scanning_child_without_scan_index_fails() {
        let spec = QuerySpec::root(customer(), vec![vec![1, 0, 0, 0]])
            .join(orders_by_customer(), ["id"]);

        let err = build_query(&spec).unwrap_err();
        assert_eq!(err.code(), BuilderErrorCode::QryWrongOperationType);
    }

    #[test]
    fn test_join_only_level_flagged() {
        let enrollment = LevelSource::new(
            Arc::new(TableRef::new(
                "enrollment",
                ["student_id", "course_id"],
                ["student_id", "course_id"],
            )),
            Arc::new(Record::packed([("student_id", 4), ("course_id", 4)])),
        )
        .with_index(Arc::new(IndexRef::new(
            "enrollment_by_student",
            IndexKind::Ordered,
            ["student_id"],
        )));
        let course = LevelSource::new(
            Arc::new(TableRef::new("course", ["id", "title"], ["id"])),
            Arc::new(Record::packed([("id", 4), ("title", 16)])),
        );
        let spec = QuerySpec::root(customer(), vec![vec![1, 0, 0, 0]])
            .join_through(enrollment, ["id"], course, ["course_id"])
            .with_root_scan_index(customer_scan_index());

        let query = build_query(&spec).unwrap();
        assert_eq!(query.levels(), 3);
        assert!(query.node(1).unwrap().is_join_only());
        assert!(!query.node(2).unwrap().is_join_only());
        assert_eq!(query.parent_of(2), Some(1));
    }

    #[test]
    fn test_join_to_missing_parent_column() {
        let orders = LevelSource::new(
            Arc::new(TableRef::new("orders", ["order_id"], ["order_id"])),
            Arc::new(Record::packed([("order_id", 4)])),
        );
        let spec = QuerySpec::root(customer(), vec![vec![1, 0, 0, 0]]).join(orders, ["email"]);

        let err = build_query(&spec).unwrap_err();
        assert_eq!(err.code(), BuilderErrorCode::QryUnknownColumn);
        assert_eq!(err.level(), Some(1));
    }
}
