//! Query tree builder subsystem
//!
//! Compiles a level-by-level lookup description into an executable
//! operation tree.
//!
//! # Operation Kinds
//!
//! - Primary key read (no index)
//! - Unique hash index lookup
//! - Ordered index bound scan
//!
//! The operation shape is dictated entirely by the caller; there is no
//! optimizer. The only rewrite is turning a lookup root into a scan when a
//! later level scans, because the engine cannot run that shape otherwise.

mod builder;
mod errors;
mod projection;
mod spec;
mod tree;

pub use builder::{QueryTreeBuilder, MAX_QUERY_LEVELS};
pub use errors::{BuilderError, BuilderErrorCode, BuilderResult};
pub use projection::build_query;
pub use spec::{LevelKey, LevelSource, OperationSpec, QuerySpec};
pub use tree::{
    IndexBound, OpHandle, Operand, OperationDefinition, OperationNode, PreparedQuery,
};
