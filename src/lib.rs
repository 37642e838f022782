//! clusterq - query trees, joined result assembly and batched key operations
//! for a clustered storage engine client
//!
//! The engine's own client library supplies transactions and cursors
//! through the traits in [`engine`]; everything else lives here.

pub mod batch;
pub mod builder;
pub mod config;
pub mod engine;
pub mod observability;
pub mod query;
