//! rowgraph - source relational query results as linked content nodes
//!
//! This crate turns the rows of declared entity queries into content-store
//! nodes through:
//! - Entity descriptors with parent/child relations
//! - Row-to-node mapping with parent, child and asset link fields
//! - Batched materialization with remote asset fetching
//! - Query result and row-count transformation caching

pub mod cache;
pub mod config;
pub mod driver;
pub mod materialize;
pub mod node;
pub mod schema;
pub mod source;
