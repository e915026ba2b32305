//! Integration tests - full sourcing runs against in-memory collaborators
//!
//! These tests drive `source_nodes` end to end: query engine, content store,
//! asset fetcher and cache store are all in-process fakes.

mod caching_tests;
mod fakes;
mod sourcing_tests;
