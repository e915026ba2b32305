//! Statement-level result cache in front of a query engine.
//!
//! Keyed by the raw statement text. Entries never expire; invalidating them
//! after a schema or data change is up to the caller.

use async_trait::async_trait;
use serde_json::Value;

use super::query_engine::{ConnectionError, QueryEngine, QueryError, RawRow};
use crate::cache::store::{query_key, CacheStore};

pub struct CachedQueries<'a> {
    engine: &'a dyn QueryEngine,
    cache: Option<&'a dyn CacheStore>,
}

impl<'a> CachedQueries<'a> {
    /// Wrap `engine`; with no cache every call goes straight through
    pub fn new(engine: &'a dyn QueryEngine, cache: Option<&'a dyn CacheStore>) -> Self {
        CachedQueries { engine, cache }
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    async fn cached_rows(&self, cache: &dyn CacheStore, statement: &str) -> Option<Vec<RawRow>> {
        let value = match cache.get(&query_key(statement)).await {
            Ok(value) => value?,
            Err(e) => {
                log::warn!("Query cache lookup failed, executing directly: {}", e);
                return None;
            }
        };

        match serde_json::from_value::<Vec<RawRow>>(value) {
            Ok(rows) => Some(rows),
            Err(e) => {
                log::warn!(
                    "Cached result of \"{}\" could not be decoded, executing directly: {}",
                    statement,
                    e
                );
                None
            }
        }
    }
}

#[async_trait]
impl QueryEngine for CachedQueries<'_> {
    async fn connect(&self) -> Result<(), ConnectionError> {
        self.engine.connect().await
    }

    async fn execute(&self, statement: &str) -> Result<Vec<RawRow>, QueryError> {
        let Some(cache) = self.cache else {
            return self.engine.execute(statement).await;
        };

        if let Some(rows) = self.cached_rows(cache, statement).await {
            log::info!("Query cache hit ({} rows) => {}", rows.len(), statement);
            return Ok(rows);
        }

        let rows = self.engine.execute(statement).await?;
        let value = Value::Array(rows.iter().cloned().map(Value::Object).collect());
        if let Err(e) = cache.set(&query_key(statement), value).await {
            log::warn!("Could not cache result of \"{}\": {}", statement, e);
        }
        Ok(rows)
    }
}
