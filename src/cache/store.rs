//! Key/value cache store seam and the key namespaces used on top of it.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error for key `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Cache record `{key}` could not be (de)serialized: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistent get/set by string key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), CacheError>;
}

pub fn rowcount_key(entity: &str) -> String {
    format!("rowcount-{}", entity)
}

/// Key of the materialized node list
pub fn data_key(entity: &str) -> String {
    format!("data-{}", entity)
}

/// Key of the asset fetch descriptor list
pub fn node_key(entity: &str) -> String {
    format!("node-{}", entity)
}

pub fn query_key(statement: &str) -> String {
    format!("query-{}", statement)
}
