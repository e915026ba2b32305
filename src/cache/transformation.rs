//! Row-count memoization of whole entity materializations.
//!
//! An entity's record is three cache entries: the node list (`data-`), the
//! asset fetch requests (`node-`) and the row count (`rowcount-`). A rewrite
//! first clears the row count and sets it again only after both lists are
//! written. The row count is checked first on lookup, so a record only replays
//! when it was written completely for the same number of rows.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::store::{data_key, node_key, rowcount_key, CacheError, CacheStore};
use crate::materialize::{AssetFetchRequest, TransformationAccumulator};
use crate::node::MaterializedNode;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedTransformation {
    pub row_count: u64,
    pub accumulator: TransformationAccumulator,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(CachedTransformation),
    Miss { cached_row_count: Option<u64> },
}

pub struct TransformationCache<'a> {
    store: &'a dyn CacheStore,
}

impl<'a> TransformationCache<'a> {
    pub fn new(store: &'a dyn CacheStore) -> Self {
        TransformationCache { store }
    }

    /// Find a replayable record of `entity` for the current `row_count`
    ///
    /// Unreadable or undecodable entries count as a miss.
    pub async fn lookup(&self, entity: &str, row_count: u64) -> Lookup {
        let cached_row_count = match self.store.get(&rowcount_key(entity)).await {
            Ok(value) => value.as_ref().and_then(Value::as_u64),
            Err(e) => {
                log::warn!("Could not read cached row count of {}: {}", entity, e);
                None
            }
        };

        if cached_row_count != Some(row_count) {
            log::info!(
                "Transformation cache miss for {} ({} rows, cached {:?})",
                entity,
                row_count,
                cached_row_count
            );
            return Lookup::Miss { cached_row_count };
        }

        let nodes = self.read::<Vec<MaterializedNode>>(&data_key(entity)).await;
        let asset_requests = self.read::<Vec<AssetFetchRequest>>(&node_key(entity)).await;
        match (nodes, asset_requests) {
            (Some(nodes), Some(asset_requests)) => {
                log::info!(
                    "Transformation cache hit for {} ({} nodes, {} asset requests)",
                    entity,
                    nodes.len(),
                    asset_requests.len()
                );
                Lookup::Hit(CachedTransformation {
                    row_count,
                    accumulator: TransformationAccumulator {
                        nodes,
                        asset_requests,
                    },
                })
            }
            _ => {
                log::warn!(
                    "Transformation cache record of {} is incomplete, materializing again",
                    entity
                );
                Lookup::Miss { cached_row_count }
            }
        }
    }

    /// Persist a completed materialization of `entity`
    pub async fn store(
        &self,
        entity: &str,
        row_count: u64,
        accumulator: &TransformationAccumulator,
    ) -> Result<(), CacheError> {
        let requests = serde_json::to_value(&accumulator.asset_requests).map_err(|source| {
            CacheError::Serde {
                key: node_key(entity),
                source,
            }
        })?;
        let nodes =
            serde_json::to_value(&accumulator.nodes).map_err(|source| CacheError::Serde {
                key: data_key(entity),
                source,
            })?;

        // A failed rewrite must not leave the previous row count pointing at
        // a mix of old and new lists
        self.store.set(&rowcount_key(entity), Value::Null).await?;
        self.store.set(&node_key(entity), requests).await?;
        self.store.set(&data_key(entity), nodes).await?;
        self.store
            .set(&rowcount_key(entity), Value::from(row_count))
            .await?;
        log::debug!("Cached transformation of {} at {} rows", entity, row_count);
        Ok(())
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    log::warn!("Could not decode cache record {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("Could not read cache record {}: {}", key, e);
                None
            }
        }
    }
}
