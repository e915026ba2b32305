//! Batch materialization of one entity's nodes.
//!
//! Batches run strictly one after another. Inside a batch every node runs
//! concurrently: its assets are fetched, then the node is written. A batch is
//! fully settled before the next one starts, which bounds the number of asset
//! fetches in flight.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use super::assets::{materialize_assets, AssetFetchRequest, AssetFetcher};
use super::content_store::{ContentStore, NodeWriteError};
use crate::node::MaterializedNode;

pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Split `items` into contiguous batches of at most `size` items
///
/// A size of zero yields no batches.
pub fn chunk<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return Vec::new();
    }

    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter();
    loop {
        let batch: Vec<T> = iter.by_ref().take(size).collect();
        if batch.is_empty() {
            break;
        }
        batches.push(batch);
    }
    batches
}

/// What one entity run produced, in the shape persisted by the
/// transformation cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformationAccumulator {
    pub nodes: Vec<MaterializedNode>,
    pub asset_requests: Vec<AssetFetchRequest>,
}

#[derive(Debug)]
pub struct NodeFailure {
    pub node_id: String,
    pub error: NodeWriteError,
}

#[derive(Debug, Default)]
pub struct EntityMaterialization {
    pub entity: String,
    pub accumulator: TransformationAccumulator,
    pub nodes_written: usize,
    pub assets_fetched: usize,
    pub asset_failures: usize,
    pub failures: Vec<NodeFailure>,
}

impl EntityMaterialization {
    fn new(entity: &str) -> Self {
        EntityMaterialization {
            entity: entity.to_string(),
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_write(&mut self, node_id: String, result: Result<(), NodeWriteError>) {
        match result {
            Ok(()) => self.nodes_written += 1,
            Err(error) => self.failures.push(NodeFailure { node_id, error }),
        }
    }

    fn log_batch_failures(&self, already_logged: usize, batch_no: usize) {
        for failure in &self.failures[already_logged..] {
            log::error!(
                "Failed to create {} node {} in batch {}: {}",
                self.entity,
                failure.node_id,
                batch_no,
                failure.error
            );
        }
    }
}

struct NodeOutcome {
    node: MaterializedNode,
    requests: Vec<AssetFetchRequest>,
    fetched: usize,
    failed: usize,
    write: Result<(), NodeWriteError>,
}

pub struct Pipeline<'a> {
    store: &'a dyn ContentStore,
    fetcher: &'a dyn AssetFetcher,
    batch_size: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn ContentStore, fetcher: &'a dyn AssetFetcher) -> Self {
        Pipeline {
            store,
            fetcher,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Fetch assets for and write every node of `entity`
    pub async fn materialize(
        &self,
        entity: &str,
        nodes: Vec<MaterializedNode>,
        asset_fields: &[String],
    ) -> EntityMaterialization {
        let mut result = EntityMaterialization::new(entity);
        let batches = chunk(nodes, self.batch_size);
        let batch_count = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            log::debug!(
                "Materializing {} batch {}/{} ({} nodes)",
                entity,
                index + 1,
                batch_count,
                batch.len()
            );
            let logged = result.failures.len();
            let outcomes = join_all(
                batch
                    .into_iter()
                    .map(|node| self.materialize_node(node, asset_fields)),
            )
            .await;

            for outcome in outcomes {
                result.assets_fetched += outcome.fetched;
                result.asset_failures += outcome.failed;
                result.accumulator.asset_requests.extend(outcome.requests);
                result.record_write(outcome.node.id.clone(), outcome.write);
                result.accumulator.nodes.push(outcome.node);
            }
            result.log_batch_failures(logged, index + 1);
        }

        result
    }

    async fn materialize_node(
        &self,
        mut node: MaterializedNode,
        asset_fields: &[String],
    ) -> NodeOutcome {
        let assets =
            materialize_assets(&mut node, asset_fields, self.fetcher, self.store.type_prefix())
                .await;

        let (node, write) = match self.store.create_node(node.clone()).await {
            Ok(stored) => (stored, Ok(())),
            Err(e) => (node, Err(e)),
        };

        NodeOutcome {
            node,
            requests: assets.requests,
            fetched: assets.fetched,
            failed: assets.failed,
            write,
        }
    }

    /// Replay a cached run of `entity` through the same batching
    ///
    /// Stored asset requests are re-issued first, then every stored node is
    /// written again with its previous owner cleared.
    pub async fn replay(
        &self,
        entity: &str,
        accumulator: TransformationAccumulator,
    ) -> EntityMaterialization {
        let mut result = EntityMaterialization::new(entity);

        for batch in chunk(accumulator.asset_requests.clone(), self.batch_size) {
            let settled =
                join_all(batch.iter().map(|request| self.fetcher.fetch_asset(request))).await;
            for (request, fetched) in batch.iter().zip(settled) {
                match fetched {
                    Ok(_) => result.assets_fetched += 1,
                    Err(e) => {
                        result.asset_failures += 1;
                        log::error!(
                            "Error when replaying asset {} for {} `{}` field `{}`: {}",
                            request.url,
                            entity,
                            request.parent_node_id,
                            request.field,
                            e
                        );
                    }
                }
            }
        }

        for (index, batch) in chunk(accumulator.nodes.clone(), self.batch_size)
            .into_iter()
            .enumerate()
        {
            let logged = result.failures.len();
            let written = join_all(batch.into_iter().map(|mut node| async move {
                node.clear_owner();
                let node_id = node.id.clone();
                (node_id, self.store.create_node(node).await.map(|_| ()))
            }))
            .await;

            for (node_id, write) in written {
                result.record_write(node_id, write);
            }
            result.log_batch_failures(logged, index + 1);
        }

        result.accumulator = accumulator;
        result
    }
}
