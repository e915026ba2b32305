//! Content store seam and the NDJSON sink used by the command line.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use super::assets::AssetNode;
use crate::node::{MaterializedNode, NodeIdGenerator, TypePrefixedIds};

/// Owner stamped on nodes accepted by [`NdjsonContentStore`]
pub const DEFAULT_OWNER: &str = "rowgraph";

#[derive(Debug, Error)]
pub enum NodeWriteError {
    #[error("Node `{node_id}` is already owned by `{owner}`")]
    AlreadyOwned { node_id: String, owner: String },
    #[error("Node `{node_id}` could not be serialized: {source}")]
    Serialize {
        node_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Node `{node_id}` could not be written: {source}")]
    Io {
        node_id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Node `{node_id}` was rejected: {message}")]
    Rejected { node_id: String, message: String },
}

/// Upsert primitive of the external content store
///
/// Also supplies the node id scheme, so identifiers always match the store
/// that receives the nodes.
#[async_trait]
pub trait ContentStore: NodeIdGenerator {
    /// Store `node`, returning the value as accepted (owner stamped)
    ///
    /// Writes of an identical node id are idempotent. A node that already
    /// carries an owner is rejected.
    async fn create_node(&self, node: MaterializedNode)
        -> Result<MaterializedNode, NodeWriteError>;

    /// Store an asset node produced by an asset fetcher
    async fn create_asset(&self, _asset: &AssetNode) -> Result<(), NodeWriteError> {
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    Node(&'a MaterializedNode),
    Asset(&'a AssetNode),
}

/// Writes one JSON object per line to any async sink
pub struct NdjsonContentStore<W> {
    ids: TypePrefixedIds,
    owner: String,
    sink: Mutex<W>,
    // node id -> digest of the last written version
    written: Mutex<HashMap<String, String>>,
}

impl<W: AsyncWrite + Unpin + Send> NdjsonContentStore<W> {
    pub fn new(ids: TypePrefixedIds, sink: W) -> Self {
        NdjsonContentStore {
            ids,
            owner: DEFAULT_OWNER.to_string(),
            sink: Mutex::new(sink),
            written: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub async fn flush(&self) -> std::io::Result<()> {
        self.sink.lock().await.flush().await
    }

    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }

    async fn write_record(&self, node_id: &str, record: &Record<'_>) -> Result<(), NodeWriteError> {
        let mut line = serde_json::to_vec(record).map_err(|source| NodeWriteError::Serialize {
            node_id: node_id.to_string(),
            source,
        })?;
        line.push(b'\n');

        let mut sink = self.sink.lock().await;
        sink.write_all(&line)
            .await
            .map_err(|source| NodeWriteError::Io {
                node_id: node_id.to_string(),
                source,
            })
    }
}

impl NdjsonContentStore<BufWriter<tokio::fs::File>> {
    /// Truncate or create `path` and write nodes to it
    pub async fn create_file(ids: TypePrefixedIds, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Self::new(ids, BufWriter::new(file)))
    }
}

impl<W: Send> NodeIdGenerator for NdjsonContentStore<W> {
    fn generate_node_id(&self, entity: &str, raw_id: &serde_json::Value) -> String {
        self.ids.generate_node_id(entity, raw_id)
    }

    fn node_type(&self, entity: &str) -> String {
        self.ids.node_type(entity)
    }

    fn type_prefix(&self) -> &str {
        self.ids.type_prefix()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ContentStore for NdjsonContentStore<W> {
    async fn create_node(
        &self,
        mut node: MaterializedNode,
    ) -> Result<MaterializedNode, NodeWriteError> {
        if let Some(owner) = node.owner() {
            return Err(NodeWriteError::AlreadyOwned {
                node_id: node.id.clone(),
                owner: owner.to_string(),
            });
        }
        node.internal.owner = Some(self.owner.clone());

        let mut written = self.written.lock().await;
        if written.get(&node.id) == Some(&node.internal.content_digest) {
            log::debug!("Node {} unchanged, skipping write", node.id);
            return Ok(node);
        }

        self.write_record(&node.id, &Record::Node(&node)).await?;
        written.insert(node.id.clone(), node.internal.content_digest.clone());
        Ok(node)
    }

    async fn create_asset(&self, asset: &AssetNode) -> Result<(), NodeWriteError> {
        self.write_record(&asset.id, &Record::Asset(asset)).await
    }
}
