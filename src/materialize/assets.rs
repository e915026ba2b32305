//! Remote asset materialization.
//!
//! Every declared asset field with a value triggers one fetch. Fetches for a
//! node run concurrently and settle independently: a failed fetch is logged
//! and dropped, the node and its other fields carry on.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::content_store::{ContentStore, NodeWriteError};
use crate::node::node_id::render_raw_id;
use crate::node::{asset_link_field, assets_link_field, MaterializedNode};

/// Parameters of one asset fetch; cached and replayed verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFetchRequest {
    pub url: String,
    pub parent_node_id: String,
    /// Field of the owning node the URL came from
    pub field: String,
}

/// Asset node produced by a fetcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetNode {
    pub id: String,
    pub url: String,
    pub parent_node_id: String,
}

#[derive(Debug, Error)]
pub enum AssetFetchError {
    #[error("Unsupported asset URL `{url}`")]
    UnsupportedUrl { url: String },
    #[error("Error when getting asset {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("Asset {url} could not be stored: {source}")]
    Store {
        url: String,
        #[source]
        source: NodeWriteError,
    },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch_asset(&self, request: &AssetFetchRequest) -> Result<AssetNode, AssetFetchError>;
}

/// Result of materializing the assets of one node
#[derive(Debug, Default)]
pub struct AssetOutcome {
    /// Every fetch that was issued, failed ones included
    pub requests: Vec<AssetFetchRequest>,
    pub fetched: usize,
    pub failed: usize,
}

/// Whether a field value names an asset to fetch
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Fetch the assets declared on `node` and link the ones that arrive
///
/// Sets the singular asset link only when exactly one asset field is declared
/// and at least one fetch succeeded; always sets the plural asset link.
pub async fn materialize_assets(
    node: &mut MaterializedNode,
    asset_fields: &[String],
    fetcher: &dyn AssetFetcher,
    type_prefix: &str,
) -> AssetOutcome {
    let requests: Vec<AssetFetchRequest> = asset_fields
        .iter()
        .filter_map(|field| {
            node.field(field)
                .filter(|value| is_present(value))
                .map(|value| AssetFetchRequest {
                    url: render_raw_id(value),
                    parent_node_id: node.id.clone(),
                    field: field.clone(),
                })
        })
        .collect();

    let settled = join_all(requests.iter().map(|request| fetcher.fetch_asset(request))).await;

    let mut asset_ids = Vec::new();
    let mut failed = 0;
    for (request, result) in requests.iter().zip(settled) {
        match result {
            Ok(asset) => asset_ids.push(Value::String(asset.id)),
            Err(e) => {
                failed += 1;
                log::error!(
                    "Error when getting asset {} for {} `{}` field `{}`: {}",
                    request.url,
                    node.entity,
                    node.id,
                    request.field,
                    e
                );
            }
        }
    }

    if asset_fields.len() == 1 {
        if let Some(first) = asset_ids.first() {
            node.set_field(asset_link_field(type_prefix), first.clone());
        }
    }
    let fetched = asset_ids.len();
    node.set_field(assets_link_field(type_prefix), Value::Array(asset_ids));

    AssetOutcome {
        requests,
        fetched,
        failed,
    }
}

/// Fetcher that records remote assets as link nodes without downloading them
///
/// The asset id is derived from the owning node and the URL, so replays land
/// on the same asset node.
pub struct LinkAssetFetcher {
    store: Arc<dyn ContentStore>,
}

impl LinkAssetFetcher {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        LinkAssetFetcher { store }
    }

    fn asset_id(&self, request: &AssetFetchRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.parent_node_id.as_bytes());
        hasher.update(b"\n");
        hasher.update(request.url.as_bytes());
        let digest = hex::encode(hasher.finalize());
        self.store
            .generate_node_id("asset", &Value::String(digest[..32].to_string()))
    }
}

#[async_trait]
impl AssetFetcher for LinkAssetFetcher {
    async fn fetch_asset(&self, request: &AssetFetchRequest) -> Result<AssetNode, AssetFetchError> {
        let url = request.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AssetFetchError::UnsupportedUrl {
                url: request.url.clone(),
            });
        }

        let asset = AssetNode {
            id: self.asset_id(request),
            url: url.to_string(),
            parent_node_id: request.parent_node_id.clone(),
        };
        self.store
            .create_asset(&asset)
            .await
            .map_err(|source| AssetFetchError::Store {
                url: request.url.clone(),
                source,
            })?;

        Ok(asset)
    }
}
