//! In-memory collaborators for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::assets::{AssetFetchError, AssetFetchRequest, AssetFetcher, AssetNode};
use super::content_store::{ContentStore, NodeWriteError};
use crate::node::{MaterializedNode, NodeIdGenerator, TypePrefixedIds};

/// Content store that records write start/end events and accepted nodes
pub struct RecordingStore {
    ids: TypePrefixedIds,
    failing: HashSet<String>,
    events: Mutex<Vec<String>>,
    nodes: Mutex<Vec<MaterializedNode>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        RecordingStore {
            ids: TypePrefixedIds::default(),
            failing: HashSet::new(),
            events: Mutex::new(Vec::new()),
            nodes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, node_id: &str) -> Self {
        self.failing.insert(node_id.to_string());
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("no event {}", event))
    }

    pub fn nodes(&self) -> Vec<MaterializedNode> {
        self.nodes.lock().unwrap().clone()
    }
}

impl NodeIdGenerator for RecordingStore {
    fn generate_node_id(&self, entity: &str, raw_id: &Value) -> String {
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
impl ContentStore for RecordingStore {
    async fn create_node(
        &self,
        mut node: MaterializedNode,
    ) -> Result<MaterializedNode, NodeWriteError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("start:{}", node.id));
        tokio::task::yield_now().await;
        self.events.lock().unwrap().push(format!("end:{}", node.id));

        if let Some(owner) = node.owner() {
            return Err(NodeWriteError::AlreadyOwned {
                node_id: node.id.clone(),
                owner: owner.to_string(),
            });
        }
        if self.failing.contains(&node.id) {
            return Err(NodeWriteError::Rejected {
                node_id: node.id.clone(),
                message: "scripted failure".to_string(),
            });
        }

        node.internal.owner = Some("test".to_string());
        self.nodes.lock().unwrap().push(node.clone());
        Ok(node)
    }
}

/// Asset fetcher that succeeds unless the field is scripted to fail
pub struct ScriptedFetcher {
    failing_fields: HashSet<String>,
    requests: Mutex<Vec<AssetFetchRequest>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        ScriptedFetcher {
            failing_fields: HashSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_field(mut self, field: &str) -> Self {
        self.failing_fields.insert(field.to_string());
        self
    }

    pub fn requests(&self) -> Vec<AssetFetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetFetcher for ScriptedFetcher {
    async fn fetch_asset(&self, request: &AssetFetchRequest) -> Result<AssetNode, AssetFetchError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing_fields.contains(&request.field) {
            return Err(AssetFetchError::Fetch {
                url: request.url.clone(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(AssetNode {
            id: format!("asset:{}:{}", request.parent_node_id, request.field),
            url: request.url.clone(),
            parent_node_id: request.parent_node_id.clone(),
        })
    }
}
