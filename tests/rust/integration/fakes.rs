use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use rowgraph::cache::MemoryCacheStore;
use rowgraph::driver::SourceContext;
use rowgraph::materialize::{
    AssetFetchError, AssetFetchRequest, AssetFetcher, AssetNode, ContentStore, NodeWriteError,
};
use rowgraph::node::{MaterializedNode, NodeIdGenerator, TypePrefixedIds};
use rowgraph::schema::{Cardinality, EntityDescriptor};
use rowgraph::source::{ConnectionError, QueryEngine, QueryError, RawRow};

pub const AUTHORS: &str = "SELECT * FROM authors";
pub const BOOKS: &str = "SELECT * FROM books";

pub fn rows(value: Value) -> Vec<RawRow> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

/// Query engine serving fixed rows per statement
#[derive(Default)]
pub struct FakeEngine {
    tables: Mutex<HashMap<String, Vec<RawRow>>>,
    failing: HashSet<String>,
    unreachable: bool,
    executions: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, statement: &str, rows: Vec<RawRow>) -> Self {
        self.set_rows(statement, rows);
        self
    }

    pub fn failing(mut self, statement: &str) -> Self {
        self.failing.insert(statement.to_string());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn set_rows(&self, statement: &str, rows: Vec<RawRow>) {
        self.tables
            .lock()
            .unwrap()
            .insert(statement.to_string(), rows);
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryEngine for FakeEngine {
    async fn connect(&self) -> Result<(), ConnectionError> {
        if self.unreachable {
            return Err(ConnectionError {
                locator: "http://localhost:8123".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<Vec<RawRow>, QueryError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(statement) {
            return Err(QueryError::Execution {
                statement: statement.to_string(),
                message: "no such table".to_string(),
            });
        }
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(statement)
            .cloned()
            .unwrap_or_default())
    }
}

/// Content store keeping every accepted node and asset in memory
pub struct FakeStore {
    ids: TypePrefixedIds,
    nodes: Mutex<Vec<MaterializedNode>>,
    assets: Mutex<Vec<AssetNode>>,
}

impl FakeStore {
    pub fn new() -> Self {
        FakeStore {
            ids: TypePrefixedIds::default(),
            nodes: Mutex::new(Vec::new()),
            assets: Mutex::new(Vec::new()),
        }
    }

    pub fn nodes(&self) -> Vec<MaterializedNode> {
        self.nodes.lock().unwrap().clone()
    }

    pub fn node(&self, id: &str) -> MaterializedNode {
        self.nodes()
            .into_iter()
            .rev()
            .find(|node| node.id == id)
            .unwrap_or_else(|| panic!("node {} was not created", id))
    }

    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.nodes().into_iter().map(|node| node.id).collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        self.nodes.lock().unwrap().clear();
        self.assets.lock().unwrap().clear();
    }
}

impl NodeIdGenerator for FakeStore {
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
impl ContentStore for FakeStore {
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
        node.internal.owner = Some("fake".to_string());
        self.nodes.lock().unwrap().push(node.clone());
        Ok(node)
    }

    async fn create_asset(&self, asset: &AssetNode) -> Result<(), NodeWriteError> {
        self.assets.lock().unwrap().push(asset.clone());
        Ok(())
    }
}

/// Asset fetcher failing for every URL containing a marker
#[derive(Default)]
pub struct FakeFetcher {
    failing_marker: Option<String>,
    requests: Mutex<Vec<AssetFetchRequest>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_when_url_contains(marker: &str) -> Self {
        FakeFetcher {
            failing_marker: Some(marker.to_string()),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<AssetFetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetFetcher for FakeFetcher {
    async fn fetch_asset(&self, request: &AssetFetchRequest) -> Result<AssetNode, AssetFetchError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(marker) = &self.failing_marker {
            if request.url.contains(marker.as_str()) {
                return Err(AssetFetchError::Fetch {
                    url: request.url.clone(),
                    message: "404 Not Found".to_string(),
                });
            }
        }
        Ok(AssetNode {
            id: format!("asset::{}", request.url),
            url: request.url.clone(),
            parent_node_id: request.parent_node_id.clone(),
        })
    }
}

pub struct Harness {
    pub engine: Arc<FakeEngine>,
    pub store: Arc<FakeStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub cache: Arc<MemoryCacheStore>,
}

impl Harness {
    pub fn new(engine: FakeEngine, fetcher: FakeFetcher) -> Self {
        Harness {
            engine: Arc::new(engine),
            store: Arc::new(FakeStore::new()),
            fetcher: Arc::new(fetcher),
            cache: Arc::new(MemoryCacheStore::new()),
        }
    }

    pub fn context(&self) -> SourceContext {
        SourceContext {
            engine: self.engine.clone(),
            store: self.store.clone(),
            fetcher: self.fetcher.clone(),
            cache: self.cache.clone(),
        }
    }
}

pub fn library() -> Vec<EntityDescriptor> {
    vec![
        EntityDescriptor::new("author", AUTHORS, "id"),
        EntityDescriptor::new("book", BOOKS, "id").with_parent(
            "author",
            "authorId",
            Cardinality::OneToMany,
        ),
    ]
}

pub fn library_engine() -> FakeEngine {
    FakeEngine::new()
        .with_rows(
            AUTHORS,
            rows(serde_json::json!([
                {"id": 1, "name": "A"},
                {"id": 2, "name": "B"},
            ])),
        )
        .with_rows(
            BOOKS,
            rows(serde_json::json!([
                {"id": 10, "title": "X", "authorId": 1},
                {"id": 11, "title": "Y", "authorId": 1},
                {"id": 12, "title": "Z", "authorId": 2},
            ])),
        )
}
