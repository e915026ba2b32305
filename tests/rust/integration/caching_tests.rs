use std::sync::Arc;

use serde_json::json;

use rowgraph::cache::FileCacheStore;
use rowgraph::driver::{source_nodes, CacheStatus, SourceContext, SourceOptions};
use rowgraph::schema::EntityDescriptor;

use super::fakes::{
    library, library_engine, rows, FakeEngine, FakeFetcher, FakeStore, Harness, BOOKS,
};

fn memoized() -> SourceOptions {
    SourceOptions {
        cache_transformation_by_rowcount: true,
        ..Default::default()
    }
}

fn illustrated_library() -> Vec<EntityDescriptor> {
    let mut entities = library();
    entities[1] = entities[1].clone().with_asset_fields(["cover"]);
    entities
}

fn illustrated_engine() -> FakeEngine {
    library_engine().with_rows(
        BOOKS,
        rows(json!([
            {"id": 10, "title": "X", "authorId": 1, "cover": "https://img.example/10.png"},
            {"id": 11, "title": "Y", "authorId": 1, "cover": "https://img.example/11.png"},
            {"id": 12, "title": "Z", "authorId": 2, "cover": null},
        ])),
    )
}

#[tokio::test]
async fn test_unchanged_row_count_replays_cached_nodes() {
    let harness = Harness::new(illustrated_engine(), FakeFetcher::new());
    let entities = illustrated_library();

    let first = source_nodes(&harness.context(), &entities, &memoized())
        .await
        .unwrap();
    assert_eq!(first.entity("book").map(|r| r.cache), Some(CacheStatus::Miss));
    let first_nodes = harness.store.nodes();
    let first_requests = harness.fetcher.requests();
    assert_eq!(first_requests.len(), 2);

    harness.store.clear();
    let second = source_nodes(&harness.context(), &entities, &memoized())
        .await
        .unwrap();

    assert!(second.is_clean());
    assert_eq!(second.entity("book").map(|r| r.cache), Some(CacheStatus::Hit));
    assert_eq!(second.entity("author").map(|r| r.cache), Some(CacheStatus::Hit));
    assert_eq!(second.total_nodes_written(), 5);

    // Same ids and link fields, assets fetched again with the stored parameters only
    let mut second_nodes = harness.store.nodes();
    let mut first_sorted = first_nodes;
    first_sorted.sort_by(|a, b| a.id.cmp(&b.id));
    second_nodes.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(
        first_sorted.iter().map(|n| &n.fields).collect::<Vec<_>>(),
        second_nodes.iter().map(|n| &n.fields).collect::<Vec<_>>()
    );
    let requests = harness.fetcher.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[2..], first_requests[..]);
    assert_eq!(
        harness.store.node("sqlite__book__10").field("sqliteImage___NODE"),
        Some(&json!("asset::https://img.example/10.png"))
    );
}

#[tokio::test]
async fn test_changed_row_count_rematerializes() {
    let harness = Harness::new(library_engine(), FakeFetcher::new());
    source_nodes(&harness.context(), &library(), &memoized())
        .await
        .unwrap();

    harness.engine.set_rows(
        BOOKS,
        rows(json!([
            {"id": 10, "title": "X", "authorId": 1},
            {"id": 11, "title": "Y", "authorId": 1},
            {"id": 12, "title": "Z", "authorId": 2},
            {"id": 13, "title": "W", "authorId": 2},
        ])),
    );
    harness.store.clear();
    let report = source_nodes(&harness.context(), &library(), &memoized())
        .await
        .unwrap();

    assert_eq!(report.entity("book").map(|r| r.cache), Some(CacheStatus::Miss));
    assert_eq!(report.entity("book").map(|r| r.nodes_written), Some(4));
    assert_eq!(
        harness.store.node("sqlite__book__13").field("author___NODE"),
        Some(&json!("sqlite__author__2"))
    );
    // The author row count did not change, so its cached nodes replay as they were
    assert_eq!(report.entity("author").map(|r| r.cache), Some(CacheStatus::Hit));
    assert_eq!(
        harness.store.node("sqlite__author__2").field("books___NODE"),
        Some(&json!(["sqlite__book__12"]))
    );
}

#[tokio::test]
async fn test_query_cache_skips_second_execution() {
    let harness = Harness::new(library_engine(), FakeFetcher::new());
    let options = SourceOptions {
        cache_query_results: true,
        ..Default::default()
    };

    source_nodes(&harness.context(), &library(), &options)
        .await
        .unwrap();
    source_nodes(&harness.context(), &library(), &options)
        .await
        .unwrap();

    assert_eq!(harness.engine.executions(), 2);
    assert!(harness.cache.contains_key("query-SELECT * FROM books"));
}

#[tokio::test]
async fn test_file_cache_survives_between_runs() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = Arc::new(library_engine());
    let fetcher = Arc::new(FakeFetcher::new());

    let mut statuses = Vec::new();
    for _ in 0..2 {
        let store = Arc::new(FakeStore::new());
        let ctx = SourceContext {
            engine: engine.clone(),
            store: store.clone(),
            fetcher: fetcher.clone(),
            cache: Arc::new(FileCacheStore::open(dir.path()).await.unwrap()),
        };
        let report = source_nodes(&ctx, &library(), &memoized()).await.unwrap();
        assert_eq!(store.node_ids().len(), 5);
        statuses.push(report.entity("book").map(|r| r.cache));
    }

    assert_eq!(
        statuses,
        vec![Some(CacheStatus::Miss), Some(CacheStatus::Hit)]
    );
}
