use serde_json::json;

use rowgraph::driver::{source_nodes, CacheStatus, SourceError, SourceOptions};
use rowgraph::node::is_link_field;
use rowgraph::schema::{Cardinality, EntityDescriptor};

use super::fakes::{
    library, library_engine, rows, FakeEngine, FakeFetcher, Harness, AUTHORS, BOOKS,
};

#[tokio::test]
async fn test_author_book_example() {
    let harness = Harness::new(library_engine(), FakeFetcher::new());

    let report = source_nodes(&harness.context(), &library(), &SourceOptions::default())
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.total_rows(), 5);
    assert_eq!(report.total_nodes_written(), 5);
    assert_eq!(
        report.entity("author").map(|r| r.cache),
        Some(CacheStatus::Disabled)
    );

    let store = &harness.store;
    assert_eq!(
        store.node("sqlite__author__1").field("books___NODE"),
        Some(&json!(["sqlite__book__10", "sqlite__book__11"]))
    );
    assert_eq!(
        store.node("sqlite__author__2").field("books___NODE"),
        Some(&json!(["sqlite__book__12"]))
    );
    for (book, author) in [("10", "1"), ("11", "1"), ("12", "2")] {
        let node = store.node(&format!("sqlite__book__{}", book));
        assert_eq!(
            node.field("author___NODE"),
            Some(&json!(format!("sqlite__author__{}", author)))
        );
        assert_eq!(node.internal.node_type, "SqliteBook");
    }

    // Entities without a parent relation carry no parent link
    let author = store.node("sqlite__author__1");
    assert_eq!(author.field("name"), Some(&json!("A")));
    let links: Vec<&String> = author
        .fields
        .keys()
        .filter(|field| is_link_field(field))
        .collect();
    assert_eq!(links, vec!["books___NODE", "sqliteImages___NODE"]);
}

#[tokio::test]
async fn test_one_to_one_child_link() {
    let entities = vec![
        EntityDescriptor::new("author", AUTHORS, "id"),
        EntityDescriptor::new("book", BOOKS, "id").with_parent(
            "author",
            "authorId",
            Cardinality::OneToOne,
        ),
    ];
    let engine = library_engine().with_rows(
        AUTHORS,
        rows(json!([{"id": 1}, {"id": 2}, {"id": 3}])),
    );
    let harness = Harness::new(engine, FakeFetcher::new());

    source_nodes(&harness.context(), &entities, &SourceOptions::default())
        .await
        .unwrap();

    let store = &harness.store;
    assert_eq!(
        store.node("sqlite__author__1").field("book___NODE"),
        Some(&json!("sqlite__book__10"))
    );
    assert_eq!(store.node("sqlite__author__3").field("book___NODE"), None);
}

#[tokio::test]
async fn test_failed_query_skips_only_that_entity() {
    let harness = Harness::new(library_engine().failing(BOOKS), FakeFetcher::new());

    let report = source_nodes(&harness.context(), &library(), &SourceOptions::default())
        .await
        .unwrap();

    assert_eq!(report.failed_entities.len(), 1);
    assert_eq!(report.failed_entities[0].0, "book");
    assert!(!report.is_clean());
    assert_eq!(
        harness.store.node_ids(),
        vec!["sqlite__author__1", "sqlite__author__2"]
    );
    assert_eq!(harness.store.node("sqlite__author__1").field("books___NODE"), None);
}

#[tokio::test]
async fn test_connection_failure_is_fatal() {
    let harness = Harness::new(library_engine().unreachable(), FakeFetcher::new());

    let result = source_nodes(&harness.context(), &library(), &SourceOptions::default()).await;

    assert!(matches!(result, Err(SourceError::Connection(_))));
    assert_eq!(harness.engine.executions(), 0);
    assert!(harness.store.nodes().is_empty());
}

#[tokio::test]
async fn test_legacy_single_parent_descriptor() {
    let entities: Vec<EntityDescriptor> = serde_yaml::from_str(
        r#"
- name: author
  statement: SELECT * FROM authors
  idFieldName: id
- name: book
  statement: SELECT * FROM books
  idFieldName: id
  parentName: author
  foreignKey: authorId
"#,
    )
    .unwrap();
    let harness = Harness::new(library_engine(), FakeFetcher::new());

    source_nodes(&harness.context(), &entities, &SourceOptions::default())
        .await
        .unwrap();

    assert_eq!(
        harness.store.node("sqlite__author__2").field("books___NODE"),
        Some(&json!(["sqlite__book__12"]))
    );
}

#[tokio::test]
async fn test_empty_result_produces_no_nodes() {
    let harness = Harness::new(FakeEngine::new(), FakeFetcher::new());

    let report = source_nodes(&harness.context(), &library(), &SourceOptions::default())
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.total_nodes_written(), 0);
    assert!(harness.store.nodes().is_empty());
}
