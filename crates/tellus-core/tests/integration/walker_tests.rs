//! Integration tests for CatalogWalker.
//!
//! These tests drive whole catalog trees through the walker using the
//! in-memory store and fetcher.

use serde_json::{Value, json};
use tellus_core::walker::CatalogWalker;
use tellus_core::{
    AppError, HarvestConfig, HarvestTask, LogLevel, NodeKind, TaskLogger, compute_digest,
};

use crate::integration::common::{MockMetadataStore, MockPayloadFetcher};

type Walker = CatalogWalker<MockMetadataStore, MockPayloadFetcher>;

fn indexable_config() -> HarvestConfig {
    HarvestConfig::default().with_default_indexable(true)
}

fn walker(config: HarvestConfig) -> (Walker, MockMetadataStore, MockPayloadFetcher) {
    let store = MockMetadataStore::new();
    let fetcher = MockPayloadFetcher::new();
    let walker = CatalogWalker::new(store.clone(), fetcher.clone(), config);
    (walker, store, fetcher)
}

fn simple_catalog() -> Value {
    json!({
        "identifier": "c1",
        "dataset": [{
            "identifier": "d1",
            "distribution": [{
                "identifier": "dist1",
                "downloadURL": "file:///tmp/a.csv",
                "field": [{"id": "f1"}]
            }]
        }]
    })
}

/// Runs the walker over `catalog` with a fresh task.
async fn run(walker: &Walker, catalog: &Value, id: &str) -> (tellus_core::CatalogIngest, HarvestTask) {
    let mut task = HarvestTask::new(id);
    let ingest = walker
        .ingest_catalog(catalog, id, &mut task)
        .await
        .expect("catalog ingest should not fail");
    (ingest, task)
}

/// The reference scenario: created, unchanged, then changed content.
#[tokio::test]
async fn test_local_payload_lifecycle() {
    // Arrange
    let (walker, store, fetcher) = walker(indexable_config());
    let catalog = simple_catalog();
    fetcher.set("file:///tmp/a.csv", b"a,b\n1,2");

    // Act: run 1
    let (first, task) = run(&walker, &catalog, "c1").await;

    // Assert: everything created, distribution indexable
    assert!(first.created);
    assert!(first.catalog.updated);
    assert!(task.logs.is_empty());
    let c1 = store.catalog("c1");
    let d1 = store.child(&c1, NodeKind::Dataset, "d1");
    let dist1 = store.child(&d1, NodeKind::Distribution, "dist1");
    let f1 = store.child(&dist1, NodeKind::Field, "f1");
    assert!(dist1.indexable);
    assert_eq!(dist1.content_digest, Some(compute_digest(b"a,b\n1,2")));
    assert!(dist1.payload.is_some());
    assert!(d1.updated && dist1.updated && f1.updated);

    // Act: run 2, file unchanged
    let (second, _) = run(&walker, &catalog, "c1").await;

    // Assert
    let dist1_again = store.child(&d1, NodeKind::Distribution, "dist1");
    assert!(!second.created);
    assert!(!second.catalog.updated);
    assert!(!dist1_again.indexable);
    assert_eq!(dist1_again.content_digest, dist1.content_digest);
    assert_eq!(dist1_again.last_content_update, dist1.last_content_update);

    // Act: run 3, file changed
    fetcher.set("file:///tmp/a.csv", b"a,b\n1,3");
    let (third, _) = run(&walker, &catalog, "c1").await;

    // Assert
    let dist1_changed = store.child(&d1, NodeKind::Distribution, "dist1");
    assert!(third.catalog.updated);
    assert!(dist1_changed.indexable);
    assert_eq!(
        dist1_changed.content_digest,
        Some(compute_digest(b"a,b\n1,3"))
    );
    assert_eq!(store.payload_writes(), 2);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    // Arrange
    let (walker, store, fetcher) = walker(indexable_config());
    let catalog = json!({
        "identifier": "c1",
        "title": "Catalog",
        "dataset": [
            {"identifier": "d1", "distribution": [
                {"identifier": "x", "downloadURL": "https://example.org/x.csv",
                 "field": [{"id": "f1", "title": "a"}, {"id": "f2", "title": "b"}]},
                {"identifier": "y", "downloadURL": "https://example.org/y.csv"}
            ]},
            {"identifier": "d2"}
        ]
    });
    fetcher.set("https://example.org/x.csv", b"x");
    fetcher.set("https://example.org/y.csv", b"y");
    run(&walker, &catalog, "c1").await;
    let before = store.all(NodeKind::Distribution);

    // Act
    let (second, task) = run(&walker, &catalog, "c1").await;

    // Assert
    assert!(task.logs.is_empty());
    assert!(!second.catalog.updated);
    for kind in NodeKind::ALL {
        for node in store.all(kind) {
            assert!(!node.updated, "{} {} should not be updated", kind, node.identifier);
            assert_eq!(store.save_count(node.id), 2, "one save per run");
        }
    }
    for node in before {
        let after = store
            .all(NodeKind::Distribution)
            .into_iter()
            .find(|n| n.id == node.id)
            .unwrap();
        assert_eq!(after.content_digest, node.content_digest);
        assert_eq!(after.last_content_update, node.last_content_update);
    }
    assert_eq!(store.payload_writes(), 2, "unchanged payloads are not rewritten");
    assert_eq!(second.stats.datasets.unchanged, 2);
    assert_eq!(second.stats.payloads_fetched, 2);
    assert_eq!(second.stats.indexable, 0);
}

#[tokio::test]
async fn test_identifiers_are_scoped_to_parent() {
    // Arrange
    let (walker, store, _) = walker(HarvestConfig::default());
    let first = json!({"identifier": "c1", "dataset": [
        {"identifier": "d1", "title": "First", "distribution": [{"identifier": "x"}]}
    ]});
    let second = json!({"identifier": "c2", "dataset": [
        {"identifier": "d1", "title": "Second", "distribution": [{"identifier": "x"}]}
    ]});

    // Act
    run(&walker, &first, "c1").await;
    let (_, task) = run(&walker, &second, "c2").await;

    // Assert
    assert!(task.logs.is_empty());
    assert_eq!(store.count(NodeKind::Dataset), 2);
    assert_eq!(store.count(NodeKind::Distribution), 2);
    let d1_a = store.child(&store.catalog("c1"), NodeKind::Dataset, "d1");
    let d1_b = store.child(&store.catalog("c2"), NodeKind::Dataset, "d1");
    assert_ne!(d1_a.id, d1_b.id);
    assert_eq!(d1_a.title.as_deref(), Some("First"));
    assert_eq!(d1_b.title.as_deref(), Some("Second"));
}

#[tokio::test]
async fn test_payload_change_propagates_to_catalog() {
    // Arrange
    let (walker, store, fetcher) = walker(indexable_config());
    let catalog = json!({"identifier": "c1", "title": "Same", "dataset": [
        {"identifier": "d1", "title": "Same", "distribution": [
            {"identifier": "dist1", "downloadURL": "https://example.org/a.csv"}
        ]},
        {"identifier": "d2", "title": "Untouched"}
    ]});
    fetcher.set("https://example.org/a.csv", b"v1");
    run(&walker, &catalog, "c1").await;

    // Act
    fetcher.set("https://example.org/a.csv", b"v2");
    let (ingest, _) = run(&walker, &catalog, "c1").await;

    // Assert
    let c1 = store.catalog("c1");
    let d1 = store.child(&c1, NodeKind::Dataset, "d1");
    let d2 = store.child(&c1, NodeKind::Dataset, "d2");
    let dist1 = store.child(&d1, NodeKind::Distribution, "dist1");
    assert!(dist1.updated);
    assert!(d1.updated);
    assert!(c1.updated);
    assert!(ingest.catalog.updated);
    assert!(!d2.updated, "siblings of the change stay unchanged");
    assert_eq!(ingest.stats.indexable, 1);
}

#[tokio::test]
async fn test_own_title_change_does_not_set_updated() {
    // Arrange
    let (walker, store, _) = walker(HarvestConfig::default());
    run(&walker, &json!({"identifier": "c1", "title": "Old"}), "c1").await;

    // Act
    let (ingest, _) = run(&walker, &json!({"identifier": "c1", "title": "New"}), "c1").await;

    // Assert
    assert!(!ingest.catalog.updated);
    assert_eq!(store.catalog("c1").title.as_deref(), Some("New"));
}

#[tokio::test]
async fn test_blacklisted_keys_are_not_persisted() {
    // Arrange
    let config = HarvestConfig::default()
        .with_blacklist(NodeKind::Catalog, ["themeTaxonomy", "publisher"])
        .with_blacklist(NodeKind::Dataset, ["spatial"])
        .with_blacklist(NodeKind::Distribution, ["byteSize"])
        .with_blacklist(NodeKind::Field, ["units"]);
    let (walker, store, _) = walker(config);
    let catalog = json!({
        "identifier": "c1",
        "themeTaxonomy": [],
        "publisher": {"name": "x"},
        "dataset": [{
            "identifier": "d1",
            "spatial": "AR",
            "keyword": ["k"],
            "distribution": [{
                "identifier": "dist1",
                "byteSize": 10,
                "field": [{"id": "f1", "units": "m", "type": "number"}]
            }]
        }]
    });

    // Act
    run(&walker, &catalog, "c1").await;

    // Assert
    let c1 = store.catalog("c1");
    let d1 = store.child(&c1, NodeKind::Dataset, "d1");
    let dist1 = store.child(&d1, NodeKind::Distribution, "dist1");
    let f1 = store.child(&dist1, NodeKind::Field, "f1");

    assert_eq!(c1.metadata, json!({"identifier": "c1"}));
    assert_eq!(d1.metadata, json!({"identifier": "d1", "keyword": ["k"]}));
    assert_eq!(dist1.metadata, json!({"identifier": "dist1"}));
    assert_eq!(f1.metadata, json!({"id": "f1", "type": "number"}));
}

#[tokio::test]
async fn test_failing_dataset_is_isolated() {
    // Arrange
    let (walker, store, _) = walker(HarvestConfig::default());
    store.fail_on("d2");
    let catalog = json!({"identifier": "c1", "dataset": [
        {"identifier": "d1"}, {"identifier": "d2"}, {"identifier": "d3"}
    ]});

    // Act
    let mut task = HarvestTask::new("c1");
    let result = walker.ingest_catalog(&catalog, "c1", &mut task).await;

    // Assert
    let ingest = result.expect("dataset failures must not escape");
    let c1 = store.catalog("c1");
    assert!(store.find(NodeKind::Dataset, Some(&c1), "d1").is_some());
    assert!(store.find(NodeKind::Dataset, Some(&c1), "d2").is_none());
    assert!(store.find(NodeKind::Dataset, Some(&c1), "d3").is_some());

    let entries: Vec<_> = task.entries_for("d2").collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, LogLevel::Error);
    assert_eq!(entries[0].entity.as_ref().unwrap().kind, NodeKind::Dataset);
    assert_eq!(task.logs.len(), 1);
    assert_eq!(ingest.stats.datasets.failed, 1);
    assert_eq!(ingest.stats.datasets.created, 2);
}

#[tokio::test]
async fn test_missing_identifiers_are_logged() {
    // Arrange
    let (walker, store, _) = walker(HarvestConfig::default());
    let catalog = json!({"identifier": "c1", "dataset": [
        {"title": "no identifier"},
        "not an object",
        {"identifier": "d1", "distribution": [
            {"identifier": "dist1", "field": [
                {"title": "valor"},
                {"id": "f1"},
                {"description": "neither id nor title"}
            ]}
        ]}
    ]});

    // Act
    let (ingest, task) = run(&walker, &catalog, "c1").await;

    // Assert
    assert_eq!(task.errors().count(), 3);
    assert_eq!(ingest.stats.datasets.failed, 2);
    assert_eq!(ingest.stats.fields.failed, 1);
    assert_eq!(ingest.stats.fields.created, 2);
    let d1 = store.child(&store.catalog("c1"), NodeKind::Dataset, "d1");
    let dist1 = store.child(&d1, NodeKind::Distribution, "dist1");
    assert!(store.find(NodeKind::Field, Some(&dist1), "f1").is_some());

    // A field without an id is kept, keyed by its title
    let titled = store
        .find(NodeKind::Field, Some(&dist1), "")
        .expect("title-only field should be stored");
    assert_eq!(titled.title.as_deref(), Some("valor"));
}

#[tokio::test]
async fn test_title_only_fields_are_distinct_and_idempotent() {
    // Arrange
    let (walker, store, _) = walker(HarvestConfig::default());
    let catalog = json!({"identifier": "c1", "dataset": [{"identifier": "d1", "distribution": [
        {"identifier": "dist1", "field": [{"title": "fecha"}, {"title": "valor"}]}
    ]}]});
    run(&walker, &catalog, "c1").await;

    // Act
    let (second, task) = run(&walker, &catalog, "c1").await;

    // Assert
    assert_eq!(task.errors().count(), 0);
    assert_eq!(store.count(NodeKind::Field), 2);
    assert_eq!(second.stats.fields.created, 0);
    assert_eq!(second.stats.fields.unchanged, 2);
}

#[tokio::test]
async fn test_fetch_failure_keeps_previous_state() {
    // Arrange
    let (walker, store, fetcher) = walker(indexable_config());
    let catalog = json!({"identifier": "c1", "dataset": [{"identifier": "d1", "distribution": [
        {"identifier": "bad", "downloadURL": "https://example.org/bad.csv"},
        {"identifier": "good", "downloadURL": "https://example.org/good.csv"}
    ]}]});
    fetcher.set("https://example.org/bad.csv", b"v1");
    fetcher.set("https://example.org/good.csv", b"g1");
    run(&walker, &catalog, "c1").await;
    let d1 = store.child(&store.catalog("c1"), NodeKind::Dataset, "d1");
    let before = store.child(&d1, NodeKind::Distribution, "bad");

    // Act
    fetcher.fail("https://example.org/bad.csv", 503);
    fetcher.set("https://example.org/good.csv", b"g2");
    let (ingest, task) = run(&walker, &catalog, "c1").await;

    // Assert
    let after = store.child(&d1, NodeKind::Distribution, "bad");
    assert_eq!(after.content_digest, before.content_digest);
    assert_eq!(after.indexable, before.indexable);
    assert_eq!(after.last_content_update, before.last_content_update);

    let good = store.child(&d1, NodeKind::Distribution, "good");
    assert!(good.indexable);
    assert!(ingest.catalog.updated);

    let entries: Vec<_> = task.entries_for("bad").collect();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("503"));
    assert_eq!(ingest.stats.distributions.failed, 1);
}

#[tokio::test]
async fn test_ineligible_dataset_is_not_fetched() {
    // Arrange
    let (walker, store, fetcher) = walker(HarvestConfig::default());
    fetcher.set("https://example.org/a.csv", b"a");
    let catalog = json!({"identifier": "c1", "dataset": [{"identifier": "d1", "distribution": [
        {"identifier": "dist1", "downloadURL": "https://example.org/a.csv"}
    ]}]});

    // Act
    let (ingest, _) = run(&walker, &catalog, "c1").await;

    // Assert
    assert_eq!(fetcher.fetch_count(), 0);
    let d1 = store.child(&store.catalog("c1"), NodeKind::Dataset, "d1");
    let dist1 = store.child(&d1, NodeKind::Distribution, "dist1");
    assert!(!d1.indexable_eligible);
    assert!(!dist1.indexable);
    assert!(dist1.content_digest.is_none());
    assert_eq!(dist1.download_url.as_deref(), Some("https://example.org/a.csv"));
    assert_eq!(ingest.stats.payloads_fetched, 0);
}

#[tokio::test]
async fn test_missing_download_url_fails_distribution() {
    // Arrange
    let (walker, store, _) = walker(indexable_config());
    let catalog = json!({"identifier": "c1", "dataset": [{"identifier": "d1", "distribution": [
        {"identifier": "dist1"}
    ]}]});

    // Act
    let (ingest, task) = run(&walker, &catalog, "c1").await;

    // Assert
    assert_eq!(task.entries_for("dist1").count(), 1);
    assert_eq!(ingest.stats.distributions.failed, 1);
    let d1 = store.child(&store.catalog("c1"), NodeKind::Dataset, "d1");
    assert!(d1.updated);
}

#[tokio::test]
async fn test_time_series_only_filters_datasets() {
    // Arrange
    let (walker, store, _) = walker(HarvestConfig::default().with_time_series_only(true));
    let catalog = json!({"identifier": "c1", "dataset": [
        {"identifier": "series", "distribution": [{"identifier": "x", "field": [
            {"id": "indice_tiempo", "specialType": "time_index"},
            {"id": "value"}
        ]}]},
        {"identifier": "plain", "distribution": [{"identifier": "y", "field": [{"id": "a"}]}]}
    ]});

    // Act
    let (_, task) = run(&walker, &catalog, "c1").await;

    // Assert
    let c1 = store.catalog("c1");
    assert!(store.find(NodeKind::Dataset, Some(&c1), "series").is_some());
    assert!(store.find(NodeKind::Dataset, Some(&c1), "plain").is_none());
    assert!(task.logs.is_empty());
}

#[tokio::test]
async fn test_time_series_only_empty_logs_info() {
    // Arrange
    let (walker, store, _) = walker(HarvestConfig::default().with_time_series_only(true));
    let catalog = json!({"identifier": "c1", "dataset": [{"identifier": "plain"}]});

    // Act
    let (ingest, task) = run(&walker, &catalog, "c1").await;

    // Assert
    assert_eq!(store.count(NodeKind::Dataset), 0);
    assert_eq!(task.logs.len(), 1);
    assert_eq!(task.logs[0].level, LogLevel::Info);
    assert_eq!(task.errors().count(), 0);
    assert!(ingest.created);
}

#[tokio::test]
async fn test_fields_keyed_by_id_and_title() {
    // Arrange
    let (walker, store, _) = walker(HarvestConfig::default());
    let catalog = json!({"identifier": "c1", "dataset": [{"identifier": "d1", "distribution": [
        {"identifier": "dist1", "field": [
            {"id": "f1", "title": "fecha"},
            {"id": "f1", "title": "valor"}
        ]}
    ]}]});

    // Act
    run(&walker, &catalog, "c1").await;
    let (second, _) = run(&walker, &catalog, "c1").await;

    // Assert
    assert_eq!(store.count(NodeKind::Field), 2);
    assert_eq!(second.stats.fields.unchanged, 2);
}

#[tokio::test]
async fn test_default_titles() {
    // Arrange
    let (walker, store, _) = walker(HarvestConfig::default());
    let catalog = json!({"identifier": "c1", "dataset": [{"identifier": "d1", "distribution": [
        {"identifier": "dist1"}
    ]}]});

    // Act
    run(&walker, &catalog, "c1").await;

    // Assert
    let c1 = store.catalog("c1");
    let d1 = store.child(&c1, NodeKind::Dataset, "d1");
    let dist1 = store.child(&d1, NodeKind::Distribution, "dist1");
    assert_eq!(c1.title.as_deref(), Some("No Title"));
    assert_eq!(d1.title.as_deref(), Some("No Title"));
    assert!(dist1.title.is_none());
}

#[tokio::test]
async fn test_non_object_catalog_is_rejected() {
    let (walker, store, _) = walker(HarvestConfig::default());
    let mut task = HarvestTask::new("c1");

    let result = walker.ingest_catalog(&json!([1, 2]), "c1", &mut task).await;

    assert!(matches!(result, Err(AppError::Generic(_))));
    assert_eq!(store.count(NodeKind::Catalog), 0);
}

#[tokio::test]
async fn test_catalog_failure_escapes() {
    let (walker, store, _) = walker(HarvestConfig::default());
    store.fail_on("c1");
    let mut task = HarvestTask::new("c1");

    let result = walker.ingest_catalog(&simple_catalog(), "c1", &mut task).await;

    assert!(result.is_err());
    assert!(task.logs.is_empty());
}

#[tokio::test]
async fn test_ingest_single_levels() {
    // Arrange
    let (walker, store, fetcher) = walker(indexable_config());
    fetcher.set("/data/a.csv", b"1");
    run(&walker, &json!({"identifier": "c1"}), "c1").await;
    let c1 = store.catalog("c1");
    let mut task = HarvestTask::new("c1");

    // Act
    let dataset = json!({"identifier": "d9", "distribution": [
        {"identifier": "dist9", "downloadURL": "/data/a.csv"}
    ]});
    let d9 = walker
        .ingest_dataset(dataset.as_object().unwrap(), &c1, &mut task)
        .await
        .unwrap();
    let field = json!({"id": "f9"});
    let dist9 = store.child(&d9.node, NodeKind::Distribution, "dist9");
    let f9 = walker
        .ingest_field(field.as_object().unwrap(), &dist9, &mut task)
        .await
        .unwrap();

    // Assert
    assert!(d9.created && d9.node.updated);
    assert!(dist9.indexable);
    assert!(f9.created);
    assert!(task.logs.is_empty());

    let misplaced = walker
        .ingest_field(field.as_object().unwrap(), &c1, &mut task)
        .await;
    assert!(misplaced.is_err());
}

#[tokio::test]
async fn test_task_logger_is_pluggable() {
    /// Collects only error messages.
    struct Messages(Vec<String>);

    impl TaskLogger for Messages {
        fn record(&mut self, entry: tellus_core::TaskLogEntry) {
            if entry.level == LogLevel::Error {
                self.0.push(entry.message);
            }
        }
    }

    let (walker, store, _) = walker(HarvestConfig::default());
    store.fail_on("d1");
    let mut messages = Messages(Vec::new());

    walker
        .ingest_catalog(&simple_catalog(), "c1", &mut messages)
        .await
        .unwrap();

    assert_eq!(messages.0.len(), 1);
    assert!(messages.0[0].contains("d1"));
}
