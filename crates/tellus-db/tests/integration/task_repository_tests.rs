//! Integration tests for TaskRepository.

use tellus_core::traits::TaskStore;
use tellus_core::{EntityRef, HarvestStats, NodeKind, NodeOutcome, TaskLogger, TaskStatus};
use tellus_db::TaskRepository;

use crate::integration::common::setup_test_db;

#[tokio::test]
async fn test_create_task_starts_running() {
    let (pool, _container) = setup_test_db().await;
    let repo = TaskRepository::new(pool);

    let task = repo.create_task("sspm").await.expect("create should succeed");

    let stored = repo.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Running);
    assert_eq!(stored.catalog_id, "sspm");
    assert!(stored.finished_at.is_none());
    assert!(stored.logs.is_empty());
    assert_eq!(repo.count_running().await.unwrap(), 1);
}

#[tokio::test]
async fn test_save_task_round_trips_logs_and_stats() {
    let (pool, _container) = setup_test_db().await;
    let repo = TaskRepository::new(pool);
    let mut task = repo.create_task("c1").await.unwrap();

    task.error(
        EntityRef {
            kind: NodeKind::Distribution,
            identifier: Some("dist1".to_string()),
        },
        "HTTP 404 from https://example.org/a.csv",
    );
    let mut stats = HarvestStats::new();
    stats.record(NodeKind::Catalog, NodeOutcome::Updated);
    stats.record(NodeKind::Distribution, NodeOutcome::Failed);
    task.finish(stats.clone());

    repo.save_task(&task).await.expect("save should succeed");

    let stored = repo.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Finished);
    assert_eq!(stored.stats, stats);
    assert_eq!(stored.errors().count(), 1);
    assert_eq!(stored.entries_for("dist1").count(), 1);
    assert_eq!(repo.count_running().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_task_keeps_message() {
    let (pool, _container) = setup_test_db().await;
    let repo = TaskRepository::new(pool);
    let mut task = repo.create_task("c1").await.unwrap();

    task.fail("HTTP 500 from https://example.org/data.json");
    repo.save_task(&task).await.unwrap();

    let stored = repo.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(stored.finished_at.is_some());
    assert!(stored.logs[0].message.contains("HTTP 500"));
}

#[tokio::test]
async fn test_list_tasks_newest_first() {
    let (pool, _container) = setup_test_db().await;
    let repo = TaskRepository::new(pool);

    let first = repo.create_task("a").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = repo.create_task("b").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let third = repo.create_task("c").await.unwrap();

    let recent = repo.list_tasks(2).await.unwrap();

    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, third.id);
    assert_eq!(recent[1].id, second.id);
    assert!(recent.iter().all(|t| t.id != first.id));
}
