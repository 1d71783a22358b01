//! Integration tests for ScheduleRepository.

use chrono::Utc;
use tellus_core::traits::ScheduleStore;
use tellus_core::{IntervalUnit, Registration, ScheduleRequest, register_repeatable_job};
use tellus_db::ScheduleRepository;

use crate::integration::common::setup_test_db;

#[tokio::test]
async fn test_register_and_find_job() {
    let (pool, _container) = setup_test_db().await;
    let repo = ScheduleRepository::new(pool);

    let registration = register_repeatable_job(&repo, &ScheduleRequest::new("harvest"), Utc::now())
        .await
        .expect("registration should succeed");

    let Registration::Created(job) = registration else {
        panic!("expected a new job");
    };
    let found = repo
        .find_jobs("tellus::harvest_all", 24, IntervalUnit::Hours)
        .await
        .unwrap();
    assert_eq!(found, vec![job]);
    assert!(
        repo.find_jobs("tellus::harvest_all", 1, IntervalUnit::Days)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_duplicate_registration_is_refused() {
    let (pool, _container) = setup_test_db().await;
    let repo = ScheduleRepository::new(pool);
    let request = ScheduleRequest::new("harvest").with_interval(30, IntervalUnit::Minutes);

    register_repeatable_job(&repo, &request, Utc::now()).await.unwrap();
    let again = register_repeatable_job(&repo, &request, Utc::now()).await.unwrap();

    assert!(matches!(again, Registration::AlreadyScheduled(ref jobs) if jobs.len() == 1));
    assert_eq!(repo.list_jobs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_upsert_by_name_overwrites() {
    let (pool, _container) = setup_test_db().await;
    let repo = ScheduleRepository::new(pool);

    let Registration::Created(original) =
        register_repeatable_job(&repo, &ScheduleRequest::new("harvest"), Utc::now())
            .await
            .unwrap()
    else {
        panic!("expected a new job");
    };

    let mut changed = original.clone();
    changed.queue = "default".to_string();
    changed.repeat = Some(3);
    let stored = repo.upsert_job_by_name(&changed).await.unwrap();

    assert_eq!(stored.id, original.id);
    assert_eq!(stored.queue, "default");
    assert_eq!(stored.repeat, Some(3));
    assert_eq!(repo.list_jobs().await.unwrap().len(), 1);
}
