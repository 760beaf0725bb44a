//! Integration tests for the job stores.
//!
//! Every scenario runs against both backends:
//! - SQLite (in-memory and file-backed)
//! - the process-local memory store

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use procman_core::job_status::JobStatus;
use procman_core::process::{Payload, ProcessOutput};
use procman_db::models::job::{JobResult, NewJob, StatusUpdate};
use procman_db::{JobStore, MemoryJobStore, RetentionPolicy, SqliteJobStore, StoreError};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn stores() -> Vec<(&'static str, Box<dyn JobStore>)> {
    let sqlite = SqliteJobStore::open("sqlite::memory:")
        .await
        .expect("in-memory sqlite should open");
    vec![
        ("sqlite", Box::new(sqlite) as Box<dyn JobStore>),
        ("memory", Box::new(MemoryJobStore::new())),
    ]
}

fn echo_result() -> JobResult {
    ProcessOutput::json(json!({"id": "echo", "value": "Hello Test!"})).into()
}

async fn running_job(store: &dyn JobStore, process_id: &str) -> String {
    let job_id = store.insert(NewJob::new(process_id)).await.unwrap();
    store
        .update_status(&job_id, StatusUpdate::running())
        .await
        .unwrap();
    job_id
}

async fn succeeded_job(store: &dyn JobStore, process_id: &str) -> String {
    let job_id = running_job(store, process_id).await;
    store
        .add_result(process_id, &job_id, echo_result())
        .await
        .unwrap();
    job_id
}

async fn failed_job(store: &dyn JobStore, process_id: &str) -> String {
    let job_id = store.insert(NewJob::new(process_id)).await.unwrap();
    store
        .update_status(&job_id, StatusUpdate::failed("boom"))
        .await
        .unwrap();
    job_id
}

// ---------------------------------------------------------------------------
// Insert and lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn insert_creates_accepted_job() {
    for (name, store) in stores().await {
        let job_id = store.insert(NewJob::new("hello-world")).await.unwrap();
        let job = store.get(&job_id).await.unwrap().unwrap();

        assert_eq!(job.status, JobStatus::Accepted, "{name}");
        assert_eq!(job.process_id, "hello-world", "{name}");
        assert!(job.result.is_none(), "{name}");
        assert!(job.message.is_none(), "{name}");
    }
}

#[tokio::test]
async fn duplicate_job_id_is_rejected() {
    for (name, store) in stores().await {
        let job = NewJob::new("hello-world");
        store.insert(job.clone()).await.unwrap();

        assert_matches!(
            store.insert(job.clone()).await,
            Err(StoreError::DuplicateJob(id)) if id == job.job_id,
            "{name}"
        );
        assert_eq!(store.list_all().await.unwrap().len(), 1, "{name}");
    }
}

#[tokio::test]
async fn get_unknown_job_is_none() {
    for (name, store) in stores().await {
        assert!(store.get("missing").await.unwrap().is_none(), "{name}");
        assert!(store.get_result("missing").await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn lookup_by_process_and_job() {
    for (name, store) in stores().await {
        let job_id = store.insert(NewJob::new("a")).await.unwrap();

        assert!(
            store.get_by_process_and_job("a", &job_id).await.unwrap().is_some(),
            "{name}"
        );
        assert!(
            store.get_by_process_and_job("b", &job_id).await.unwrap().is_none(),
            "{name}"
        );
    }
}

#[tokio::test]
async fn listing_filters_by_process() {
    for (name, store) in stores().await {
        let a1 = store.insert(NewJob::new("a")).await.unwrap();
        let a2 = store.insert(NewJob::new("a")).await.unwrap();
        let b1 = store.insert(NewJob::new("b")).await.unwrap();

        let a_jobs: Vec<String> = store
            .list_by_process("a")
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.job_id)
            .collect();
        assert_eq!(a_jobs.len(), 2, "{name}");
        assert!(a_jobs.contains(&a1) && a_jobs.contains(&a2), "{name}");

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 3, "{name}");
        assert!(all.contains(&b1), "{name}");
        assert!(store.list_by_process("c").await.unwrap().is_empty(), "{name}");
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_job_carries_result() {
    for (name, store) in stores().await {
        let job_id = succeeded_job(store.as_ref(), "hello-world").await;

        let job = store.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Successful, "{name}");
        assert_eq!(job.result, Some(echo_result()), "{name}");
        assert_eq!(
            store.get_result(&job_id).await.unwrap(),
            Some(echo_result()),
            "{name}"
        );
    }
}

#[tokio::test]
async fn failed_job_carries_message() {
    for (name, store) in stores().await {
        let job_id = failed_job(store.as_ref(), "hello-world").await;

        let job = store.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed, "{name}");
        assert_eq!(job.message.as_deref(), Some("boom"), "{name}");
        assert!(job.result.is_none(), "{name}");
    }
}

#[tokio::test]
async fn terminal_jobs_cannot_move() {
    for (name, store) in stores().await {
        let job_id = succeeded_job(store.as_ref(), "p").await;

        assert_matches!(
            store.update_status(&job_id, StatusUpdate::running()).await,
            Err(StoreError::InvalidTransition {
                from: JobStatus::Successful,
                to: JobStatus::Running,
                ..
            }),
            "{name}"
        );
        assert_matches!(
            store.update_status(&job_id, StatusUpdate::failed("late")).await,
            Err(StoreError::InvalidTransition { .. }),
            "{name}"
        );
        let job = store.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Successful, "{name}");
    }
}

#[tokio::test]
async fn skipping_running_is_rejected() {
    for (name, store) in stores().await {
        let job_id = store.insert(NewJob::new("p")).await.unwrap();

        assert_matches!(
            store
                .update_status(&job_id, StatusUpdate::successful(echo_result()))
                .await,
            Err(StoreError::InvalidTransition {
                from: JobStatus::Accepted,
                to: JobStatus::Successful,
                ..
            }),
            "{name}"
        );
    }
}

#[tokio::test]
async fn update_unknown_job_is_not_found() {
    for (name, store) in stores().await {
        assert_matches!(
            store.update_status("missing", StatusUpdate::running()).await,
            Err(StoreError::JobNotFound(_)),
            "{name}"
        );
    }
}

#[tokio::test]
async fn malformed_update_is_invalid_state() {
    for (name, store) in stores().await {
        let job_id = store.insert(NewJob::new("p")).await.unwrap();
        let update = StatusUpdate {
            status: JobStatus::Failed,
            result: None,
            message: None,
        };

        assert_matches!(
            store.update_status(&job_id, update).await,
            Err(StoreError::InvalidState { .. }),
            "{name}"
        );
    }
}

#[tokio::test]
async fn add_result_requires_running_job() {
    for (name, store) in stores().await {
        let accepted = store.insert(NewJob::new("p")).await.unwrap();
        assert_matches!(
            store.add_result("p", &accepted, echo_result()).await,
            Err(StoreError::InvalidTransition { .. }),
            "{name}"
        );

        let failed = failed_job(store.as_ref(), "p").await;
        assert_matches!(
            store.add_result("p", &failed, echo_result()).await,
            Err(StoreError::InvalidState { .. }),
            "{name}"
        );

        let running = running_job(store.as_ref(), "p").await;
        assert_matches!(
            store.add_result("other", &running, echo_result()).await,
            Err(StoreError::JobNotFound(_)),
            "{name}"
        );
    }
}

#[tokio::test]
async fn opaque_results_survive_storage() {
    for (name, store) in stores().await {
        let job_id = running_job(store.as_ref(), "p").await;
        let result: JobResult = ProcessOutput::bytes("image/png", vec![0x89, 0x50, 0x4e]).into();
        store.add_result("p", &job_id, result).await.unwrap();

        let stored = store.get_result(&job_id).await.unwrap().unwrap();
        assert_eq!(stored.mimetype, "image/png", "{name}");
        assert_eq!(stored.payload, Payload::Bytes(vec![0x89, 0x50, 0x4e]), "{name}");
    }
}

#[tokio::test]
async fn concurrent_updates_have_one_winner() {
    for (name, store) in stores().await {
        let store: Arc<dyn JobStore> = Arc::from(store);
        let job_id = store.insert(NewJob::new("p")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let job_id = job_id.clone();
            handles.push(tokio::spawn(async move {
                store.update_status(&job_id, StatusUpdate::running()).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert_matches!(e, StoreError::InvalidTransition { .. }, "{name}"),
            }
        }
        assert_eq!(winners, 1, "{name}");
    }
}

// ---------------------------------------------------------------------------
// Deletion and retention
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_job_removes_record() {
    for (name, store) in stores().await {
        let job_id = store.insert(NewJob::new("p")).await.unwrap();

        assert!(store.delete_job(&job_id).await.unwrap(), "{name}");
        assert!(!store.delete_job(&job_id).await.unwrap(), "{name}");
        assert!(store.get(&job_id).await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn retention_only_touches_terminal_jobs() {
    for (name, store) in stores().await {
        let accepted = store.insert(NewJob::new("p")).await.unwrap();
        let running = running_job(store.as_ref(), "p").await;
        let done = succeeded_job(store.as_ref(), "p").await;
        let failed = failed_job(store.as_ref(), "p").await;

        let policy = RetentionPolicy {
            max_age: None,
            max_count: Some(0),
        };
        assert_eq!(store.delete_jobs(&policy).await.unwrap(), 2, "{name}");

        let remaining = store.list_all().await.unwrap();
        assert!(remaining.contains(&accepted), "{name}");
        assert!(remaining.contains(&running), "{name}");
        assert!(!remaining.contains(&done), "{name}");
        assert!(!remaining.contains(&failed), "{name}");
    }
}

#[tokio::test]
async fn retention_max_age_keeps_recent_jobs() {
    for (name, store) in stores().await {
        succeeded_job(store.as_ref(), "p").await;

        let policy = RetentionPolicy {
            max_age: Some(Duration::from_secs(3600)),
            max_count: None,
        };
        assert_eq!(store.delete_jobs(&policy).await.unwrap(), 0, "{name}");

        let unbounded = RetentionPolicy::default();
        assert_eq!(store.delete_jobs(&unbounded).await.unwrap(), 0, "{name}");
        assert_eq!(store.list_all().await.unwrap().len(), 1, "{name}");
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closed_store_is_unavailable() {
    for (name, store) in stores().await {
        store.health_check().await.unwrap();
        store.close().await;
        store.close().await;

        assert_matches!(
            store.health_check().await,
            Err(StoreError::StorageUnavailable(_)),
            "{name}"
        );
        assert_matches!(
            store.get("anything").await,
            Err(StoreError::StorageUnavailable(_)),
            "{name}"
        );
    }
}

#[tokio::test]
async fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("jobs.db").display());

    let store = SqliteJobStore::open(&url).await.unwrap();
    let job_id = succeeded_job(&store, "hello-world").await;
    store.close().await;

    let reopened = SqliteJobStore::open(&url).await.unwrap();
    let job = reopened.get(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Successful);
    assert_eq!(job.result, Some(echo_result()));
    reopened.close().await;
}
