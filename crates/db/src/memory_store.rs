//! Process-local [`JobStore`] backed by a `HashMap`.
//!
//! Every operation takes the map lock once, so status changes are atomic
//! with respect to other callers. Contents are lost when the store is
//! dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use procman_core::job_status::JobStatus;
use procman_core::types::{JobId, Timestamp};
use tokio::sync::RwLock;

use crate::models::job::{Job, JobResult, NewJob, StatusUpdate};
use crate::store::{add_result_rejection, JobStore, RetentionPolicy, StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    closed: AtomicBool,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::StorageUnavailable("job store is closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: NewJob) -> StoreResult<JobId> {
        self.ensure_open()?;
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            return Err(StoreError::DuplicateJob(job.job_id));
        }

        let job = job.into_job(Utc::now());
        let job_id = job.job_id.clone();
        jobs.insert(job_id.clone(), job);
        Ok(job_id)
    }

    async fn list_by_process(&self, process_id: &str) -> StoreResult<Vec<Job>> {
        self.ensure_open()?;
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|job| job.process_id == process_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.job_id.cmp(&a.job_id))
        });
        Ok(matching)
    }

    async fn list_all(&self) -> StoreResult<Vec<JobId>> {
        self.ensure_open()?;
        let jobs = self.jobs.read().await;
        let mut all: Vec<&Job> = jobs.values().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        Ok(all.into_iter().map(|job| job.job_id.clone()).collect())
    }

    async fn get(&self, job_id: &str) -> StoreResult<Option<Job>> {
        self.ensure_open()?;
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn get_by_process_and_job(
        &self,
        process_id: &str,
        job_id: &str,
    ) -> StoreResult<Option<Job>> {
        Ok(self
            .get(job_id)
            .await?
            .filter(|job| job.process_id == process_id))
    }

    async fn update_status(&self, job_id: &str, update: StatusUpdate) -> StoreResult<Job> {
        self.ensure_open()?;
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;

        job.apply(update, Utc::now())?;
        tracing::debug!(job_id, status = %job.status, "Job status updated");
        Ok(job.clone())
    }

    async fn add_result(
        &self,
        process_id: &str,
        job_id: &str,
        result: JobResult,
    ) -> StoreResult<Job> {
        self.ensure_open()?;
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .filter(|job| job.process_id == process_id)
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;

        if job.status != JobStatus::Running {
            return Err(add_result_rejection(job_id, job.status));
        }

        job.apply(StatusUpdate::successful(result), Utc::now())?;
        Ok(job.clone())
    }

    async fn get_result(&self, job_id: &str) -> StoreResult<Option<JobResult>> {
        Ok(self.get(job_id).await?.and_then(|job| job.result))
    }

    async fn delete_job(&self, job_id: &str) -> StoreResult<bool> {
        self.ensure_open()?;
        Ok(self.jobs.write().await.remove(job_id).is_some())
    }

    async fn delete_jobs(&self, policy: &RetentionPolicy) -> StoreResult<u64> {
        self.ensure_open()?;
        if policy.is_unbounded() {
            return Ok(0);
        }

        let mut jobs = self.jobs.write().await;
        let candidates: Vec<(JobId, Timestamp)> = jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .map(|job| (job.job_id.clone(), job.updated_at))
            .collect();

        let mut deleted = 0;
        for job_id in policy.select_expired(&candidates, Utc::now()) {
            if jobs.remove(&job_id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.ensure_open()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
