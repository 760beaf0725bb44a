//! Storage trait abstraction for job records.

use std::time::Duration;

use async_trait::async_trait;
use procman_core::job_status::JobStatus;
use procman_core::types::{JobId, Timestamp};

use crate::models::job::{Job, JobResult, NewJob, StatusUpdate};

/// Error type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing medium cannot be reached (or the store was closed).
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// A job with this identifier already exists. Never merged.
    #[error("Duplicate job identifier: {0}")]
    DuplicateJob(JobId),

    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Invalid state for job {job_id}: {reason}")]
    InvalidState { job_id: JobId, reason: String },

    /// A persisted record violates the job invariants.
    #[error("Corrupt job record {job_id}: {reason}")]
    Corrupt { job_id: JobId, reason: String },

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Self::StorageUnavailable(err.to_string())
            }
            other => Self::Database(other),
        }
    }
}

/// Retention thresholds for [`JobStore::delete_jobs`].
///
/// Only terminal jobs are ever eligible. Jobs older than `max_age` (by last
/// update) go first; then the oldest remaining terminal jobs are removed
/// until at most `max_count` are left. No thresholds means nothing is
/// deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    pub max_age: Option<Duration>,
    pub max_count: Option<usize>,
}

impl RetentionPolicy {
    pub fn is_unbounded(&self) -> bool {
        self.max_age.is_none() && self.max_count.is_none()
    }

    /// Pick the jobs to delete from `(job_id, updated_at)` pairs of terminal
    /// jobs.
    pub fn select_expired(
        &self,
        candidates: &[(JobId, Timestamp)],
        now: Timestamp,
    ) -> Vec<JobId> {
        let mut ordered: Vec<&(JobId, Timestamp)> = candidates.iter().collect();
        ordered.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let cutoff = self
            .max_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .and_then(|age| now.checked_sub_signed(age));

        let (mut expired, kept): (Vec<_>, Vec<_>) = ordered
            .into_iter()
            .partition(|(_, updated_at)| cutoff.is_some_and(|cutoff| *updated_at < cutoff));

        if let Some(max_count) = self.max_count {
            let overflow = kept.len().saturating_sub(max_count);
            expired.extend(kept.into_iter().take(overflow));
        }

        expired.into_iter().map(|(id, _)| id.clone()).collect()
    }
}

/// Storage abstraction for job records.
///
/// Every mutating operation is a single atomic step: a reader never sees a
/// job half-updated (for example `successful` without its result).
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `accepted` job. Fails with [`StoreError::DuplicateJob`]
    /// if the identifier is taken.
    async fn insert(&self, job: NewJob) -> StoreResult<JobId>;

    /// All jobs of a process, newest first.
    async fn list_by_process(&self, process_id: &str) -> StoreResult<Vec<Job>>;

    /// Identifiers of every stored job, oldest first.
    async fn list_all(&self) -> StoreResult<Vec<JobId>>;

    async fn get(&self, job_id: &str) -> StoreResult<Option<Job>>;

    async fn get_by_process_and_job(
        &self,
        process_id: &str,
        job_id: &str,
    ) -> StoreResult<Option<Job>>;

    /// Transition a job, attaching the result or message the target status
    /// requires. Illegal transitions (including losing a race against a
    /// concurrent updater) fail with [`StoreError::InvalidTransition`].
    async fn update_status(&self, job_id: &str, update: StatusUpdate) -> StoreResult<Job>;

    /// Attach `result` to a running job and mark it `successful` in the same
    /// step.
    async fn add_result(
        &self,
        process_id: &str,
        job_id: &str,
        result: JobResult,
    ) -> StoreResult<Job>;

    async fn get_result(&self, job_id: &str) -> StoreResult<Option<JobResult>>;

    /// Remove one job. Returns `false` if it did not exist.
    async fn delete_job(&self, job_id: &str) -> StoreResult<bool>;

    /// Retention hook. Returns the number of jobs removed.
    async fn delete_jobs(&self, policy: &RetentionPolicy) -> StoreResult<u64>;

    async fn health_check(&self) -> StoreResult<()>;

    /// Release storage resources. Idempotent; later calls fail with
    /// [`StoreError::StorageUnavailable`].
    async fn close(&self);
}

/// Shared error for [`JobStore::add_result`] when the job is not `running`.
pub(crate) fn add_result_rejection(job_id: &str, current: JobStatus) -> StoreError {
    if current.is_terminal() {
        StoreError::InvalidState {
            job_id: job_id.to_string(),
            reason: format!("job is already {current}"),
        }
    } else {
        StoreError::InvalidTransition {
            job_id: job_id.to_string(),
            from: current,
            to: JobStatus::Successful,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn at(hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    fn candidates() -> Vec<(JobId, Timestamp)> {
        vec![
            ("c".to_string(), at(3)),
            ("a".to_string(), at(1)),
            ("b".to_string(), at(2)),
            ("d".to_string(), at(4)),
        ]
    }

    #[test]
    fn unbounded_policy_deletes_nothing() {
        let policy = RetentionPolicy::default();
        assert!(policy.is_unbounded());
        assert!(policy.select_expired(&candidates(), at(10)).is_empty());
    }

    #[test]
    fn max_age_deletes_older_jobs() {
        let policy = RetentionPolicy {
            max_age: Some(Duration::from_secs(2 * 3600 + 1)),
            max_count: None,
        };
        // cutoff is 02:59:59, so "a" (01:00) and "b" (02:00) expire.
        let expired = policy.select_expired(&candidates(), at(5));
        assert_eq!(expired, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn max_count_keeps_newest() {
        let policy = RetentionPolicy {
            max_age: None,
            max_count: Some(1),
        };
        let expired = policy.select_expired(&candidates(), at(5));
        assert_eq!(expired, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn age_and_count_combine() {
        let policy = RetentionPolicy {
            max_age: Some(Duration::from_secs(3 * 3600 + 1)),
            max_count: Some(2),
        };
        // age removes "a" (01:00 < 01:59:59); count trims "b" from b, c, d.
        let expired = policy.select_expired(&candidates(), at(5));
        assert_eq!(expired, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn ties_break_on_job_id() {
        let policy = RetentionPolicy {
            max_age: None,
            max_count: Some(1),
        };
        let tied = vec![("y".to_string(), at(1)), ("x".to_string(), at(1))];
        assert_eq!(policy.select_expired(&tied, at(2)), vec!["x".to_string()]);
    }

    #[test]
    fn add_result_rejection_distinguishes_terminal_jobs() {
        assert!(matches!(
            add_result_rejection("j", JobStatus::Failed),
            StoreError::InvalidState { .. }
        ));
        assert!(matches!(
            add_result_rejection("j", JobStatus::Accepted),
            StoreError::InvalidTransition { .. }
        ));
    }
}
