//! SQLite-backed [`JobStore`].
//!
//! Status changes are single conditional `UPDATE`s (compare-and-set on the
//! current status) inside a transaction, so concurrent updaters of the same
//! job serialise and the loser gets `InvalidTransition` instead of
//! overwriting.

use async_trait::async_trait;
use chrono::Utc;
use procman_core::job_status::JobStatus;
use procman_core::types::{JobId, Timestamp};

use crate::models::job::{
    millis_to_timestamp, timestamp_to_millis, Job, JobResult, JobRow, NewJob, StatusUpdate,
};
use crate::store::{add_result_rejection, JobStore, RetentionPolicy, StoreError, StoreResult};
use crate::DbPool;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    job_id, process_id, status, message, result_mimetype, result_payload, \
    created_at, updated_at";

/// Terminal statuses as stored, for retention queries.
const TERMINAL_STATUSES: [JobStatus; 2] = [JobStatus::Successful, JobStatus::Failed];

pub struct SqliteJobStore {
    pool: DbPool,
}

impl SqliteJobStore {
    /// Connect to `database_url` and apply migrations.
    pub async fn open(database_url: &str) -> StoreResult<Self> {
        let pool = crate::create_pool(database_url)
            .await
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        crate::run_migrations(&pool)
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("migrations failed: {e}")))?;

        tracing::info!(database_url, "SQLite job store opened");
        Ok(Self { pool })
    }

    async fn fetch_status<'e, E>(executor: E, job_id: &str) -> StoreResult<Option<JobStatus>>
    where
        E: sqlx::SqliteExecutor<'e>,
    {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM jobs WHERE job_id = ?")
                .bind(job_id)
                .fetch_optional(executor)
                .await?;

        status
            .map(|s| {
                s.parse().map_err(|e| StoreError::Corrupt {
                    job_id: job_id.to_string(),
                    reason: format!("{e}"),
                })
            })
            .transpose()
    }

    async fn fetch_job<'e, E>(executor: E, job_id: &str) -> StoreResult<Option<Job>>
    where
        E: sqlx::SqliteExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE job_id = ?");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .fetch_optional(executor)
            .await?;
        row.map(Job::try_from).transpose()
    }
}

/// Statuses from which `to` may be reached.
fn predecessors(to: JobStatus) -> Vec<&'static str> {
    JobStatus::ALL
        .into_iter()
        .filter(|from| from.can_transition(to))
        .map(JobStatus::as_str)
        .collect()
}

fn encode_result(result: Option<&JobResult>) -> StoreResult<(Option<String>, Option<Vec<u8>>)> {
    match result {
        Some(result) => Ok((
            Some(result.mimetype.clone()),
            Some(result.payload.to_bytes()?),
        )),
        None => Ok((None, None)),
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: NewJob) -> StoreResult<JobId> {
        let now = timestamp_to_millis(Utc::now());
        let outcome = sqlx::query(
            "INSERT INTO jobs (job_id, process_id, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&job.job_id)
        .bind(&job.process_id)
        .bind(JobStatus::Accepted.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match outcome {
            Ok(_) => Ok(job.job_id),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateJob(job.job_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_by_process(&self, process_id: &str) -> StoreResult<Vec<Job>> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE process_id = ? \
             ORDER BY created_at DESC, job_id DESC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(process_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn list_all(&self) -> StoreResult<Vec<JobId>> {
        let ids = sqlx::query_scalar("SELECT job_id FROM jobs ORDER BY created_at, job_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn get(&self, job_id: &str) -> StoreResult<Option<Job>> {
        Self::fetch_job(&self.pool, job_id).await
    }

    async fn get_by_process_and_job(
        &self,
        process_id: &str,
        job_id: &str,
    ) -> StoreResult<Option<Job>> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE process_id = ? AND job_id = ?");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(process_id)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    async fn update_status(&self, job_id: &str, update: StatusUpdate) -> StoreResult<Job> {
        update.validate(job_id)?;

        let allowed = predecessors(update.status);
        if allowed.is_empty() {
            let from = self
                .get(job_id)
                .await?
                .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?
                .status;
            return Err(StoreError::InvalidTransition {
                job_id: job_id.to_string(),
                from,
                to: update.status,
            });
        }

        let (mimetype, payload) = encode_result(update.result.as_ref())?;
        let placeholders = vec!["?"; allowed.len()].join(", ");
        let query = format!(
            "UPDATE jobs \
             SET status = ?, message = ?, result_mimetype = ?, result_payload = ?, updated_at = ? \
             WHERE job_id = ? AND status IN ({placeholders})"
        );

        let mut tx = self.pool.begin().await?;

        let mut q = sqlx::query(&query)
            .bind(update.status.as_str())
            .bind(update.message.as_deref())
            .bind(mimetype)
            .bind(payload)
            .bind(timestamp_to_millis(Utc::now()))
            .bind(job_id);
        for status in &allowed {
            q = q.bind(*status);
        }
        let affected = q.execute(&mut *tx).await?.rows_affected();

        if affected == 0 {
            let current = Self::fetch_status(&mut *tx, job_id).await?;
            tx.rollback().await?;
            return Err(match current {
                None => StoreError::JobNotFound(job_id.to_string()),
                Some(from) => StoreError::InvalidTransition {
                    job_id: job_id.to_string(),
                    from,
                    to: update.status,
                },
            });
        }

        let job = Self::fetch_job(&mut *tx, job_id)
            .await?
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        tx.commit().await?;

        tracing::debug!(job_id, status = %job.status, "Job status updated");
        Ok(job)
    }

    async fn add_result(
        &self,
        process_id: &str,
        job_id: &str,
        result: JobResult,
    ) -> StoreResult<Job> {
        let (mimetype, payload) = encode_result(Some(&result))?;

        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            "UPDATE jobs \
             SET status = ?, result_mimetype = ?, result_payload = ?, updated_at = ? \
             WHERE process_id = ? AND job_id = ? AND status = ?",
        )
        .bind(JobStatus::Successful.as_str())
        .bind(mimetype)
        .bind(payload)
        .bind(timestamp_to_millis(Utc::now()))
        .bind(process_id)
        .bind(job_id)
        .bind(JobStatus::Running.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            let current: Option<String> = sqlx::query_scalar(
                "SELECT status FROM jobs WHERE process_id = ? AND job_id = ?",
            )
            .bind(process_id)
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.rollback().await?;

            let Some(current) = current else {
                return Err(StoreError::JobNotFound(job_id.to_string()));
            };
            let current: JobStatus = current.parse().map_err(|e| StoreError::Corrupt {
                job_id: job_id.to_string(),
                reason: format!("{e}"),
            })?;
            return Err(add_result_rejection(job_id, current));
        }

        let job = Self::fetch_job(&mut *tx, job_id)
            .await?
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        tx.commit().await?;
        Ok(job)
    }

    async fn get_result(&self, job_id: &str) -> StoreResult<Option<JobResult>> {
        Ok(self.get(job_id).await?.and_then(|job| job.result))
    }

    async fn delete_job(&self, job_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_jobs(&self, policy: &RetentionPolicy) -> StoreResult<u64> {
        if policy.is_unbounded() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT job_id, updated_at FROM jobs WHERE status IN (?, ?)")
                .bind(TERMINAL_STATUSES[0].as_str())
                .bind(TERMINAL_STATUSES[1].as_str())
                .fetch_all(&mut *tx)
                .await?;

        let candidates: Vec<(JobId, Timestamp)> = rows
            .into_iter()
            .filter_map(|(id, millis)| millis_to_timestamp(millis).map(|ts| (id, ts)))
            .collect();

        let mut deleted = 0;
        for job_id in policy.select_expired(&candidates, Utc::now()) {
            deleted += sqlx::query("DELETE FROM jobs WHERE job_id = ?")
                .bind(&job_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(deleted)
    }

    async fn health_check(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            tracing::info!("SQLite job store closed");
        }
    }
}
