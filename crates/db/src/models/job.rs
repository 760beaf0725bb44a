//! Job entity models and DTOs.

use procman_core::job_status::JobStatus;
use procman_core::process::{Payload, ProcessOutput};
use procman_core::types::{new_job_id, JobId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use crate::store::{StoreError, StoreResult};

/// A job record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub job_id: JobId,
    pub process_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Attached result; present iff `status` is `successful`.
    #[serde(skip)]
    pub result: Option<JobResult>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A mimetype-tagged job result.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub mimetype: String,
    pub payload: Payload,
}

impl From<ProcessOutput> for JobResult {
    fn from(output: ProcessOutput) -> Self {
        Self {
            mimetype: output.mimetype,
            payload: output.payload,
        }
    }
}

/// DTO for inserting a new job. Jobs always start `accepted`.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_id: JobId,
    pub process_id: String,
}

impl NewJob {
    /// A new job for `process_id` with a freshly generated identifier.
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            job_id: new_job_id(),
            process_id: process_id.into(),
        }
    }

    /// Materialise the `accepted` record created at `now`.
    pub fn into_job(self, now: Timestamp) -> Job {
        Job {
            job_id: self.job_id,
            process_id: self.process_id,
            status: JobStatus::Accepted,
            message: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A requested status transition with the data the target status requires.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub result: Option<JobResult>,
    pub message: Option<String>,
}

impl StatusUpdate {
    pub fn running() -> Self {
        Self {
            status: JobStatus::Running,
            result: None,
            message: None,
        }
    }

    pub fn successful(result: JobResult) -> Self {
        Self {
            status: JobStatus::Successful,
            result: Some(result),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            result: None,
            message: Some(message.into()),
        }
    }

    /// Check the update carries exactly what its target status requires:
    /// a result for `successful`, a message for `failed`, nothing otherwise.
    pub fn validate(&self, job_id: &str) -> StoreResult<()> {
        let reason = match self.status {
            JobStatus::Successful if self.result.is_none() => {
                Some("a successful job requires a result")
            }
            JobStatus::Failed if self.message.is_none() => Some("a failed job requires a message"),
            _ if self.status != JobStatus::Successful && self.result.is_some() => {
                Some("only successful jobs carry a result")
            }
            _ if self.status != JobStatus::Failed && self.message.is_some() => {
                Some("only failed jobs carry a message")
            }
            _ => None,
        };

        match reason {
            Some(reason) => Err(StoreError::InvalidState {
                job_id: job_id.to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl Job {
    /// Apply `update` in place, enforcing the transition rules.
    pub fn apply(&mut self, update: StatusUpdate, now: Timestamp) -> StoreResult<()> {
        update.validate(&self.job_id)?;
        if !self.status.can_transition(update.status) {
            return Err(StoreError::InvalidTransition {
                job_id: self.job_id.clone(),
                from: self.status,
                to: update.status,
            });
        }

        self.status = update.status;
        self.result = update.result;
        self.message = update.message;
        self.updated_at = now;
        Ok(())
    }
}

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub job_id: String,
    pub process_id: String,
    pub status: String,
    pub message: Option<String>,
    pub result_mimetype: Option<String>,
    pub result_payload: Option<Vec<u8>>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            job_id: row.job_id.clone(),
            reason,
        };

        let status: JobStatus = row.status.parse().map_err(|e| corrupt(format!("{e}")))?;
        let created_at = millis_to_timestamp(row.created_at)
            .ok_or_else(|| corrupt(format!("bad created_at {}", row.created_at)))?;
        let updated_at = millis_to_timestamp(row.updated_at)
            .ok_or_else(|| corrupt(format!("bad updated_at {}", row.updated_at)))?;

        let result = match (row.result_mimetype, row.result_payload) {
            (Some(mimetype), Some(bytes)) => {
                let payload = Payload::from_bytes(&mimetype, bytes)?;
                Some(JobResult { mimetype, payload })
            }
            _ => None,
        };

        Ok(Job {
            job_id: row.job_id,
            process_id: row.process_id,
            status,
            message: row.message,
            result,
            created_at,
            updated_at,
        })
    }
}

pub(crate) fn timestamp_to_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn millis_to_timestamp(millis: i64) -> Option<Timestamp> {
    chrono::DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn result() -> JobResult {
        ProcessOutput::json(json!({"id": "echo"})).into()
    }

    #[test]
    fn new_job_starts_accepted() {
        let job = NewJob::new("hello-world").into_job(Utc::now());
        assert_eq!(job.status, JobStatus::Accepted);
        assert!(job.result.is_none());
        assert!(job.message.is_none());
    }

    #[test]
    fn successful_update_requires_result() {
        let update = StatusUpdate {
            status: JobStatus::Successful,
            result: None,
            message: None,
        };
        assert_matches!(update.validate("j"), Err(StoreError::InvalidState { .. }));
    }

    #[test]
    fn failed_update_requires_message() {
        let update = StatusUpdate {
            status: JobStatus::Failed,
            result: None,
            message: None,
        };
        assert_matches!(update.validate("j"), Err(StoreError::InvalidState { .. }));
    }

    #[test]
    fn running_update_rejects_result() {
        let update = StatusUpdate {
            status: JobStatus::Running,
            result: Some(result()),
            message: None,
        };
        assert_matches!(update.validate("j"), Err(StoreError::InvalidState { .. }));
    }

    #[test]
    fn apply_walks_the_happy_path() {
        let mut job = NewJob::new("p").into_job(Utc::now());
        job.apply(StatusUpdate::running(), Utc::now()).unwrap();
        job.apply(StatusUpdate::successful(result()), Utc::now())
            .unwrap();
        assert_eq!(job.status, JobStatus::Successful);
        assert_eq!(job.result, Some(result()));
    }

    #[test]
    fn apply_rejects_leaving_terminal_state() {
        let mut job = NewJob::new("p").into_job(Utc::now());
        job.apply(StatusUpdate::failed("boom"), Utc::now()).unwrap();
        assert_matches!(
            job.apply(StatusUpdate::running(), Utc::now()),
            Err(StoreError::InvalidTransition {
                from: JobStatus::Failed,
                to: JobStatus::Running,
                ..
            })
        );
        assert_eq!(job.message.as_deref(), Some("boom"));
    }

    #[test]
    fn row_with_unknown_status_is_corrupt() {
        let row = JobRow {
            job_id: "j".into(),
            process_id: "p".into(),
            status: "paused".into(),
            message: None,
            result_mimetype: None,
            result_payload: None,
            created_at: 0,
            updated_at: 0,
        };
        assert_matches!(Job::try_from(row), Err(StoreError::Corrupt { .. }));
    }
}
