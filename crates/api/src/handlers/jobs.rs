//! Handlers for the `/jobs` resource.

use axum::extract::{Path, Query, State};
use axum::http::header::ACCEPT;
use axum::http::HeaderMap;
use axum::Json;
use procman_core::job_status::JobStatus;
use procman_core::types::{JobId, Timestamp, MIME_JSON};
use procman_db::models::job::Job;
use serde::{Deserialize, Serialize};

use crate::engine::{self, ExecutionCoordinator, ResultFormat};
use crate::error::{AppError, AppResult};
use crate::response::{DataResponse, ProcessResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Hyperlink attached to a job status document.
#[derive(Debug, Serialize)]
pub struct Link {
    pub href: String,
    pub rel: &'static str,
    #[serde(rename = "type")]
    pub media_type: &'static str,
    pub title: &'static str,
}

/// Status document for a single job.
#[derive(Debug, Serialize)]
pub struct JobStatusInfo {
    #[serde(rename = "jobID")]
    pub job_id: JobId,
    #[serde(rename = "processID")]
    pub process_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created: Timestamp,
    pub updated: Timestamp,
    pub links: Vec<Link>,
}

impl JobStatusInfo {
    pub fn from_job(job: Job, coordinator: &ExecutionCoordinator) -> Self {
        let href = coordinator.job_url(&job.job_id);
        let mut links = vec![Link {
            href: href.clone(),
            rel: "self",
            media_type: MIME_JSON,
            title: "Job status",
        }];
        if job.status == JobStatus::Successful {
            links.push(Link {
                href: format!("{href}/results"),
                rel: "http://www.opengis.net/def/rel/ogc/1.0/results",
                media_type: MIME_JSON,
                title: "Job results",
            });
        }

        Self {
            job_id: job.job_id,
            process_id: job.process_id,
            status: job.status,
            message: job.message,
            created: job.created_at,
            updated: job.updated_at,
            links,
        }
    }
}

/// Body of a successful `DELETE /jobs/{id}`.
#[derive(Debug, Serialize)]
pub struct DismissedJob {
    #[serde(rename = "jobID")]
    pub job_id: JobId,
    pub status: &'static str,
    pub message: &'static str,
}

/// `GET /jobs` listing: bare identifiers, or full status documents when
/// filtered by process.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JobListing {
    Ids(Vec<JobId>),
    Jobs(Vec<JobStatusInfo>),
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub process_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    pub f: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /jobs
///
/// All job identifiers, oldest first. `?process_id=` narrows to one
/// process and returns status documents, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<Json<DataResponse<JobListing>>> {
    let data = match params.process_id {
        Some(process_id) => {
            let jobs = state.store.list_by_process(&process_id).await?;
            JobListing::Jobs(
                jobs.into_iter()
                    .map(|job| JobStatusInfo::from_job(job, &state.coordinator))
                    .collect(),
            )
        }
        None => JobListing::Ids(state.store.list_all().await?),
    };

    Ok(Json(DataResponse { data }))
}

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobStatusInfo>> {
    let job = state
        .store
        .get(&job_id)
        .await?
        .ok_or(AppError::NoSuchJob(job_id))?;

    Ok(Json(JobStatusInfo::from_job(job, &state.coordinator)))
}

/// GET /jobs/{id}/results
///
/// `?f=json|html` selects the representation; otherwise an `Accept`
/// header containing `text/html` selects HTML.
pub async fn get_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<ResultQuery>,
    headers: HeaderMap,
) -> AppResult<ProcessResponse> {
    let accept = headers.get(ACCEPT).and_then(|value| value.to_str().ok());
    let format = ResultFormat::negotiate(params.f.as_deref(), accept);

    engine::get_job_result(
        state.store.as_ref(),
        state.renderer.as_ref(),
        &job_id,
        format,
    )
    .await
}

/// DELETE /jobs/{id}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DismissedJob>> {
    if !state.store.delete_job(&job_id).await? {
        return Err(AppError::NoSuchJob(job_id));
    }

    tracing::info!(job_id = %job_id, "Job dismissed");
    Ok(Json(DismissedJob {
        job_id,
        status: "dismissed",
        message: "Job dismissed",
    }))
}
