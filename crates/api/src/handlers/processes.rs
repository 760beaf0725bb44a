//! Handlers for the `/processes` resource.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use procman_core::process::ProcessMetadata;

use crate::error::{AppError, AppResult};
use crate::handlers::jobs::JobStatusInfo;
use crate::response::{DataResponse, ProcessResponse};
use crate::state::AppState;

/// GET /processes
///
/// Summaries of every registered process, ordered by identifier.
pub async fn list_processes(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<ProcessMetadata>>> {
    let data = state.registry.list().map(|d| d.metadata().clone()).collect();
    Json(DataResponse { data })
}

/// GET /processes/{id}
pub async fn get_process(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
) -> AppResult<Json<DataResponse<ProcessMetadata>>> {
    let descriptor = state.registry.resolve(&process_id)?;
    Ok(Json(DataResponse {
        data: descriptor.metadata().clone(),
    }))
}

/// POST /processes/{id}/execution
///
/// Runs the process. The body is taken raw so that empty and non-JSON
/// bodies get the execution error codes rather than a generic rejection.
/// `Prefer: respond-async` requests asynchronous execution (201).
pub async fn execute_process(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<ProcessResponse> {
    let prefer = headers
        .get("prefer")
        .and_then(|value| value.to_str().ok());

    state
        .coordinator
        .execute_process(&process_id, &body, prefer)
        .await
}

/// GET /processes/{process_id}/jobs/{job_id}
pub async fn get_process_job(
    State(state): State<AppState>,
    Path((process_id, job_id)): Path<(String, String)>,
) -> AppResult<Json<JobStatusInfo>> {
    let job = state
        .store
        .get_by_process_and_job(&process_id, &job_id)
        .await?
        .ok_or(AppError::NoSuchJob(job_id))?;

    Ok(Json(JobStatusInfo::from_job(job, &state.coordinator)))
}
