//! Central execution coordinator.
//!
//! Held in [`AppState`](crate::state::AppState) as an
//! `Arc<ExecutionCoordinator>`. Owns the [`TaskTracker`] that runs every
//! job, so a job outlives the request that started it and shutdown can
//! wait for it.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use procman_core::execution::{
    EffectiveMode, ExecuteRequest, ExecutionMode, ExecutionPlan, ResponseStyle,
};
use procman_core::process::{Inputs, Payload, Process, ProcessOutput};
use procman_core::registry::ProcessRegistry;
use procman_core::types::{is_json_mimetype, JobId, MIME_JSON};
use procman_db::models::job::{NewJob, StatusUpdate};
use procman_db::{JobStore, StoreError};
use serde_json::{json, Value};
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::error::{AppError, AppResult};
use crate::response::{encode_json, ProcessResponse};

/// Job message recorded when the process itself panics.
const PANIC_MESSAGE: &str = "process panicked";

/// Job message recorded when a successful output could not be stored.
const RESULT_NOT_STORED_MESSAGE: &str = "result could not be stored";

/// How a finished (or handed-off) execution ended.
#[derive(Debug)]
enum Outcome {
    Successful(ProcessOutput),
    Failed,
    Accepted,
}

/// Orchestrates process execution.
///
/// Manages the full lifecycle:
/// 1. Resolve the process and validate the request body.
/// 2. Negotiate the execution mode.
/// 3. Create the job record (`accepted`).
/// 4. Run the job on the tracker: sync requests await it, async ones
///    return immediately.
/// 5. Record the outcome (`successful` with result, or `failed`).
/// 6. Build the response.
pub struct ExecutionCoordinator {
    store: Arc<dyn JobStore>,
    registry: Arc<ProcessRegistry>,
    tracker: TaskTracker,
    base_url: String,
    pretty_print: bool,
}

impl ExecutionCoordinator {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<ProcessRegistry>,
        base_url: impl Into<String>,
        pretty_print: bool,
    ) -> Self {
        Self {
            store,
            registry,
            tracker: TaskTracker::new(),
            base_url: base_url.into(),
            pretty_print,
        }
    }

    /// Public URL of a job's status resource.
    pub fn job_url(&self, job_id: &str) -> String {
        format!("{}/jobs/{job_id}", self.base_url)
    }

    /// Execute `process_id` with the raw request `body`, honouring the
    /// client's `Prefer` header where the process allows.
    pub async fn execute_process(
        &self,
        process_id: &str,
        body: &[u8],
        prefer: Option<&str>,
    ) -> AppResult<ProcessResponse> {
        let descriptor = self.registry.resolve(process_id).map_err(|e| {
            tracing::debug!(process_id, "Execution requested for unknown process");
            AppError::from(e)
        })?;

        let ExecuteRequest { inputs, response: style } = parse_request(body)?;

        let plan = ExecutionPlan::negotiate(
            ExecutionMode::from_prefer_header(prefer),
            descriptor.job_control_options(),
        );

        let job_id = self
            .store
            .insert(NewJob::new(process_id))
            .await
            .map_err(execution_fault)?;
        tracing::info!(job_id = %job_id, process_id, mode = ?plan.mode, "Job accepted");

        let process = descriptor.process();
        let outcome = match plan.mode {
            EffectiveMode::Sync => {
                let span = tracing::info_span!("sync_job", job_id = %job_id, process_id);
                let task = self.tracker.spawn(
                    run_job(
                        Arc::clone(&self.store),
                        process,
                        process_id.to_string(),
                        job_id.clone(),
                        inputs,
                    )
                    .instrument(span),
                );
                task.await.map_err(|e| {
                    AppError::NoApplicableCode(format!("job task for {job_id} failed: {e}"))
                })??
            }
            EffectiveMode::Async => {
                let store = Arc::clone(&self.store);
                let span = tracing::info_span!("async_job", job_id = %job_id, process_id);
                let (pid, jid) = (process_id.to_string(), job_id.clone());
                self.tracker.spawn(
                    async move {
                        if let Err(e) = run_job(store, process, pid, jid, inputs).await {
                            tracing::error!(error = %e, "Asynchronous job failed to run");
                        }
                    }
                    .instrument(span),
                );
                Outcome::Accepted
            }
        };

        self.build_response(&job_id, outcome, style)?
            .with_location(&self.job_url(&job_id))
            .map(|response| response.with_preference_applied(plan.preference_applied))
    }

    fn build_response(
        &self,
        job_id: &JobId,
        outcome: Outcome,
        style: ResponseStyle,
    ) -> AppResult<ProcessResponse> {
        let (status, content_type, body) = match outcome {
            Outcome::Failed => {
                let doc = json!({
                    "code": "InvalidParameterValue",
                    "description": "Error updating job",
                });
                let body = encode_json(&doc, self.pretty_print)?;
                (StatusCode::OK, MIME_JSON.to_string(), body)
            }
            Outcome::Accepted => (
                StatusCode::CREATED,
                MIME_JSON.to_string(),
                encode_json(&json!({}), self.pretty_print)?,
            ),
            Outcome::Successful(output) => match style {
                ResponseStyle::Raw => {
                    let body = self.encode_payload(&output.mimetype, &output.payload)?;
                    (StatusCode::OK, output.mimetype, body)
                }
                ResponseStyle::Document => {
                    let doc = json!({ "outputs": [output.payload.to_json_value()] });
                    let body = encode_json(&doc, self.pretty_print)?;
                    (StatusCode::OK, MIME_JSON.to_string(), body)
                }
            },
        };

        tracing::debug!(
            job_id = %job_id,
            status = %status,
            content_type = %content_type,
            "Built execution response"
        );
        Ok(ProcessResponse::new(status, content_type, body))
    }

    /// JSON payloads are encoded under the JSON mimetype; everything else
    /// uses the stored encoding so the result endpoint returns the same bytes.
    fn encode_payload(&self, mimetype: &str, payload: &Payload) -> AppResult<Vec<u8>> {
        match payload {
            Payload::Json(value) if is_json_mimetype(mimetype) => {
                encode_json(value, self.pretty_print)
            }
            _ => payload.to_bytes().map_err(|e| {
                AppError::NoApplicableCode(format!("result encoding failed: {e}"))
            }),
        }
    }

    /// Close the tracker and wait up to `timeout` for in-flight jobs. Returns `false` if the wait timed out.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for in-flight jobs");
        }
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }

    /// Number of jobs still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

/// Validate and parse an execute request body.
fn parse_request(body: &[u8]) -> AppResult<ExecuteRequest> {
    if body.is_empty() {
        return Err(AppError::MissingParameterValue("missing request data".into()));
    }

    match std::str::from_utf8(body) {
        Ok(text) => tracing::debug!(body = %text, "Execute request body"),
        Err(_) => tracing::debug!(len = body.len(), "Execute request body is not UTF-8"),
    }

    let value: Value = serde_json::from_slice(body).map_err(|e| {
        tracing::error!(error = %e, "Execute request body is not valid JSON");
        AppError::InvalidParameterValue("invalid request data".into())
    })?;

    ExecuteRequest::from_value(value).map_err(|e| {
        tracing::error!(error = %e, "Execute request body is malformed");
        AppError::InvalidParameterValue("invalid request data".into())
    })
}

/// Drive one job from `accepted` to a terminal status.
///
/// A process error is a normal outcome (`failed`); faults of the store or a
/// panicking process are returned as errors.
async fn run_job(
    store: Arc<dyn JobStore>,
    process: Arc<dyn Process>,
    process_id: String,
    job_id: JobId,
    inputs: Inputs,
) -> AppResult<Outcome> {
    store
        .update_status(&job_id, StatusUpdate::running())
        .await
        .map_err(execution_fault)?;

    let joined = tokio::task::spawn_blocking(move || process.execute(&inputs)).await;

    match joined {
        Ok(Ok(output)) => {
            if let Err(e) = store
                .add_result(&process_id, &job_id, output.clone().into())
                .await
            {
                tracing::error!(job_id = %job_id, error = %e, "Could not store job result");
                mark_failed(store.as_ref(), &job_id, RESULT_NOT_STORED_MESSAGE).await;
                return Err(execution_fault(e));
            }
            tracing::info!(job_id = %job_id, "Job successful");
            Ok(Outcome::Successful(output))
        }
        Ok(Err(process_error)) => {
            tracing::warn!(job_id = %job_id, error = %process_error, "Process failed");
            store
                .update_status(&job_id, StatusUpdate::failed(process_error.to_string()))
                .await
                .map_err(execution_fault)?;
            Ok(Outcome::Failed)
        }
        Err(join_error) => {
            mark_failed(store.as_ref(), &job_id, PANIC_MESSAGE).await;
            Err(AppError::NoApplicableCode(format!(
                "process task for job {job_id} failed: {join_error}"
            )))
        }
    }
}

/// Best-effort move of a job to `failed` after a fault.
async fn mark_failed(store: &dyn JobStore, job_id: &str, message: &str) {
    if let Err(e) = store
        .update_status(job_id, StatusUpdate::failed(message))
        .await
    {
        tracing::warn!(job_id, error = %e, "Could not mark job failed");
    }
}

/// Store faults during execution surface as processing errors.
fn execution_fault(err: StoreError) -> AppError {
    AppError::NoApplicableCode(format!("job store: {err}"))
}
