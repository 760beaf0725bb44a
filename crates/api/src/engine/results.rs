//! Job result retrieval.

use axum::http::StatusCode;
use procman_core::job_status::JobStatus;
use procman_core::process::Payload;
use procman_core::types::{is_json_mimetype, MIME_HTML, MIME_JSON};
use procman_db::JobStore;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::render::ResultRenderer;
use crate::response::{encode_json, ProcessResponse};

/// Representation requested for a JSON result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultFormat {
    #[default]
    Json,
    Html,
}

impl ResultFormat {
    /// Resolve from the `f` query parameter, then the `Accept` header.
    pub fn negotiate(f: Option<&str>, accept: Option<&str>) -> Self {
        match f.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("html") => return Self::Html,
            Some(f) if f.eq_ignore_ascii_case("json") => return Self::Json,
            _ => {}
        }

        match accept {
            Some(accept) if accept.to_ascii_lowercase().contains("text/html") => Self::Html,
            _ => Self::Json,
        }
    }
}

/// Fetch the result of `job_id`.
///
/// Only `successful` jobs have a result; every other status maps to the
/// matching error. Output for a given job is byte-identical across calls.
pub async fn get_job_result(
    store: &dyn JobStore,
    renderer: &dyn ResultRenderer,
    job_id: &str,
    format: ResultFormat,
) -> AppResult<ProcessResponse> {
    let job = store
        .get(job_id)
        .await?
        .ok_or_else(|| AppError::NoSuchJob(job_id.to_string()))?;

    match job.status {
        JobStatus::Running => return Err(AppError::ResultNotReady("job still running".into())),
        JobStatus::Accepted => {
            return Err(AppError::ResultNotReady(
                "job accepted but not yet running".into(),
            ))
        }
        JobStatus::Failed => return Err(AppError::InvalidParameterValue("job failed".into())),
        JobStatus::Successful => {}
    }

    let Some(result) = job.result else {
        return Err(AppError::JobResultNotFound(job_id.to_string()));
    };

    if !is_json_mimetype(&result.mimetype) {
        let body = result.payload.to_bytes().map_err(|e| {
            AppError::NoApplicableCode(format!("result encoding failed: {e}"))
        })?;
        return Ok(ProcessResponse::new(StatusCode::OK, result.mimetype, body));
    }

    let value = match result.payload {
        Payload::Json(value) => value,
        Payload::Bytes(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Stored JSON result does not parse");
                return Ok(ProcessResponse::new(StatusCode::OK, result.mimetype, bytes));
            }
        },
    };
    let value = sort_keys(value);

    match format {
        ResultFormat::Json => {
            let body = encode_json(&value, true)?;
            Ok(ProcessResponse::new(StatusCode::OK, MIME_JSON, body))
        }
        ResultFormat::Html => {
            let html = renderer.render_job_result(job_id, &value);
            Ok(ProcessResponse::new(StatusCode::OK, MIME_HTML, html.into_bytes()))
        }
    }
}

/// Rebuild every object with its keys in ascending order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
