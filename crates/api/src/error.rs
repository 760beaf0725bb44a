use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use procman_core::error::{CoreError, ErrorCode};
use procman_db::StoreError;
use serde_json::json;

const INTERNAL_ERROR_DESCRIPTION: &str = "An internal error occurred";

/// Application-level error type for HTTP handlers.
///
/// Each variant carries the error kind explicitly and maps to exactly one
/// [`ErrorCode`]. Implements [`IntoResponse`] to produce the
/// `{"code", "description"}` error body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No such process: {0}")]
    NoSuchProcess(String),

    #[error("Missing parameter value: {0}")]
    MissingParameterValue(String),

    #[error("Invalid parameter value: {0}")]
    InvalidParameterValue(String),

    /// The execution machinery itself failed (not the process).
    #[error("Processing error: {0}")]
    NoApplicableCode(String),

    #[error("No such job: {0}")]
    NoSuchJob(String),

    #[error("Result not ready: {0}")]
    ResultNotReady(String),

    /// A successful job without a stored result.
    #[error("Job result not found: {0}")]
    JobResultNotFound(String),

    /// A storage fault.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProcessNotFound(_) => Self::NoSuchProcess("identifier not found".into()),
            CoreError::InvalidRequest(_) => {
                Self::InvalidParameterValue("invalid request data".into())
            }
            other => Self::NoApplicableCode(other.to_string()),
        }
    }
}

impl AppError {
    /// The error kind reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoSuchProcess(_) => ErrorCode::NoSuchProcess,
            Self::MissingParameterValue(_) => ErrorCode::MissingParameterValue,
            Self::InvalidParameterValue(_) => ErrorCode::InvalidParameterValue,
            Self::NoApplicableCode(_) => ErrorCode::NoApplicableCode,
            Self::NoSuchJob(_) => ErrorCode::NoSuchJob,
            Self::ResultNotReady(_) => ErrorCode::ResultNotReady,
            Self::JobResultNotFound(_) => ErrorCode::JobResultNotFound,
            Self::Store(StoreError::InvalidTransition { .. } | StoreError::InvalidState { .. }) => {
                ErrorCode::InvalidTransition
            }
            Self::Store(_) => ErrorCode::StorageUnavailable,
        }
    }

    /// Classify into an HTTP status and the client-facing description.
    ///
    /// Server-side faults are logged here and their descriptions sanitised.
    fn classify(&self) -> (StatusCode, String) {
        match self {
            Self::NoSuchProcess(msg) | Self::NoSuchJob(msg) | Self::ResultNotReady(msg) => {
                (StatusCode::NOT_FOUND, msg.clone())
            }
            Self::MissingParameterValue(msg) | Self::InvalidParameterValue(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Self::NoApplicableCode(detail) => {
                tracing::error!(error = %detail, "Processing error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Processing error".to_string(),
                )
            }
            Self::JobResultNotFound(job_id) => {
                tracing::error!(job_id = %job_id, "Successful job has no stored result");
                (StatusCode::INTERNAL_SERVER_ERROR, job_id.clone())
            }
            Self::Store(err) => {
                tracing::error!(error = %err, "Job store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_DESCRIPTION.to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, description) = self.classify();

        let body = json!({
            "code": self.code(),
            "description": description,
        });

        (status, axum::Json(body)).into_response()
    }
}
