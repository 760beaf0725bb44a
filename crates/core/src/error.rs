use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Duplicate process identifier: {0}")]
    DuplicateProcess(String),

    #[error("Unknown job status: {0}")]
    UnknownStatus(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Wire-level error codes returned in the `code` field of every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    NoSuchProcess,
    MissingParameterValue,
    InvalidParameterValue,
    NoApplicableCode,
    NoSuchJob,
    ResultNotReady,
    JobResultNotFound,
    StorageUnavailable,
    InvalidTransition,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoSuchProcess => "NoSuchProcess",
            Self::MissingParameterValue => "MissingParameterValue",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::NoApplicableCode => "NoApplicableCode",
            Self::NoSuchJob => "NoSuchJob",
            Self::ResultNotReady => "ResultNotReady",
            Self::JobResultNotFound => "JobResultNotFound",
            Self::StorageUnavailable => "StorageUnavailable",
            Self::InvalidTransition => "InvalidTransition",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
