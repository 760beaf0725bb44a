//! Execution-mode negotiation and execute-request parsing.
//!
//! The client expresses a preference through the `Prefer` header
//! (`respond-async` / `respond-sync`); each process advertises which job
//! control options it supports. [`ExecutionPlan::negotiate`] combines both.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::process::Inputs;

/// `Prefer` token requesting asynchronous execution.
pub const PREFER_RESPOND_ASYNC: &str = "respond-async";

/// `Prefer` token requesting synchronous execution.
pub const PREFER_RESPOND_SYNC: &str = "respond-sync";

/// Execution mode requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    Sync,
    Async,
    /// No (recognised) preference; the server decides.
    #[default]
    Auto,
}

impl ExecutionMode {
    /// Parse a `Prefer` header value.
    ///
    /// The header may carry several comma-separated preferences, possibly
    /// with parameters (`respond-async; wait=10`). The first recognised token
    /// wins. Anything else resolves to [`ExecutionMode::Auto`].
    pub fn from_prefer_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Auto;
        };

        for preference in value.split(',') {
            let token = preference.split(';').next().unwrap_or("").trim();
            if token.eq_ignore_ascii_case(PREFER_RESPOND_ASYNC) {
                return Self::Async;
            }
            if token.eq_ignore_ascii_case(PREFER_RESPOND_SYNC) {
                return Self::Sync;
            }
        }

        Self::Auto
    }
}

/// Job control option advertised by a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobControlOption {
    #[serde(rename = "sync-execute")]
    SyncExecute,
    #[serde(rename = "async-execute")]
    AsyncExecute,
}

/// The mode the coordinator actually runs a job in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveMode {
    Sync,
    Async,
}

/// Outcome of execution-mode negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub mode: EffectiveMode,
    /// Value for the `Preference-Applied` response header, set only when the
    /// client's explicit preference was honoured.
    pub preference_applied: Option<&'static str>,
}

impl ExecutionPlan {
    /// Decide how to run a job given the client preference and the process's
    /// supported job control options.
    ///
    /// A process that advertises no options is treated as synchronous-only.
    pub fn negotiate(requested: ExecutionMode, supported: &[JobControlOption]) -> Self {
        let supports_sync =
            supported.is_empty() || supported.contains(&JobControlOption::SyncExecute);
        let supports_async = supported.contains(&JobControlOption::AsyncExecute);

        match requested {
            ExecutionMode::Async if supports_async => Self {
                mode: EffectiveMode::Async,
                preference_applied: Some(PREFER_RESPOND_ASYNC),
            },
            ExecutionMode::Sync if supports_sync => Self {
                mode: EffectiveMode::Sync,
                preference_applied: Some(PREFER_RESPOND_SYNC),
            },
            _ => Self {
                mode: if supports_sync {
                    EffectiveMode::Sync
                } else {
                    EffectiveMode::Async
                },
                preference_applied: None,
            },
        }
    }
}

/// Response style requested in the execute body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseStyle {
    /// Body is the process output verbatim.
    #[default]
    Raw,
    /// Body is `{"outputs": [...]}`.
    Document,
}

impl ResponseStyle {
    /// Only the literal `"raw"` (or an absent field) selects raw output; any
    /// other value selects the document envelope.
    fn from_field(value: Option<&Value>) -> Self {
        match value {
            None => Self::Raw,
            Some(Value::String(s)) if s == "raw" => Self::Raw,
            Some(_) => Self::Document,
        }
    }
}

/// A parsed execute request body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecuteRequest {
    pub inputs: Inputs,
    pub response: ResponseStyle,
}

impl ExecuteRequest {
    /// Build a request from an already-parsed JSON document.
    ///
    /// The document must be an object; `inputs`, when present, must be an
    /// object too.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let Value::Object(mut body) = value else {
            return Err(CoreError::InvalidRequest(
                "request body must be a JSON object".into(),
            ));
        };

        let response = ResponseStyle::from_field(body.get("response"));

        let inputs = match body.remove("inputs") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(CoreError::InvalidRequest(
                    "'inputs' must be a JSON object".into(),
                ))
            }
        };

        Ok(Self { inputs, response })
    }
}
