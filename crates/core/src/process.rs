//! Process execution interface and shared types.
//!
//! Defines [`Process`], the trait every executable unit implements, along
//! with [`ProcessOutput`], [`Payload`], [`ProcessError`] and the
//! [`ProcessDescriptor`] the registry hands out.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::execution::JobControlOption;
use crate::types::{is_json_mimetype, MIME_JSON};

/// Named inputs passed to a process.
pub type Inputs = Map<String, Value>;

/// Result payload of a process.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured output, serialised as JSON.
    Json(Value),
    /// Opaque bytes (images, CSV, plain text, ...).
    Bytes(Vec<u8>),
}

impl Payload {
    /// Encode the payload for storage or transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Json(value) => serde_json::to_vec(value),
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    /// Decode a stored payload. JSON mimetypes are parsed back into
    /// [`Payload::Json`]; everything else stays opaque.
    pub fn from_bytes(mimetype: &str, bytes: Vec<u8>) -> Result<Self, serde_json::Error> {
        if is_json_mimetype(mimetype) {
            Ok(Self::Json(serde_json::from_slice(&bytes)?))
        } else {
            Ok(Self::Bytes(bytes))
        }
    }

    /// View the payload as a JSON value for embedding in a JSON document.
    ///
    /// Opaque bytes become a (lossily decoded) string.
    pub fn to_json_value(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// Output of a successful process run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    pub mimetype: String,
    pub payload: Payload,
}

impl ProcessOutput {
    /// A JSON output.
    pub fn json(value: Value) -> Self {
        Self {
            mimetype: MIME_JSON.to_string(),
            payload: Payload::Json(value),
        }
    }

    /// An opaque output tagged with `mimetype`.
    pub fn bytes(mimetype: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mimetype: mimetype.into(),
            payload: Payload::Bytes(bytes.into()),
        }
    }
}

/// Errors a process reports for a single run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Cannot process without {0}")]
    MissingInput(String),

    #[error("Invalid input '{name}': {reason}")]
    InvalidInput { name: String, reason: String },

    #[error("Execution failed: {0}")]
    Execution(String),
}

/// Trait implemented by every executable process.
///
/// Implementations may block; the coordinator always runs them on the
/// blocking thread pool.
pub trait Process: Send + Sync {
    /// Run the process with the given named inputs.
    fn execute(&self, inputs: &Inputs) -> Result<ProcessOutput, ProcessError>;
}

impl<F> Process for F
where
    F: Fn(&Inputs) -> Result<ProcessOutput, ProcessError> + Send + Sync,
{
    fn execute(&self, inputs: &Inputs) -> Result<ProcessOutput, ProcessError> {
        self(inputs)
    }
}

/// Public description of a process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub version: String,
    #[serde(rename = "jobControlOptions")]
    pub job_control_options: Vec<JobControlOption>,
}

/// A registered process: metadata plus the executable unit.
#[derive(Clone)]
pub struct ProcessDescriptor {
    metadata: ProcessMetadata,
    process: Arc<dyn Process>,
}

impl ProcessDescriptor {
    pub fn new(metadata: ProcessMetadata, process: impl Process + 'static) -> Self {
        Self {
            metadata,
            process: Arc::new(process),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn metadata(&self) -> &ProcessMetadata {
        &self.metadata
    }

    pub fn job_control_options(&self) -> &[JobControlOption] {
        &self.metadata.job_control_options
    }

    /// Shared handle to the executable unit, suitable for moving into a
    /// blocking task.
    pub fn process(&self) -> Arc<dyn Process> {
        Arc::clone(&self.process)
    }
}

impl fmt::Debug for ProcessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessDescriptor")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
