//! `hello-world`: the calibration process.
//!
//! Greets `name`, optionally appending `message`. Used by the service's
//! conformance tests and as a smoke test for deployments.

use serde_json::{json, Value};

use crate::execution::JobControlOption;
use crate::process::{
    Inputs, Process, ProcessDescriptor, ProcessError, ProcessMetadata, ProcessOutput,
};

/// Registry identifier of the process.
pub const PROCESS_ID: &str = "hello-world";

/// Output identifier carried in the result document.
const OUTPUT_ID: &str = "echo";

pub struct HelloWorld;

impl HelloWorld {
    pub fn descriptor() -> ProcessDescriptor {
        ProcessDescriptor::new(
            ProcessMetadata {
                id: PROCESS_ID.to_string(),
                title: "Hello World".to_string(),
                description: "An example process that takes a name as input, and echoes \
                              it back as output."
                    .to_string(),
                version: "0.2.0".to_string(),
                job_control_options: vec![
                    JobControlOption::SyncExecute,
                    JobControlOption::AsyncExecute,
                ],
            },
            HelloWorld,
        )
    }
}

impl Process for HelloWorld {
    fn execute(&self, inputs: &Inputs) -> Result<ProcessOutput, ProcessError> {
        let name = match inputs.get("name") {
            None | Some(Value::Null) => {
                return Err(ProcessError::MissingInput("a name".to_string()))
            }
            Some(Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
        };

        let message = match inputs.get("message") {
            Some(Value::String(message)) => message.as_str(),
            _ => "",
        };

        let value = format!("Hello {name}! {message}").trim().to_string();

        Ok(ProcessOutput::json(json!({
            "id": OUTPUT_ID,
            "value": value,
        })))
    }
}
