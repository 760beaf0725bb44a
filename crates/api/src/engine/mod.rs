//! Process execution engine.
//!
//! [`coordinator`] turns an execute request into a job, runs the process
//! (inline or on the background tracker) and builds the response.
//! [`results`] serves stored job results with content negotiation.

pub mod coordinator;
pub mod results;

pub use coordinator::ExecutionCoordinator;
pub use results::{get_job_result, ResultFormat};
