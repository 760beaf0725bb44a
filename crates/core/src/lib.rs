//! Domain logic for the process-execution service.
//!
//! Everything in this crate is pure (no database, no HTTP) so it can be used
//! by the job store, the API server, and tests alike.

pub mod error;
pub mod execution;
pub mod job_status;
pub mod process;
pub mod processes;
pub mod registry;
pub mod types;
