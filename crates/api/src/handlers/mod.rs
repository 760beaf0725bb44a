pub mod jobs;
pub mod processes;
