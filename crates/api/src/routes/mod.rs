pub mod health;
pub mod jobs;
pub mod processes;

use axum::Router;

use crate::state::AppState;

/// Build the service route tree. All routes live at the root.
///
/// Route hierarchy:
///
/// ```text
/// /health                                          service + store health
///
/// /processes                                       list processes
/// /processes/{id}                                  process description
/// /processes/{id}/execution                        execute (POST)
/// /processes/{process_id}/jobs/{job_id}            job status scoped to a process
///
/// /jobs                                            list jobs (?process_id=)
/// /jobs/{id}                                       job status, dismiss (DELETE)
/// /jobs/{id}/results                               job result (?f=json|html)
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/processes", processes::router())
        .nest("/jobs", jobs::router())
}
