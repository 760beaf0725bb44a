//! Primitive type aliases and well-known constants shared across crates.

/// Job identifier. Generated once at job creation and never reassigned.
pub type JobId = String;

/// UTC timestamp used for job bookkeeping.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// MIME type for JSON payloads.
pub const MIME_JSON: &str = "application/json";

/// MIME type for rendered HTML pages.
pub const MIME_HTML: &str = "text/html; charset=utf-8";

/// Generate a new, time-ordered job identifier (UUIDv7).
pub fn new_job_id() -> JobId {
    uuid::Uuid::now_v7().to_string()
}

/// Whether `mimetype` denotes JSON, ignoring parameters such as `charset`.
pub fn is_json_mimetype(mimetype: &str) -> bool {
    mimetype
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(MIME_JSON))
        .unwrap_or(false)
}
