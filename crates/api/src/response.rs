//! Shared response types for API handlers.
//!
//! Listing and status endpoints use the `{ "data": ... }` envelope via
//! [`DataResponse`]. Execution and result endpoints return whatever the
//! process produced, so they build a [`ProcessResponse`] instead.

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// `Preference-Applied` response header (RFC 7240).
pub const PREFERENCE_APPLIED: &str = "preference-applied";

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// A fully resolved process or result response: status, extra headers,
/// content type and encoded body.
#[derive(Debug, Clone)]
pub struct ProcessResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ProcessResponse {
    pub fn new(status: StatusCode, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Set the `Location` header.
    pub fn with_location(mut self, location: &str) -> AppResult<Self> {
        let value = HeaderValue::from_str(location).map_err(|e| {
            AppError::NoApplicableCode(format!("invalid Location header '{location}': {e}"))
        })?;
        self.headers.insert(LOCATION, value);
        Ok(self)
    }

    /// Set `Preference-Applied` when a client preference was honoured.
    pub fn with_preference_applied(mut self, preference: Option<&'static str>) -> Self {
        if let Some(preference) = preference {
            self.headers.insert(
                HeaderName::from_static(PREFERENCE_APPLIED),
                HeaderValue::from_static(preference),
            );
        }
        self
    }
}

impl IntoResponse for ProcessResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        match HeaderValue::from_str(&self.content_type) {
            Ok(value) => {
                headers.insert(CONTENT_TYPE, value);
            }
            Err(e) => {
                tracing::warn!(
                    content_type = %self.content_type,
                    error = %e,
                    "Dropping unrepresentable Content-Type"
                );
            }
        }
        headers.extend(self.headers);
        response
    }
}

/// Encode a JSON document, pretty-printed when requested.
pub fn encode_json(value: &Value, pretty: bool) -> AppResult<Vec<u8>> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    encoded.map_err(|e| AppError::NoApplicableCode(format!("JSON encoding failed: {e}")))
}
