//! `ProxyError` covers every locally-detected failure (§7). Upstream
//! 4xx/5xx responses are not errors here — they're forwarded verbatim by
//! the dispatch pipeline, matching the teacher's split between local
//! failures and pass-through upstream failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("no active route for this client surface")]
    NoMatchingRoute,
    #[error("no rule matches the detected content type, and no default rule exists")]
    NoMatchingRule,
    #[error("rule references a service that no longer exists")]
    TargetServiceMissing,
    #[error("no transform exists for this target/source combination")]
    UnsupportedSourceType,
    #[error("upstream transport failure: {0}")]
    UpstreamTransport(String),
    #[error("transform failed: {0}")]
    TransformFailure(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ProxyError::NoMatchingRoute => StatusCode::NOT_FOUND,
            ProxyError::NoMatchingRule => StatusCode::NOT_FOUND,
            ProxyError::TargetServiceMissing => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UnsupportedSourceType => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamTransport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::TransformFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
