//! Per-request log recording over `aicodeswitch_storage::LogSink`.
//!
//! `RequestRecorder::finalize` is guarded by a one-shot flag — both the
//! success path and the error path call it, and only the first call
//! writes anything, mirroring the teacher's idempotence note.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::HeaderMap;
use time::OffsetDateTime;

use aicodeswitch_storage::{
    AccessLog, AccessLogId, AccessLogPatch, ErrorLog, LogSink, RequestLog, TargetType, TokenUsage,
};

fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or("").to_string()))
        .collect()
}

pub struct RequestRecorder {
    sink: Arc<dyn LogSink>,
    enable_request_log: bool,
    trace_id: String,
    started_at: OffsetDateTime,
    method: String,
    path: String,
    request_headers: BTreeMap<String, String>,
    request_body: String,
    access_log_id: AccessLogId,
    finalized: AtomicBool,
}

pub struct RequestOutcome {
    pub status_code: u16,
    pub response_headers: BTreeMap<String, String>,
    pub response_body: Option<String>,
    pub stream_chunks: Vec<String>,
    pub target_provider: String,
    pub target_type: TargetType,
    pub target_service_id: String,
    pub target_service_name: String,
    pub target_model: Option<String>,
    pub vendor_id: String,
    pub vendor_name: String,
    pub request_model: Option<String>,
    pub usage: TokenUsage,
    pub error: Option<String>,
}

impl RequestRecorder {
    pub async fn start(
        sink: Arc<dyn LogSink>,
        enable_request_log: bool,
        method: String,
        path: String,
        headers: &HeaderMap,
        body: String,
    ) -> Self {
        let started_at = OffsetDateTime::now_utc();
        let access_log_id = sink
            .append_access_log(AccessLog {
                id: uuid::Uuid::new_v4(),
                started_at,
                method: method.clone(),
                path: path.clone(),
                status_code: None,
                response_time_ms: None,
                error: None,
            })
            .await
            .unwrap_or_else(|_| uuid::Uuid::new_v4());

        Self {
            sink,
            enable_request_log,
            trace_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            method,
            path,
            request_headers: headers_to_map(headers),
            request_body: body,
            access_log_id,
            finalized: AtomicBool::new(false),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Writes the RequestLog (if logging is enabled and the path qualifies)
    /// and patches the AccessLog. Safe to call more than once; only the
    /// first call has any effect.
    pub async fn finalize(&self, outcome: RequestOutcome) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }

        let elapsed_ms = (OffsetDateTime::now_utc() - self.started_at).whole_milliseconds().max(0) as u64;

        let _ = self
            .sink
            .update_access_log(
                self.access_log_id,
                AccessLogPatch {
                    status_code: Some(outcome.status_code),
                    response_time_ms: Some(elapsed_ms),
                    error: outcome.error.clone(),
                },
            )
            .await;

        if self.enable_request_log && is_core_path(&self.path) {
            let record = RequestLog {
                id: self.trace_id.clone(),
                timestamp: self.started_at,
                method: self.method.clone(),
                path: self.path.clone(),
                request_headers: self.request_headers.clone(),
                request_body: self.request_body.clone(),
                status_code: outcome.status_code,
                response_time_ms: elapsed_ms,
                target_provider: outcome.target_provider,
                target_type: outcome.target_type,
                target_service_id: outcome.target_service_id,
                target_service_name: outcome.target_service_name,
                target_model: outcome.target_model,
                vendor_id: outcome.vendor_id,
                vendor_name: outcome.vendor_name,
                request_model: outcome.request_model,
                response_headers: outcome.response_headers,
                response_body: outcome.response_body,
                stream_chunks: outcome.stream_chunks,
                usage: outcome.usage,
                error: outcome.error,
            };
            let _ = self.sink.append_request_log(record).await;
        }
    }

    pub async fn finalize_error(&self, message: String, headers: &HeaderMap, body: &str) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }
        let elapsed_ms = (OffsetDateTime::now_utc() - self.started_at).whole_milliseconds().max(0) as u64;
        let _ = self
            .sink
            .update_access_log(
                self.access_log_id,
                AccessLogPatch { status_code: Some(500), response_time_ms: Some(elapsed_ms), error: Some(message.clone()) },
            )
            .await;
        let _ = self
            .sink
            .append_error_log(ErrorLog {
                timestamp: OffsetDateTime::now_utc(),
                method: self.method.clone(),
                path: self.path.clone(),
                headers: headers_to_map(headers),
                body: body.to_string(),
                message,
                backtrace: None,
            })
            .await;
    }
}

fn is_core_path(path: &str) -> bool {
    path.starts_with("/claude-code/") || path.starts_with("/codex/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_storage::InMemoryLogSink;

    fn outcome(status: u16) -> RequestOutcome {
        RequestOutcome {
            status_code: status,
            response_headers: BTreeMap::new(),
            response_body: None,
            stream_chunks: Vec::new(),
            target_provider: "claude".to_string(),
            target_type: TargetType::ClaudeCode,
            target_service_id: "svc".to_string(),
            target_service_name: "svc".to_string(),
            target_model: None,
            vendor_id: "v".to_string(),
            vendor_name: "v".to_string(),
            request_model: None,
            usage: TokenUsage::default(),
            error: None,
        }
    }

    #[tokio::test]
    async fn finalize_is_a_one_shot() {
        let sink = Arc::new(InMemoryLogSink::new());
        let headers = HeaderMap::new();
        let recorder = RequestRecorder::start(
            sink.clone(),
            true,
            "POST".to_string(),
            "/claude-code/v1/messages".to_string(),
            &headers,
            "{}".to_string(),
        )
        .await;

        recorder.finalize(outcome(200)).await;
        recorder.finalize(outcome(500)).await;

        let logs = sink.request_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status_code, 200);
    }

    #[tokio::test]
    async fn finalize_skips_the_request_log_when_logging_is_disabled() {
        let sink = Arc::new(InMemoryLogSink::new());
        let recorder = RequestRecorder::start(
            sink.clone(),
            false,
            "POST".to_string(),
            "/claude-code/v1/messages".to_string(),
            &HeaderMap::new(),
            "{}".to_string(),
        )
        .await;

        recorder.finalize(outcome(200)).await;

        assert!(sink.request_logs().await.is_empty());
    }

    #[tokio::test]
    async fn finalize_skips_the_request_log_for_non_core_paths() {
        let sink = Arc::new(InMemoryLogSink::new());
        let recorder = RequestRecorder::start(
            sink.clone(),
            true,
            "GET".to_string(),
            "/healthz".to_string(),
            &HeaderMap::new(),
            String::new(),
        )
        .await;

        recorder.finalize(outcome(200)).await;

        assert!(sink.request_logs().await.is_empty());
    }

    #[test]
    fn is_core_path_matches_only_the_proxy_routes() {
        assert!(is_core_path("/claude-code/v1/messages"));
        assert!(is_core_path("/codex/v1/responses"));
        assert!(!is_core_path("/healthz"));
        assert!(!is_core_path("/"));
    }
}
