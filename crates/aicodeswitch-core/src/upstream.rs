//! Upstream HTTP dispatch over `wreq`. Status validation is disabled —
//! every status is proxied back to the client, streaming or buffered.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use aicodeswitch_storage::{ApiService, SourceType};

use crate::error::ProxyError;

const HOP_BY_HOP: &[&str] = &["host", "connection", "content-length", "authorization"];

/// A dispatched upstream response, buffered or still streaming.
pub enum UpstreamResponse {
    Buffered { status: StatusCode, headers: HeaderMap, body: Bytes },
    Stream { status: StatusCode, headers: HeaderMap, body: Pin<Box<dyn Stream<Item = Result<Bytes, wreq::Error>> + Send>> },
}

impl UpstreamResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamResponse::Buffered { status, .. } => *status,
            UpstreamResponse::Stream { status, .. } => *status,
        }
    }

    pub fn is_event_stream(&self) -> bool {
        let headers = match self {
            UpstreamResponse::Buffered { headers, .. } => headers,
            UpstreamResponse::Stream { headers, .. } => headers,
        };
        headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("text/event-stream"))
    }
}

/// Copies client headers (minus hop-by-hop and auth) and attaches the
/// upstream credential for `service.source_type`. `anthropic-version`
/// defaults to `2023-06-01` when the client didn't send one.
pub fn build_upstream_headers(client_headers: &HeaderMap, service: &ApiService, streaming: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in client_headers.iter() {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        headers.insert(name.clone(), value.clone());
    }

    headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if service.source_type.is_claude_family() {
        if let Ok(value) = HeaderValue::from_str(&service.api_key) {
            headers.insert(HeaderName::from_static("x-api-key"), value);
        }
        if !headers.contains_key("anthropic-version") {
            headers.insert(HeaderName::from_static("anthropic-version"), HeaderValue::from_static("2023-06-01"));
        }
    } else if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", service.api_key)) {
        headers.insert(http::header::AUTHORIZATION, value);
    }

    if streaming {
        headers.insert(http::header::ACCEPT, HeaderValue::from_static("text/event-stream"));
    }

    headers
}

pub async fn dispatch(
    client: &wreq::Client,
    service: &ApiService,
    path: &str,
    headers: HeaderMap,
    body: Bytes,
    streaming: bool,
) -> Result<UpstreamResponse, ProxyError> {
    let url = format!("{}{}", service.api_url.trim_end_matches('/'), path);
    let timeout = Duration::from_millis(service.timeout_ms);

    let response = client
        .post(&url)
        .headers(headers)
        .body(body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| ProxyError::UpstreamTransport(err.to_string()))?;

    let status = response.status();
    let response_headers = response.headers().clone();

    if streaming
        && response_headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/event-stream"))
    {
        let stream = response.bytes_stream();
        return Ok(UpstreamResponse::Stream { status, headers: response_headers, body: Box::pin(stream) });
    }

    let body = response.bytes().await.map_err(|err| ProxyError::UpstreamTransport(err.to_string()))?;
    Ok(UpstreamResponse::Buffered { status, headers: response_headers, body })
}

pub fn is_streaming_request(body: &serde_json::Value, accept_header: Option<&str>) -> bool {
    body.get("stream").and_then(serde_json::Value::as_bool) == Some(true)
        || accept_header.is_some_and(|value| value.contains("text/event-stream"))
}

pub fn credential_family(source_type: SourceType) -> &'static str {
    if source_type.is_claude_family() {
        "claude"
    } else if source_type.is_openai_responses() {
        "responses"
    } else {
        "chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(source_type: SourceType) -> ApiService {
        ApiService {
            id: "svc".to_string(),
            vendor_id: "vendor".to_string(),
            name: "svc".to_string(),
            api_url: "https://example.test".to_string(),
            api_key: "sk-test".to_string(),
            timeout_ms: 30_000,
            source_type,
            supported_models: Vec::new(),
        }
    }

    #[test]
    fn build_upstream_headers_strips_hop_by_hop_and_injects_bearer_for_non_claude() {
        let mut client_headers = HeaderMap::new();
        client_headers.insert(http::header::HOST, HeaderValue::from_static("client.example"));
        client_headers.insert(http::header::AUTHORIZATION, HeaderValue::from_static("Bearer client-token"));
        client_headers.insert(HeaderName::from_static("x-custom"), HeaderValue::from_static("kept"));

        let headers = build_upstream_headers(&client_headers, &service(SourceType::OpenaiChat), false);

        assert!(!headers.contains_key(http::header::HOST));
        assert_eq!(headers.get("x-custom").unwrap(), "kept");
        assert_eq!(headers.get(http::header::AUTHORIZATION).unwrap(), "Bearer sk-test");
        assert!(!headers.contains_key("x-api-key"));
    }

    #[test]
    fn build_upstream_headers_uses_x_api_key_and_default_anthropic_version_for_claude() {
        let headers = build_upstream_headers(&HeaderMap::new(), &service(SourceType::ClaudeCode), true);

        assert_eq!(headers.get("x-api-key").unwrap(), "sk-test");
        assert_eq!(headers.get("anthropic-version").unwrap(), "2023-06-01");
        assert_eq!(headers.get(http::header::ACCEPT).unwrap(), "text/event-stream");
        assert!(!headers.contains_key(http::header::AUTHORIZATION));
    }

    #[test]
    fn build_upstream_headers_keeps_a_client_supplied_anthropic_version() {
        let mut client_headers = HeaderMap::new();
        client_headers.insert(HeaderName::from_static("anthropic-version"), HeaderValue::from_static("2024-01-01"));

        let headers = build_upstream_headers(&client_headers, &service(SourceType::ClaudeChat), false);

        assert_eq!(headers.get("anthropic-version").unwrap(), "2024-01-01");
    }

    #[test]
    fn is_streaming_request_reads_body_flag_or_accept_header() {
        let streaming_body = serde_json::json!({"stream": true});
        let plain_body = serde_json::json!({});

        assert!(is_streaming_request(&streaming_body, None));
        assert!(is_streaming_request(&plain_body, Some("text/event-stream")));
        assert!(!is_streaming_request(&plain_body, Some("application/json")));
        assert!(!is_streaming_request(&plain_body, None));
    }

    #[test]
    fn credential_family_groups_by_source_type() {
        assert_eq!(credential_family(SourceType::ClaudeChat), "claude");
        assert_eq!(credential_family(SourceType::ClaudeCode), "claude");
        assert_eq!(credential_family(SourceType::OpenaiResponses), "responses");
        assert_eq!(credential_family(SourceType::OpenaiChat), "chat");
        assert_eq!(credential_family(SourceType::OpenaiCode), "chat");
        assert_eq!(credential_family(SourceType::DeepseekChat), "chat");
    }
}
