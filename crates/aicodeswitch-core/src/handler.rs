//! axum wiring: `/claude-code/**` and `/codex/**` proxy endpoints plus
//! `/healthz`, grounded in the teacher's thin `proxy_handler` — classify,
//! resolve, dispatch, respond, record, nothing else lives here.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use bytes::Bytes;
use http::header::CONTENT_TYPE;

use aicodeswitch_storage::TargetType;

use crate::engine::{self, ProxyEngine};
use crate::log::{RequestOutcome, RequestRecorder};
use crate::upstream::{self, UpstreamResponse};

pub fn router(engine: Arc<ProxyEngine>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/claude-code/{*path}", any(claude_code_handler))
        .route("/codex/{*path}", any(codex_handler))
        .with_state(engine)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn claude_code_handler(
    State(engine): State<Arc<ProxyEngine>>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    handle(engine, TargetType::ClaudeCode, path, method, headers, uri, body).await
}

async fn codex_handler(
    State(engine): State<Arc<ProxyEngine>>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    handle(engine, TargetType::Codex, path, method, headers, uri, body).await
}

fn parse_query(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .map(|raw| url::form_urlencoded::parse(raw.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

async fn handle(
    engine: Arc<ProxyEngine>,
    target_type: TargetType,
    path: String,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    if let Err(err) = engine.authenticate(&headers) {
        return err.into_response();
    }

    let request_body = String::from_utf8_lossy(&body).into_owned();
    let full_path = format!("/{}/{}", target_type.as_path_prefix(), path);
    let recorder = Arc::new(
        RequestRecorder::start(engine.log_sink(), engine.enable_request_log(), method.to_string(), full_path.clone(), &headers, request_body)
            .await,
    );

    let query = parse_query(&uri);
    let prepared = match engine.prepare(target_type, &headers, &query, &body) {
        Ok(prepared) => prepared,
        Err(err) => {
            recorder.finalize_error(err.to_string(), &headers, &String::from_utf8_lossy(&body)).await;
            return err.into_response();
        }
    };

    let upstream_path = format!("/{}", path);
    let upstream_response = match engine.dispatch(&prepared, headers.clone(), &upstream_path).await {
        Ok(response) => response,
        Err(err) => {
            recorder.finalize_error(err.to_string(), &headers, &String::from_utf8_lossy(&body)).await;
            return err.into_response();
        }
    };

    respond(prepared, upstream_response, recorder).await
}

async fn respond(
    prepared: engine::PreparedRequest,
    upstream_response: UpstreamResponse,
    recorder: Arc<RequestRecorder>,
) -> Response {
    let model = prepared.request_model.clone().unwrap_or_default();

    let outcome_base = |status_code: u16| RequestOutcome {
        status_code,
        response_headers: std::collections::BTreeMap::new(),
        response_body: None,
        stream_chunks: Vec::new(),
        target_provider: upstream::credential_family(prepared.service.source_type).to_string(),
        target_type: prepared.target_type,
        target_service_id: prepared.target_service_id.clone(),
        target_service_name: prepared.target_service_name.clone(),
        target_model: prepared.request_model.clone(),
        vendor_id: prepared.vendor_id.clone(),
        vendor_name: prepared.vendor_id.clone(),
        request_model: prepared.request_model.clone(),
        usage: Default::default(),
        error: None,
    };

    match upstream_response {
        UpstreamResponse::Stream { status, headers, body } if headers_are_event_stream(&headers) => {
            let mut response_headers = HeaderMap::new();
            response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
            response_headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            response_headers.insert(http::header::CONNECTION, HeaderValue::from_static("keep-alive"));

            let outcome = outcome_base(status.as_u16());
            let body_stream = engine::stream_response_body(body, prepared.transform, recorder, outcome);

            let mut response = Response::new(Body::from_stream(body_stream));
            *response.status_mut() = status;
            *response.headers_mut() = response_headers;
            response
        }
        UpstreamResponse::Stream { status, headers, body } => {
            // Upstream claimed a streaming dispatch but didn't actually send
            // an event-stream content-type; forward the raw stream as-is.
            let outcome = outcome_base(status.as_u16());
            recorder.finalize(outcome).await;
            let mut response = Response::new(Body::from_stream(body));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        UpstreamResponse::Buffered { status, headers, body } if status.is_success() => {
            let translated = if prepared.transform == engine::RouteTransform::PassThrough {
                Ok(body.clone())
            } else {
                engine::translate_response(prepared.transform, &body, &model)
            };

            match translated {
                Ok(translated_body) => {
                    let usage = serde_json::from_slice::<serde_json::Value>(&translated_body)
                        .map(|value| engine::usage_from_json(&value))
                        .unwrap_or_default();

                    let mut outcome = outcome_base(status.as_u16());
                    outcome.usage = usage;
                    outcome.response_body = Some(String::from_utf8_lossy(&translated_body).into_owned());
                    recorder.finalize(outcome).await;

                    let mut response = Response::new(Body::from(translated_body));
                    *response.status_mut() = status;
                    *response.headers_mut() = headers;
                    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    response
                }
                Err(err) => {
                    recorder.finalize_error(err.to_string(), &HeaderMap::new(), "").await;
                    err.into_response()
                }
            }
        }
        UpstreamResponse::Buffered { status, headers, body } => {
            // 4xx/5xx: forwarded verbatim, never transformed.
            let usage = serde_json::from_slice::<serde_json::Value>(&body)
                .map(|value| engine::usage_from_json(&value))
                .unwrap_or_default();

            let mut outcome = outcome_base(status.as_u16());
            outcome.usage = usage;
            outcome.response_body = Some(String::from_utf8_lossy(&body).into_owned());
            recorder.finalize(outcome).await;

            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
    }
}

fn headers_are_event_stream(headers: &HeaderMap) -> bool {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).is_some_and(|v| v.contains("text/event-stream"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_decodes_pairs_and_handles_no_query() {
        let with_query: Uri = "/claude-code/v1/messages?beta=true&model=claude-3-opus".parse().unwrap();
        let pairs = parse_query(&with_query);
        assert_eq!(
            pairs,
            vec![("beta".to_string(), "true".to_string()), ("model".to_string(), "claude-3-opus".to_string())]
        );

        let without_query: Uri = "/claude-code/v1/messages".parse().unwrap();
        assert!(parse_query(&without_query).is_empty());
    }

    #[test]
    fn parse_query_url_decodes_percent_encoded_values() {
        let uri: Uri = "/codex/v1/responses?name=hello%20world".parse().unwrap();
        let pairs = parse_query(&uri);
        assert_eq!(pairs, vec![("name".to_string(), "hello world".to_string())]);
    }

    #[test]
    fn headers_are_event_stream_checks_content_type() {
        let mut headers = HeaderMap::new();
        assert!(!headers_are_event_stream(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream; charset=utf-8"));
        assert!(headers_are_event_stream(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!headers_are_event_stream(&headers));
    }
}
