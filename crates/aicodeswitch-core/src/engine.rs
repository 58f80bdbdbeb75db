//! The Proxy Engine: per-request orchestration from classified content type
//! through upstream dispatch to response transform and log recording.
//!
//! `ProxyEngine::reload` rebuilds [`RoutingSnapshot`] from the config store
//! and swaps it atomically via `arc-swap`, so a request that already read
//! the old snapshot runs to completion against it.

use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::StreamExt;
use http::HeaderMap;
use serde_json::Value;

use aicodeswitch_protocol::sse::{SseEvent, SseParser, SseSerializer};
use aicodeswitch_protocol::{chat, messages, responses};
use aicodeswitch_storage::{ApiService, AppConfig, ConfigStore, LogSink, SourceType, TargetType, TokenUsage};
use aicodeswitch_transform::payload;
use aicodeswitch_transform::stream::{
    ChatToMessagesStream, ChatToResponsesStream, MessagesToResponsesStream, ResponsesToMessagesStream,
};

use crate::auth;
use crate::classify::{self, ClassifyInput};
use crate::error::ProxyError;
use crate::log::{RequestOutcome, RequestRecorder};
use crate::resolve::{self, RoutingSnapshot};
use crate::upstream;

/// Which payload transform applies for a given (targetType, sourceType)
/// pair, per the request translation matrix (§4.6 step 3). The response
/// side (buffered and streaming) runs the same transform in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTransform {
    PassThrough,
    MessagesToChat,
    MessagesToResponses,
    ResponsesToChat,
    ResponsesToMessages,
}

pub fn translation(target_type: TargetType, source_type: SourceType) -> Result<RouteTransform, ProxyError> {
    match (target_type, source_type) {
        (TargetType::ClaudeCode, st) if st.is_claude_family() => Ok(RouteTransform::PassThrough),
        (TargetType::ClaudeCode, st) if st.is_openai_chat_family() => Ok(RouteTransform::MessagesToChat),
        (TargetType::ClaudeCode, SourceType::OpenaiResponses) => Ok(RouteTransform::MessagesToResponses),
        (TargetType::Codex, SourceType::OpenaiResponses) => Ok(RouteTransform::PassThrough),
        (TargetType::Codex, st) if st.is_openai_chat_family() => Ok(RouteTransform::ResponsesToChat),
        (TargetType::Codex, st) if st.is_claude_family() => Ok(RouteTransform::ResponsesToMessages),
        _ => Err(ProxyError::UnsupportedSourceType),
    }
}

/// Delegates `on_event`/`finalize` to whichever stream transformer the
/// response side needs, or passes events straight through untouched.
enum ResponseStream {
    PassThrough,
    ChatToMessages(ChatToMessagesStream),
    ResponsesToMessages(ResponsesToMessagesStream),
    ChatToResponses(ChatToResponsesStream),
    MessagesToResponses(MessagesToResponsesStream),
}

impl ResponseStream {
    fn for_transform(transform: RouteTransform) -> Self {
        match transform {
            RouteTransform::PassThrough => ResponseStream::PassThrough,
            RouteTransform::MessagesToChat => ResponseStream::ChatToMessages(ChatToMessagesStream::new()),
            RouteTransform::MessagesToResponses => ResponseStream::ResponsesToMessages(ResponsesToMessagesStream::new()),
            RouteTransform::ResponsesToChat => ResponseStream::ChatToResponses(ChatToResponsesStream::new()),
            RouteTransform::ResponsesToMessages => ResponseStream::MessagesToResponses(MessagesToResponsesStream::new()),
        }
    }

    fn on_event(&mut self, event: SseEvent) -> Vec<SseEvent> {
        match self {
            ResponseStream::PassThrough => vec![event],
            ResponseStream::ChatToMessages(s) => s.on_event(event),
            ResponseStream::ResponsesToMessages(s) => s.on_event(event),
            ResponseStream::ChatToResponses(s) => s.on_event(event),
            ResponseStream::MessagesToResponses(s) => s.on_event(event),
        }
    }

    fn finalize(&mut self) -> Vec<SseEvent> {
        match self {
            ResponseStream::PassThrough => Vec::new(),
            ResponseStream::ChatToMessages(s) => s.finalize(),
            ResponseStream::ResponsesToMessages(s) => s.finalize(),
            ResponseStream::ChatToResponses(s) => s.finalize(),
            ResponseStream::MessagesToResponses(s) => s.finalize(),
        }
    }

    /// Usage the transformer itself accumulated from the dialect-native
    /// stream events, converted to the storage model. `None` for
    /// `PassThrough`, which never parses events and so never sees usage.
    fn usage(&self) -> Option<TokenUsage> {
        let usage = match self {
            ResponseStream::PassThrough => return None,
            ResponseStream::ChatToMessages(s) => s.usage(),
            ResponseStream::ResponsesToMessages(s) => s.usage(),
            ResponseStream::ChatToResponses(s) => s.usage(),
            ResponseStream::MessagesToResponses(s) => s.usage(),
        };
        Some(TokenUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: None,
            cache_read_input_tokens: usage.cache_read_input_tokens,
        })
    }
}

/// One resolved, ready-to-dispatch request: the upstream body, the service
/// to send it to, and everything the log recorder will need afterward.
pub struct PreparedRequest {
    pub service: ApiService,
    pub transform: RouteTransform,
    pub streaming: bool,
    pub upstream_body: Bytes,
    pub target_type: TargetType,
    pub target_service_id: String,
    pub target_service_name: String,
    pub vendor_id: String,
    pub request_model: Option<String>,
}

pub struct ProxyEngine {
    config_store: Arc<dyn ConfigStore>,
    log_sink: Arc<dyn LogSink>,
    http_client: wreq::Client,
    snapshot: ArcSwap<RoutingSnapshot>,
    app_config: ArcSwap<AppConfig>,
}

impl ProxyEngine {
    pub fn new(config_store: Arc<dyn ConfigStore>, log_sink: Arc<dyn LogSink>, http_client: wreq::Client) -> Self {
        Self {
            config_store,
            log_sink,
            http_client,
            snapshot: ArcSwap::from_pointee(RoutingSnapshot::default()),
            app_config: ArcSwap::from_pointee(AppConfig::default()),
        }
    }

    /// Rebuilds `activeRoutes`/`rulesByRouteId`/`servicesById` from the
    /// config store and swaps them in atomically.
    pub async fn reload(&self) -> Result<(), ProxyError> {
        let routes = self
            .config_store
            .list_active_routes()
            .await
            .map_err(|err| ProxyError::TransformFailure(err.to_string()))?;

        let mut rules = Vec::new();
        for route in &routes {
            let mut route_rules = self
                .config_store
                .list_rules(&route.id)
                .await
                .map_err(|err| ProxyError::TransformFailure(err.to_string()))?;
            rules.append(&mut route_rules);
        }

        let services = self
            .config_store
            .list_services()
            .await
            .map_err(|err| ProxyError::TransformFailure(err.to_string()))?;

        let config = self
            .config_store
            .get_config()
            .await
            .map_err(|err| ProxyError::TransformFailure(err.to_string()))?;

        self.snapshot.store(Arc::new(RoutingSnapshot::build(routes, rules, services)));
        self.app_config.store(Arc::new(config));
        Ok(())
    }

    pub fn enable_request_log(&self) -> bool {
        self.app_config.load().enable_logging
    }

    pub fn log_sink(&self) -> Arc<dyn LogSink> {
        self.log_sink.clone()
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<(), ProxyError> {
        auth::check_bearer(headers, &self.app_config.load().api_key)
    }

    /// Steps 2-5 of the pipeline: classify, resolve, translate the request
    /// body, and decide whether this is a streaming exchange.
    pub fn prepare(
        &self,
        target_type: TargetType,
        headers: &HeaderMap,
        query: &[(String, String)],
        body: &[u8],
    ) -> Result<PreparedRequest, ProxyError> {
        let json: Value = serde_json::from_slice(body).unwrap_or(Value::Null);

        let content_type = classify::classify(&ClassifyInput { headers, query, body: &json });

        let snapshot = self.snapshot.load();
        let resolution = resolve::resolve(&snapshot, target_type, content_type)?;

        let transform = translation(target_type, resolution.service.source_type)?;
        let is_deepseek = matches!(resolution.service.source_type, SourceType::DeepseekChat);

        let request_model = json.get("model").and_then(Value::as_str).map(str::to_string);
        let target_model = resolution.rule.target_model.clone();

        let upstream_body = translate_request(transform, &json, is_deepseek, target_model.as_deref())?;

        let accept_header = headers.get(http::header::ACCEPT).and_then(|v| v.to_str().ok());
        let streaming = upstream::is_streaming_request(&json, accept_header);

        Ok(PreparedRequest {
            service: resolution.service.clone(),
            transform,
            streaming,
            upstream_body,
            target_type,
            target_service_id: resolution.service.id.clone(),
            target_service_name: resolution.service.name.clone(),
            vendor_id: resolution.service.vendor_id.clone(),
            request_model,
        })
    }

    pub fn http_client(&self) -> &wreq::Client {
        &self.http_client
    }

    pub async fn dispatch(
        &self,
        prepared: &PreparedRequest,
        client_headers: HeaderMap,
        upstream_path: &str,
    ) -> Result<upstream::UpstreamResponse, ProxyError> {
        let headers = upstream::build_upstream_headers(&client_headers, &prepared.service, prepared.streaming);
        upstream::dispatch(
            &self.http_client,
            &prepared.service,
            upstream_path,
            headers,
            prepared.upstream_body.clone(),
            prepared.streaming,
        )
        .await
    }
}

fn translate_request(
    transform: RouteTransform,
    json: &Value,
    is_deepseek: bool,
    target_model: Option<&str>,
) -> Result<Bytes, ProxyError> {
    let mut value = match transform {
        RouteTransform::PassThrough => json.clone(),
        RouteTransform::MessagesToChat => {
            let request: messages::MessagesRequest = serde_json::from_value(json.clone())
                .map_err(|err| ProxyError::TransformFailure(err.to_string()))?;
            let chat = payload::messages_to_chat::transform_request(&request, is_deepseek);
            serde_json::to_value(chat).map_err(|err| ProxyError::TransformFailure(err.to_string()))?
        }
        RouteTransform::MessagesToResponses => {
            let request: messages::MessagesRequest = serde_json::from_value(json.clone())
                .map_err(|err| ProxyError::TransformFailure(err.to_string()))?;
            let out = payload::messages_to_responses::transform_request(&request);
            serde_json::to_value(out).map_err(|err| ProxyError::TransformFailure(err.to_string()))?
        }
        RouteTransform::ResponsesToChat => {
            let request: responses::CreateResponseRequest = serde_json::from_value(json.clone())
                .map_err(|err| ProxyError::TransformFailure(err.to_string()))?;
            let out = payload::responses_to_chat::transform_request(&request);
            serde_json::to_value(out).map_err(|err| ProxyError::TransformFailure(err.to_string()))?
        }
        RouteTransform::ResponsesToMessages => {
            let request: responses::CreateResponseRequest = serde_json::from_value(json.clone())
                .map_err(|err| ProxyError::TransformFailure(err.to_string()))?;
            let out = payload::responses_to_messages::transform_request(&request);
            serde_json::to_value(out).map_err(|err| ProxyError::TransformFailure(err.to_string()))?
        }
    };

    if let Some(model) = target_model {
        if let Some(obj) = value.as_object_mut() {
            obj.insert("model".to_string(), Value::String(model.to_string()));
        }
    }

    serde_json::to_vec(&value).map(Bytes::from).map_err(|err| ProxyError::TransformFailure(err.to_string()))
}

/// Applies the response-side symmetric transform to a buffered, 2xx JSON
/// body. 4xx/5xx bodies are forwarded untouched — the caller never calls
/// this for those.
pub fn translate_response(transform: RouteTransform, body: &[u8], model: &str) -> Result<Bytes, ProxyError> {
    let json: Value = serde_json::from_slice(body).map_err(|err| ProxyError::TransformFailure(err.to_string()))?;

    let out = match transform {
        RouteTransform::PassThrough => json,
        RouteTransform::MessagesToChat => {
            let response: chat::CreateChatCompletionResponse =
                serde_json::from_value(json).map_err(|err| ProxyError::TransformFailure(err.to_string()))?;
            let out = payload::chat_to_messages::transform_response(&response, model);
            serde_json::to_value(out).map_err(|err| ProxyError::TransformFailure(err.to_string()))?
        }
        RouteTransform::MessagesToResponses => {
            let response: responses::CreateResponseResponse =
                serde_json::from_value(json).map_err(|err| ProxyError::TransformFailure(err.to_string()))?;
            let out = payload::responses_to_messages::transform_response(&response);
            serde_json::to_value(out).map_err(|err| ProxyError::TransformFailure(err.to_string()))?
        }
        RouteTransform::ResponsesToChat => {
            let response: chat::CreateChatCompletionResponse =
                serde_json::from_value(json).map_err(|err| ProxyError::TransformFailure(err.to_string()))?;
            let out = payload::chat_to_responses::transform_response(&response, model);
            serde_json::to_value(out).map_err(|err| ProxyError::TransformFailure(err.to_string()))?
        }
        RouteTransform::ResponsesToMessages => {
            let response: messages::MessagesResponse =
                serde_json::from_value(json).map_err(|err| ProxyError::TransformFailure(err.to_string()))?;
            let out = payload::messages_to_responses::transform_response(&response);
            serde_json::to_value(out).map_err(|err| ProxyError::TransformFailure(err.to_string()))?
        }
    };

    serde_json::to_vec(&out).map(Bytes::from).map_err(|err| ProxyError::TransformFailure(err.to_string()))
}

/// Extracts token usage from a buffered JSON body without knowing its
/// dialect ahead of time: tries Messages-shaped `usage`, then Chat-shaped,
/// then Responses-shaped, defaulting to zero.
pub fn usage_from_json(value: &Value) -> TokenUsage {
    let Some(usage) = value.get("usage").or_else(|| value.pointer("/response/usage")) else {
        return TokenUsage::default();
    };

    let input = usage
        .get("input_tokens")
        .or_else(|| usage.get("prompt_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let output = usage
        .get("output_tokens")
        .or_else(|| usage.get("completion_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let total = usage.get("total_tokens").and_then(Value::as_u64);
    let cache_read = usage
        .get("cache_read_input_tokens")
        .or_else(|| usage.pointer("/input_tokens_details/cached_tokens"))
        .or_else(|| usage.pointer("/prompt_tokens_details/cached_tokens"))
        .and_then(Value::as_u64);

    TokenUsage { input_tokens: input, output_tokens: output, total_tokens: total, cache_read_input_tokens: cache_read }
}

/// Heuristic usage extraction for a finished SSE exchange when no stream
/// transformer ran (pass-through): scan collected chunks from the end for
/// the last one carrying a `usage` object.
fn usage_from_chunks(chunks: &[String]) -> TokenUsage {
    for raw in chunks.iter().rev() {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            let usage = usage_from_json(&value);
            if usage.input_tokens != 0 || usage.output_tokens != 0 {
                return usage;
            }
        }
    }
    TokenUsage::default()
}

struct StreamState {
    upstream: std::pin::Pin<Box<dyn futures_util::Stream<Item = Result<Bytes, wreq::Error>> + Send>>,
    parser: SseParser,
    transformer: ResponseStream,
    pending: std::collections::VecDeque<Bytes>,
    collected: Vec<String>,
    recorder: Arc<RequestRecorder>,
    outcome: Option<RequestOutcome>,
    finished: bool,
}

impl StreamState {
    fn push_transformed(&mut self, events: Vec<SseEvent>) {
        for event in events {
            self.collected.push(event.data_str());
            for out in self.transformer.on_event(event) {
                self.pending.push_back(SseSerializer::encode(&out));
            }
        }
    }
}

/// Builds the streaming response body: upstream bytes → SSE parser →
/// chunk collector → response-side stream transformer → SSE serializer.
/// A finish hook on the wrapped stream extracts usage (from the
/// transformer's own bookkeeping, or the chunk heuristic), snapshots the
/// collected chunks, and finalizes the log record.
pub fn stream_response_body(
    upstream: std::pin::Pin<Box<dyn futures_util::Stream<Item = Result<Bytes, wreq::Error>> + Send>>,
    transform: RouteTransform,
    recorder: Arc<RequestRecorder>,
    outcome: RequestOutcome,
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> + Send {
    let state = StreamState {
        upstream,
        parser: SseParser::new(),
        transformer: ResponseStream::for_transform(transform),
        pending: std::collections::VecDeque::new(),
        collected: Vec::new(),
        recorder,
        outcome: Some(outcome),
        finished: false,
    };

    unfold(state, |mut state| async move {
        loop {
            if let Some(bytes) = state.pending.pop_front() {
                return Some((Ok(bytes), state));
            }

            if state.finished {
                return None;
            }

            match state.upstream.next().await {
                Some(Ok(chunk)) => {
                    let events = state.parser.push_bytes(&chunk);
                    state.push_transformed(events);
                }
                Some(Err(_)) | None => {
                    state.finished = true;
                    let remaining = std::mem::replace(&mut state.parser, SseParser::new()).finish();
                    state.push_transformed(remaining);
                    let extra = state.transformer.finalize();
                    for event in extra {
                        state.collected.push(event.data_str());
                        state.pending.push_back(SseSerializer::encode(&event));
                    }

                    if let Some(mut outcome) = state.outcome.take() {
                        let transformer_usage = state.transformer.usage();
                        outcome.usage = match transformer_usage {
                            Some(usage) if usage.input_tokens != 0 || usage.output_tokens != 0 => usage,
                            _ => usage_from_chunks(&state.collected),
                        };
                        outcome.stream_chunks = state.collected.clone();
                        state.recorder.finalize(outcome).await;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_storage::InMemoryLogSink;
    use futures_util::stream;

    fn route(target: TargetType, source: SourceType) -> RouteTransform {
        translation(target, source).expect("every (target, source) pair in this matrix is supported")
    }

    #[test]
    fn translation_matrix_matches_the_request_translation_table() {
        use SourceType::*;
        use TargetType::*;

        assert_eq!(route(ClaudeCode, ClaudeChat), RouteTransform::PassThrough);
        assert_eq!(route(ClaudeCode, ClaudeCode), RouteTransform::PassThrough);
        assert_eq!(route(ClaudeCode, OpenaiChat), RouteTransform::MessagesToChat);
        assert_eq!(route(ClaudeCode, OpenaiCode), RouteTransform::MessagesToChat);
        assert_eq!(route(ClaudeCode, DeepseekChat), RouteTransform::MessagesToChat);
        assert_eq!(route(ClaudeCode, OpenaiResponses), RouteTransform::MessagesToResponses);

        assert_eq!(route(Codex, OpenaiResponses), RouteTransform::PassThrough);
        assert_eq!(route(Codex, OpenaiChat), RouteTransform::ResponsesToChat);
        assert_eq!(route(Codex, OpenaiCode), RouteTransform::ResponsesToChat);
        assert_eq!(route(Codex, DeepseekChat), RouteTransform::ResponsesToChat);
        assert_eq!(route(Codex, ClaudeChat), RouteTransform::ResponsesToMessages);
        assert_eq!(route(Codex, ClaudeCode), RouteTransform::ResponsesToMessages);
    }

    #[test]
    fn usage_from_json_reads_top_level_and_nested_responses_shaped_usage() {
        let top_level = serde_json::json!({"usage": {"input_tokens": 5, "output_tokens": 2}});
        let usage = usage_from_json(&top_level);
        assert_eq!(usage.input_tokens, 5);
        assert_eq!(usage.output_tokens, 2);

        let responses_nested = serde_json::json!({
            "type": "response.completed",
            "response": {"usage": {"input_tokens": 7, "output_tokens": 3}}
        });
        let usage = usage_from_json(&responses_nested);
        assert_eq!(usage.input_tokens, 7);
        assert_eq!(usage.output_tokens, 3);

        let neither = serde_json::json!({"foo": "bar"});
        assert_eq!(usage_from_json(&neither), TokenUsage::default());
    }

    #[test]
    fn usage_from_chunks_scans_from_the_end_for_the_last_usage_bearing_chunk() {
        let chunks = vec![
            serde_json::json!({"usage": {"input_tokens": 1, "output_tokens": 1}}).to_string(),
            "not json at all".to_string(),
            serde_json::json!({"usage": {"input_tokens": 9, "output_tokens": 4}}).to_string(),
        ];
        let usage = usage_from_chunks(&chunks);
        assert_eq!(usage.input_tokens, 9);
        assert_eq!(usage.output_tokens, 4);
    }

    fn fake_outcome() -> RequestOutcome {
        RequestOutcome {
            status_code: 200,
            response_headers: std::collections::BTreeMap::new(),
            response_body: None,
            stream_chunks: Vec::new(),
            target_provider: "chat".to_string(),
            target_type: TargetType::Codex,
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
    async fn stream_response_body_prefers_transformer_usage_over_the_chunk_heuristic() {
        let sink = Arc::new(InMemoryLogSink::new());
        let recorder = Arc::new(
            RequestRecorder::start(
                sink.clone(),
                true,
                "POST".to_string(),
                "/codex/v1/chat/completions".to_string(),
                &HeaderMap::new(),
                "{}".to_string(),
            )
            .await,
        );

        // A chat-shaped chunk whose `usage` names sit under `prompt_tokens`/
        // `completion_tokens` — the chunk-scanning heuristic in
        // `usage_from_chunks` would read zero for these names unchanged,
        // so a correct result here can only have come from the transformer.
        let chunk = serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4",
            "choices": [{"index": 0, "delta": {"content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 11, "completion_tokens": 6}
        });
        let upstream_bytes = SseSerializer::encode(&SseEvent::json(chunk));
        let done_bytes = SseSerializer::encode(&SseEvent::done());

        let upstream = Box::pin(stream::iter(vec![
            Ok::<Bytes, wreq::Error>(upstream_bytes),
            Ok::<Bytes, wreq::Error>(done_bytes),
        ]));

        let body = stream_response_body(upstream, RouteTransform::MessagesToChat, recorder.clone(), fake_outcome());
        futures_util::pin_mut!(body);
        while body.next().await.is_some() {}

        let logs = sink.request_logs().await;
        let recorded = logs.first().expect("one request log written");
        assert_eq!(recorded.usage.input_tokens, 11);
        assert_eq!(recorded.usage.output_tokens, 6);
    }
}
