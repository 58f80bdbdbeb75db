//! Assigns a [`ContentType`] to an incoming request: explicit override,
//! then image/thinking/long-context/background heuristics, in that order.
//! First match wins at every step.

use aicodeswitch_storage::ContentType;
use http::HeaderMap;
use serde_json::Value;

const OVERRIDE_HEADERS: &[&str] =
    &["x-aicodeswitch-content-type", "x-content-type", "x-request-type", "x-object-type"];
const OVERRIDE_FIELDS: &[&str] =
    &["contentType", "content_type", "requestType", "request_type", "objectType", "object_type", "mode"];
const LONG_CONTEXT_TOKEN_FIELDS: &[&str] =
    &["max_tokens", "max_output_tokens", "max_completion_tokens", "max_context_tokens"];
const TEXT_BEARING_FIELDS: &[&str] = &["messages", "input", "system", "instructions", "prompt"];

const LONG_CONTEXT_TOKEN_THRESHOLD: u64 = 8000;
const LONG_CONTEXT_CHAR_THRESHOLD: usize = 12000;

/// Request facts the classifier reads. Borrowed, not owned: callers
/// already hold the parsed body and header map at the call site.
pub struct ClassifyInput<'a> {
    pub headers: &'a HeaderMap,
    pub query: &'a [(String, String)],
    pub body: &'a Value,
}

pub fn classify(input: &ClassifyInput) -> ContentType {
    if let Some(content_type) = explicit_override(input) {
        return content_type;
    }
    if has_image_content(input.body) {
        return ContentType::ImageUnderstanding;
    }
    if is_thinking(input.body) {
        return ContentType::Thinking;
    }
    if is_long_context(input.body) {
        return ContentType::LongContext;
    }
    if is_background(input.body) {
        return ContentType::Background;
    }
    ContentType::Default
}

fn explicit_override(input: &ClassifyInput) -> Option<ContentType> {
    for header in OVERRIDE_HEADERS {
        if let Some(value) = input.headers.get(*header).and_then(|v| v.to_str().ok()) {
            if let Some(content_type) = normalize_alias(value) {
                return Some(content_type);
            }
        }
    }
    for field in OVERRIDE_FIELDS {
        if let Some(value) = input.query.iter().find(|(k, _)| k == field).map(|(_, v)| v.as_str()) {
            if let Some(content_type) = normalize_alias(value) {
                return Some(content_type);
            }
        }
        if let Some(value) = input.body.get(*field).and_then(Value::as_str) {
            if let Some(content_type) = normalize_alias(value) {
                return Some(content_type);
            }
        }
    }
    for field in OVERRIDE_FIELDS {
        for container in ["metadata", "meta"] {
            if let Some(value) = input.body.get(container).and_then(|m| m.get(*field)).and_then(Value::as_str) {
                if let Some(content_type) = normalize_alias(value) {
                    return Some(content_type);
                }
            }
        }
    }
    None
}

fn normalize_alias(raw: &str) -> Option<ContentType> {
    let normalized = raw.trim().to_lowercase();
    match normalized.as_str() {
        "bg" => Some(ContentType::Background),
        "reasoning" => Some(ContentType::Thinking),
        "long" | "long_context" => Some(ContentType::LongContext),
        "image" | "vision" | "image_understanding" => Some(ContentType::ImageUnderstanding),
        "default" => Some(ContentType::Default),
        "background" => Some(ContentType::Background),
        "thinking" => Some(ContentType::Thinking),
        "long-context" => Some(ContentType::LongContext),
        "image-understanding" => Some(ContentType::ImageUnderstanding),
        _ => None,
    }
}

fn has_image_content(body: &Value) -> bool {
    for field in ["messages", "input"] {
        if let Some(value) = body.get(field) {
            if scan_for_image(value) {
                return true;
            }
        }
    }
    false
}

fn scan_for_image(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(type_value)) = map.get("type") {
                if matches!(type_value.as_str(), "image" | "image_url" | "input_image") {
                    return true;
                }
            }
            if map.get("image_url").is_some_and(is_truthy) {
                return true;
            }
            map.values().any(scan_for_image)
        }
        Value::Array(items) => items.iter().any(scan_for_image),
        _ => false,
    }
}

fn is_thinking(body: &Value) -> bool {
    if body.get("reasoning").is_some_and(is_truthy) {
        return true;
    }
    if body.get("thinking").is_some_and(is_truthy) {
        return true;
    }
    if body.get("reasoning_effort").is_some_and(is_truthy) {
        return true;
    }
    if let Some(reasoning) = body.get("reasoning") {
        if reasoning.get("effort").is_some_and(is_truthy) {
            return true;
        }
        if reasoning.get("enabled").is_some_and(is_truthy) {
            return true;
        }
    }
    false
}

fn is_long_context(body: &Value) -> bool {
    if body.get("long_context").is_some_and(is_truthy) || body.get("longContext").is_some_and(is_truthy) {
        return true;
    }
    if let Some(metadata) = body.get("metadata") {
        if metadata.get("long_context").is_some_and(is_truthy) || metadata.get("longContext").is_some_and(is_truthy) {
            return true;
        }
    }
    for field in LONG_CONTEXT_TOKEN_FIELDS {
        if let Some(tokens) = body.get(*field).and_then(Value::as_u64) {
            if tokens >= LONG_CONTEXT_TOKEN_THRESHOLD {
                return true;
            }
        }
    }
    estimated_text_length(body) >= LONG_CONTEXT_CHAR_THRESHOLD
}

fn estimated_text_length(body: &Value) -> usize {
    TEXT_BEARING_FIELDS
        .iter()
        .filter_map(|field| body.get(*field))
        .map(collect_text_length)
        .sum()
}

fn collect_text_length(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        Value::Object(map) => map.values().map(collect_text_length).sum(),
        Value::Array(items) => items.iter().map(collect_text_length).sum(),
        _ => 0,
    }
}

fn is_background(body: &Value) -> bool {
    if body.get("background").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    for container in ["metadata", "meta"] {
        if let Some(value) = body.get(container).and_then(|m| m.get("background")) {
            if value.as_bool() == Some(true) {
                return true;
            }
        }
    }
    if is_background_mode_value(body.get("priority")) {
        return true;
    }
    if let Some(metadata) = body.get("metadata") {
        if is_background_mode_value(metadata.get("priority")) {
            return true;
        }
    }
    is_background_mode_value(body.get("mode"))
}

fn is_background_mode_value(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(true)) => true,
        Some(Value::String(s)) => s == "background",
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify_body(body: Value) -> ContentType {
        let headers = HeaderMap::new();
        classify(&ClassifyInput { headers: &headers, query: &[], body: &body })
    }

    #[test]
    fn explicit_override_dominates_heuristics() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-type", "vision".parse().unwrap());
        let body = json!({"messages": [{"content": "just text"}]});
        let result = classify(&ClassifyInput { headers: &headers, query: &[], body: &body });
        assert_eq!(result, ContentType::ImageUnderstanding);
    }

    #[test]
    fn image_url_nested_in_messages_is_detected() {
        let body = json!({"messages": [{"content": [{"type": "image_url", "image_url": {"url": "data:image/png;base64,AA"}}]}]});
        assert_eq!(classify_body(body), ContentType::ImageUnderstanding);
    }

    #[test]
    fn long_context_token_threshold_is_bit_exact() {
        assert_eq!(classify_body(json!({"max_tokens": 7999})), ContentType::Default);
        assert_eq!(classify_body(json!({"max_tokens": 8000})), ContentType::LongContext);
    }

    #[test]
    fn long_context_char_threshold_is_bit_exact() {
        let not_long = json!({"messages": [{"content": "a".repeat(11999)}]});
        let long = json!({"messages": [{"content": "a".repeat(12000)}]});
        assert_eq!(classify_body(not_long), ContentType::Default);
        assert_eq!(classify_body(long), ContentType::LongContext);
    }

    #[test]
    fn background_flag_is_detected() {
        assert_eq!(classify_body(json!({"background": true})), ContentType::Background);
        assert_eq!(classify_body(json!({"mode": "background"})), ContentType::Background);
    }

    #[test]
    fn defaults_when_nothing_matches() {
        assert_eq!(classify_body(json!({"messages": [{"content": "hi"}]})), ContentType::Default);
    }
}
