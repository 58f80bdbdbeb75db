//! Helpers shared by more than one payload direction: the stop-reason
//! mapping table and the tool-call argument JSON dance, both quoted
//! verbatim across directions rather than re-derived.

use serde_json::Value;

/// `finish_reason` (Chat/Responses) → `stop_reason` (Messages), bit-exact.
pub fn finish_reason_to_stop_reason(finish_reason: &str) -> &'static str {
    match finish_reason {
        "stop" => "end_turn",
        "length" => "max_tokens",
        "tool_calls" => "tool_use",
        "content_filter" => "end_turn",
        _ => "end_turn",
    }
}

/// Best-effort `arguments` JSON parse; falls back to the raw string when
/// the upstream sent non-JSON or truncated arguments mid-stream.
pub fn parse_tool_arguments(arguments: &str) -> Value {
    serde_json::from_str(arguments).unwrap_or_else(|_| Value::String(arguments.to_string()))
}

pub fn stringify_tool_input(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
