//! Helpers shared by the stream transformers.

use aicodeswitch_protocol::sse::{SseData, SseEvent};
use serde::Serialize;

/// Serializes a Messages/Responses stream event and wraps it with an
/// `event:` line carrying its own `type` tag, matching how the real wire
/// dialects frame each SSE event.
pub fn named_event<T: Serialize>(event: &T) -> SseEvent {
    let value = serde_json::to_value(event).expect("stream event types always serialize");
    let name = value.get("type").and_then(|t| t.as_str()).map(str::to_string);
    match name {
        Some(name) => SseEvent::named_json(name, value),
        None => SseEvent::json(value),
    }
}

/// Pulls the parsed JSON payload out of an incoming SSE event, skipping
/// `[DONE]` and raw/non-JSON payloads (there are none on these dialects).
pub fn event_json(event: &SseEvent) -> Option<&serde_json::Value> {
    match &event.data {
        SseData::Json(value) => Some(value),
        _ => None,
    }
}

pub fn is_done(event: &SseEvent) -> bool {
    matches!(event.data, SseData::Done)
}
