//! Messages SSE stream → Responses SSE stream.

use aicodeswitch_protocol::messages::{ContentBlockDelta, ContentBlockStart, MessagesStreamEvent};
use aicodeswitch_protocol::responses::{CreateResponseResponse, OutputItem, ResponsesStreamEvent};
use aicodeswitch_protocol::sse::SseEvent;

use crate::payload::messages_to_responses::default_usage_from;

use super::common::{event_json, is_done, named_event};

enum BlockKind {
    Text { item_id: String, text: String },
    Tool { item_id: String, call_id: String, name: String, arguments: String },
}

/// Records upstream identity on `message_start`, routes each content block
/// by kind into the matching `response.output_*` delta/done pair, and
/// assembles the full `output[]` array on `message_stop`.
pub struct MessagesToResponsesStream {
    response_id: String,
    model: String,
    blocks: Vec<Option<BlockKind>>,
    completed: Vec<OutputItem>,
    usage: aicodeswitch_protocol::messages::Usage,
    finalized: bool,
}

impl MessagesToResponsesStream {
    pub fn new() -> Self {
        Self {
            response_id: String::new(),
            model: "unknown".to_string(),
            blocks: Vec::new(),
            completed: Vec::new(),
            usage: aicodeswitch_protocol::messages::Usage::default(),
            finalized: false,
        }
    }

    pub fn on_event(&mut self, event: SseEvent) -> Vec<SseEvent> {
        if self.finalized {
            return Vec::new();
        }
        if is_done(&event) {
            return self.finalize();
        }
        let Some(value) = event_json(&event) else {
            return Vec::new();
        };
        let Ok(parsed) = serde_json::from_value::<MessagesStreamEvent>(value.clone()) else {
            return Vec::new();
        };

        match parsed {
            MessagesStreamEvent::MessageStart { message } => {
                self.response_id = message.id;
                self.model = message.model;
                vec![named_event(&ResponsesStreamEvent::Created {
                    response: skeleton_response(&self.response_id, &self.model),
                })]
            }
            MessagesStreamEvent::ContentBlockStart { index, content_block } => {
                self.ensure_capacity(index);
                let item_id = format!("item_{index}");
                self.blocks[index] = Some(match content_block {
                    ContentBlockStart::Text { .. } => BlockKind::Text { item_id, text: String::new() },
                    ContentBlockStart::ToolUse { id, name, .. } => {
                        BlockKind::Tool { item_id, call_id: id, name, arguments: String::new() }
                    }
                    ContentBlockStart::Thinking { .. } => return Vec::new(),
                });
                Vec::new()
            }
            MessagesStreamEvent::ContentBlockDelta { index, delta } => self.push_delta(index, delta),
            MessagesStreamEvent::ContentBlockStop { index } => self.close_block(index),
            MessagesStreamEvent::MessageDelta { usage, .. } => {
                self.usage = usage;
                Vec::new()
            }
            MessagesStreamEvent::MessageStop => self.finalize(),
        }
    }

    fn ensure_capacity(&mut self, index: usize) {
        if self.blocks.len() <= index {
            self.blocks.resize_with(index + 1, || None);
        }
    }

    fn push_delta(&mut self, index: usize, delta: ContentBlockDelta) -> Vec<SseEvent> {
        self.ensure_capacity(index);
        match (&mut self.blocks[index], delta) {
            (Some(BlockKind::Text { item_id, text: accumulated }), ContentBlockDelta::TextDelta { text }) => {
                accumulated.push_str(&text);
                vec![named_event(&ResponsesStreamEvent::OutputTextDelta {
                    item_id: Some(item_id.clone()),
                    delta: text,
                })]
            }
            (Some(BlockKind::Tool { item_id, call_id, name, arguments }), ContentBlockDelta::InputJsonDelta { partial_json }) => {
                arguments.push_str(&partial_json);
                vec![named_event(&ResponsesStreamEvent::OutputToolCallDelta {
                    item_id: Some(item_id.clone()),
                    call_id: Some(call_id.clone()),
                    name: Some(name.clone()),
                    delta: partial_json,
                })]
            }
            _ => Vec::new(),
        }
    }

    fn close_block(&mut self, index: usize) -> Vec<SseEvent> {
        self.ensure_capacity(index);
        match self.blocks[index].take() {
            Some(BlockKind::Text { item_id, text }) => {
                self.completed.push(OutputItem::OutputText { text: text.clone() });
                vec![named_event(&ResponsesStreamEvent::OutputTextDone { item_id: Some(item_id), text })]
            }
            Some(BlockKind::Tool { item_id, call_id, name, arguments }) => {
                self.completed.push(OutputItem::FunctionCall {
                    id: Some(item_id.clone()),
                    call_id: call_id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                });
                vec![named_event(&ResponsesStreamEvent::OutputToolCallDone {
                    item_id: Some(item_id),
                    call_id,
                    name,
                    arguments,
                })]
            }
            None => Vec::new(),
        }
    }

    pub fn finalize(&mut self) -> Vec<SseEvent> {
        if self.finalized {
            return Vec::new();
        }
        self.finalized = true;
        let mut output = Vec::new();
        output.extend(self.completed.drain(..));

        let mut response = skeleton_response(&self.response_id, &self.model);
        response.output = output;
        response.usage = default_usage_from(&self.usage);
        vec![named_event(&ResponsesStreamEvent::Completed { response })]
    }

    /// Usage accumulated from the last `message_delta` seen so far.
    pub fn usage(&self) -> aicodeswitch_protocol::messages::Usage {
        self.usage.clone()
    }
}

impl Default for MessagesToResponsesStream {
    fn default() -> Self {
        Self::new()
    }
}

fn skeleton_response(id: &str, model: &str) -> CreateResponseResponse {
    CreateResponseResponse {
        id: id.to_string(),
        object: "response".to_string(),
        created_at: 0,
        model: model.to_string(),
        output: Vec::new(),
        usage: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_protocol::sse::SseEvent as Event;

    #[test]
    fn text_block_round_trips_into_output_text_delta_and_completed() {
        let mut stream = MessagesToResponsesStream::new();
        let created = stream.on_event(Event::json(serde_json::json!({
            "type": "message_start",
            "message": {"id": "msg_1", "type": "message", "role": "assistant", "content": [], "model": "claude-3-opus", "usage": {"input_tokens": 0, "output_tokens": 0}}
        })));
        assert_eq!(created.len(), 1);

        stream.on_event(Event::json(serde_json::json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {"type": "text", "text": ""}
        })));
        let delta = stream.on_event(Event::json(serde_json::json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": "hi"}
        })));
        assert_eq!(delta.len(), 1);

        stream.on_event(Event::json(serde_json::json!({"type": "content_block_stop", "index": 0})));

        let stopped = stream.on_event(Event::json(serde_json::json!({"type": "message_stop"})));
        assert_eq!(stopped.len(), 1);
        assert!(stream.finalize().is_empty());
    }
}
