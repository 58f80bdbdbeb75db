//! Responses SSE stream → Messages SSE stream.

use aicodeswitch_protocol::messages::{
    ContentBlockDelta, ContentBlockStart, MessageDeltaFields, MessagesResponse, MessagesStreamEvent,
    Usage,
};
use aicodeswitch_protocol::responses::ResponsesStreamEvent;
use aicodeswitch_protocol::sse::SseEvent;

use super::common::{event_json, is_done, named_event};

#[derive(Debug)]
struct ToolBlock {
    key: String,
    block_index: usize,
}

/// Keyed by event-name substrings as on the wire (`response.created`,
/// `*.output_text.*`, `*.output_tool_call.*`, `response.completed`). One
/// text block, any number of tool blocks, closed on the matching `*.done`.
#[derive(Debug)]
pub struct ResponsesToMessagesStream {
    message_id: String,
    model: String,
    next_block_index: usize,
    text_block: Option<usize>,
    tool_blocks: Vec<ToolBlock>,
    stop_reason: Option<String>,
    usage: Usage,
    has_message_start: bool,
    finalized: bool,
}

impl ResponsesToMessagesStream {
    pub fn new() -> Self {
        Self {
            message_id: format!("msg_{}", uuid::Uuid::new_v4()),
            model: "unknown".to_string(),
            next_block_index: 0,
            text_block: None,
            tool_blocks: Vec::new(),
            stop_reason: None,
            usage: Usage::default(),
            has_message_start: false,
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
        let Ok(parsed) = serde_json::from_value::<ResponsesStreamEvent>(value.clone()) else {
            return Vec::new();
        };

        match parsed {
            ResponsesStreamEvent::Created { response } => {
                self.message_id = response.id;
                self.model = response.model;
                self.has_message_start = true;
                vec![named_event(&MessagesStreamEvent::MessageStart {
                    message: MessagesResponse::stub(self.message_id.clone(), self.model.clone()),
                })]
            }
            ResponsesStreamEvent::OutputTextDelta { delta, .. } => self.push_text(&delta),
            ResponsesStreamEvent::OutputTextDone { .. } => self.close_text(),
            ResponsesStreamEvent::OutputToolCallDelta { item_id, call_id, name, delta } => {
                self.push_tool_delta(item_id, call_id, name, &delta)
            }
            ResponsesStreamEvent::OutputToolCallDone { call_id, .. } => self.close_tool(&call_id),
            ResponsesStreamEvent::Completed { response } => {
                let cache_read = response
                    .usage
                    .input_tokens_details
                    .as_ref()
                    .map(|d| d.cached_tokens)
                    .unwrap_or(0);
                self.usage = Usage {
                    input_tokens: response.usage.input_tokens,
                    output_tokens: response.usage.output_tokens,
                    cache_creation_input_tokens: None,
                    cache_read_input_tokens: Some(cache_read),
                };
                self.finalize()
            }
        }
    }

    fn ensure_message_start(&mut self, out: &mut Vec<SseEvent>) {
        if !self.has_message_start {
            self.has_message_start = true;
            out.push(named_event(&MessagesStreamEvent::MessageStart {
                message: MessagesResponse::stub(self.message_id.clone(), self.model.clone()),
            }));
        }
    }

    fn push_text(&mut self, text: &str) -> Vec<SseEvent> {
        let mut out = Vec::new();
        self.ensure_message_start(&mut out);
        let index = match self.text_block {
            Some(index) => index,
            None => {
                let index = self.allocate_block();
                self.text_block = Some(index);
                out.push(named_event(&MessagesStreamEvent::ContentBlockStart {
                    index,
                    content_block: ContentBlockStart::Text { text: String::new() },
                }));
                index
            }
        };
        out.push(named_event(&MessagesStreamEvent::ContentBlockDelta {
            index,
            delta: ContentBlockDelta::TextDelta { text: text.to_string() },
        }));
        out
    }

    fn close_text(&mut self) -> Vec<SseEvent> {
        match self.text_block.take() {
            Some(index) => vec![named_event(&MessagesStreamEvent::ContentBlockStop { index })],
            None => Vec::new(),
        }
    }

    fn push_tool_delta(
        &mut self,
        item_id: Option<String>,
        call_id: Option<String>,
        name: Option<String>,
        delta: &str,
    ) -> Vec<SseEvent> {
        let mut out = Vec::new();
        self.ensure_message_start(&mut out);
        let key = call_id.clone().or(item_id).unwrap_or_default();
        let existing = self.tool_blocks.iter().position(|block| block.key == key);
        let block_index = match existing {
            Some(pos) => self.tool_blocks[pos].block_index,
            None => {
                let block_index = self.allocate_block();
                out.push(named_event(&MessagesStreamEvent::ContentBlockStart {
                    index: block_index,
                    content_block: ContentBlockStart::ToolUse {
                        id: call_id.unwrap_or_else(|| key.clone()),
                        name: name.unwrap_or_default(),
                        input: serde_json::json!({}),
                    },
                }));
                self.tool_blocks.push(ToolBlock { key: key.clone(), block_index });
                block_index
            }
        };
        out.push(named_event(&MessagesStreamEvent::ContentBlockDelta {
            index: block_index,
            delta: ContentBlockDelta::InputJsonDelta { partial_json: delta.to_string() },
        }));
        out
    }

    fn close_tool(&mut self, call_id: &str) -> Vec<SseEvent> {
        if let Some(pos) = self.tool_blocks.iter().position(|block| block.key == call_id) {
            let block = self.tool_blocks.remove(pos);
            return vec![named_event(&MessagesStreamEvent::ContentBlockStop { index: block.block_index })];
        }
        Vec::new()
    }

    fn allocate_block(&mut self) -> usize {
        let index = self.next_block_index;
        self.next_block_index += 1;
        index
    }

    pub fn finalize(&mut self) -> Vec<SseEvent> {
        if self.finalized {
            return Vec::new();
        }
        self.finalized = true;
        let mut out = Vec::new();
        for block in self.tool_blocks.drain(..) {
            out.push(named_event(&MessagesStreamEvent::ContentBlockStop { index: block.block_index }));
        }
        if let Some(index) = self.text_block.take() {
            out.push(named_event(&MessagesStreamEvent::ContentBlockStop { index }));
        }
        out.push(named_event(&MessagesStreamEvent::MessageDelta {
            delta: MessageDeltaFields {
                stop_reason: Some(self.stop_reason.clone().unwrap_or_else(|| "end_turn".to_string())),
                stop_sequence: None,
            },
            usage: self.usage.clone(),
        }));
        out.push(named_event(&MessagesStreamEvent::MessageStop));
        out
    }

    /// Usage taken from the `response.completed` event, if seen yet.
    pub fn usage(&self) -> Usage {
        self.usage.clone()
    }
}

impl Default for ResponsesToMessagesStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_protocol::sse::SseEvent as Event;

    #[test]
    fn text_delta_then_done_then_completed_closes_cleanly() {
        let mut stream = ResponsesToMessagesStream::new();
        let created = stream.on_event(Event::json(serde_json::json!({
            "type": "response.created",
            "response": {"id": "resp_1", "object": "response", "created_at": 0, "model": "gpt-4", "output": [], "usage": {"input_tokens": 0, "output_tokens": 0}}
        })));
        assert_eq!(created.len(), 1);

        let delta = stream.on_event(Event::json(serde_json::json!({
            "type": "response.output_text.delta",
            "delta": "hi"
        })));
        assert_eq!(delta.len(), 2);

        let done = stream.on_event(Event::json(serde_json::json!({"type": "response.output_text.done", "text": "hi"})));
        assert_eq!(done.len(), 1);

        let completed = stream.on_event(Event::json(serde_json::json!({
            "type": "response.completed",
            "response": {"id": "resp_1", "object": "response", "created_at": 0, "model": "gpt-4", "output": [], "usage": {"input_tokens": 5, "output_tokens": 2}}
        })));
        assert_eq!(completed.len(), 2); // message_delta, message_stop (text already closed)
        assert!(stream.finalize().is_empty());
    }
}
