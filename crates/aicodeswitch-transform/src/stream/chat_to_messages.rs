//! Chat Completions SSE stream → Messages SSE stream.

use aicodeswitch_protocol::chat::CreateChatCompletionStreamResponse;
use aicodeswitch_protocol::messages::{
    ContentBlockDelta, ContentBlockStart, MessageDeltaFields, MessagesResponse, MessagesStreamEvent,
    Usage,
};
use aicodeswitch_protocol::sse::SseEvent;

use crate::payload::common::finish_reason_to_stop_reason;

use super::common::{event_json, is_done, named_event};

#[derive(Debug, Default)]
struct ToolBlock {
    block_index: usize,
    arguments: String,
}

/// Mirrors the upstream `choices[].delta` accumulation described for the
/// Chat→Messages stream: one text block, one thinking block, and a tool
/// block per `tool_calls[i]` index, each opened lazily on first use.
#[derive(Debug)]
pub struct ChatToMessagesStream {
    message_id: String,
    model: Option<String>,
    next_block_index: usize,
    text_block: Option<usize>,
    thinking_block: Option<usize>,
    tool_blocks: Vec<(usize, ToolBlock)>,
    stop_reason: Option<String>,
    usage: Usage,
    has_message_start: bool,
    finalized: bool,
}

impl ChatToMessagesStream {
    pub fn new() -> Self {
        Self {
            message_id: format!("msg_{}", uuid::Uuid::new_v4()),
            model: None,
            next_block_index: 0,
            text_block: None,
            thinking_block: None,
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
        let Ok(chunk) = serde_json::from_value::<CreateChatCompletionStreamResponse>(value.clone()) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        if !self.has_message_start {
            self.message_id = chunk.id.clone().unwrap_or_else(|| self.message_id.clone());
            self.model = chunk.model.clone();
            self.has_message_start = true;
            out.push(named_event(&MessagesStreamEvent::MessageStart {
                message: MessagesResponse::stub(
                    self.message_id.clone(),
                    self.model.clone().unwrap_or_else(|| "unknown".to_string()),
                ),
            }));
        }

        for choice in &chunk.choices {
            if let Some(text) = &choice.delta.content {
                if !text.is_empty() {
                    out.extend(self.push_text(text));
                }
            }
            if let Some(thinking) = &choice.delta.thinking {
                if let Some(content) = &thinking.content {
                    if !content.is_empty() {
                        out.extend(self.push_thinking(content));
                    }
                }
            }
            if let Some(tool_calls) = &choice.delta.tool_calls {
                for delta in tool_calls {
                    out.extend(self.push_tool_delta(delta));
                }
            }
            if let Some(finish_reason) = &choice.finish_reason {
                self.stop_reason = Some(finish_reason_to_stop_reason(finish_reason).to_string());
            }
        }
        if let Some(usage) = &chunk.usage {
            self.usage = Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                cache_creation_input_tokens: None,
                cache_read_input_tokens: Some(
                    usage.prompt_tokens_details.as_ref().map(|d| d.cached_tokens).unwrap_or(0),
                ),
            };
        }
        out
    }

    fn push_text(&mut self, text: &str) -> Vec<SseEvent> {
        let mut out = Vec::new();
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

    fn push_thinking(&mut self, text: &str) -> Vec<SseEvent> {
        let mut out = Vec::new();
        let index = match self.thinking_block {
            Some(index) => index,
            None => {
                let index = self.allocate_block();
                self.thinking_block = Some(index);
                out.push(named_event(&MessagesStreamEvent::ContentBlockStart {
                    index,
                    content_block: ContentBlockStart::Thinking { thinking: String::new() },
                }));
                index
            }
        };
        out.push(named_event(&MessagesStreamEvent::ContentBlockDelta {
            index,
            delta: ContentBlockDelta::ThinkingDelta { thinking: text.to_string() },
        }));
        out
    }

    fn push_tool_delta(
        &mut self,
        delta: &aicodeswitch_protocol::chat::ChatToolCallDelta,
    ) -> Vec<SseEvent> {
        let mut out = Vec::new();
        let existing = self.tool_blocks.iter().position(|(idx, _)| *idx == delta.index);
        let slot = match existing {
            Some(pos) => pos,
            None => {
                let Some(function) = &delta.function else { return out };
                let Some(name) = &function.name else { return out };
                let Some(id) = &delta.id else { return out };
                let block_index = self.allocate_block();
                out.push(named_event(&MessagesStreamEvent::ContentBlockStart {
                    index: block_index,
                    content_block: ContentBlockStart::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        input: serde_json::json!({}),
                    },
                }));
                self.tool_blocks.push((delta.index, ToolBlock { block_index, arguments: String::new() }));
                self.tool_blocks.len() - 1
            }
        };
        if let Some(function) = &delta.function {
            if let Some(fragment) = &function.arguments {
                let (_, block) = &mut self.tool_blocks[slot];
                block.arguments.push_str(fragment);
                out.push(named_event(&MessagesStreamEvent::ContentBlockDelta {
                    index: block.block_index,
                    delta: ContentBlockDelta::InputJsonDelta { partial_json: fragment.clone() },
                }));
            }
        }
        out
    }

    fn allocate_block(&mut self) -> usize {
        let index = self.next_block_index;
        self.next_block_index += 1;
        index
    }

    /// Closes every open block (tool blocks first, then thinking, then
    /// text) and emits the closing `message_delta`/`message_stop` pair.
    /// Idempotent: a second call returns no events.
    pub fn finalize(&mut self) -> Vec<SseEvent> {
        if self.finalized {
            return Vec::new();
        }
        self.finalized = true;
        let mut out = Vec::new();

        for (_, block) in self.tool_blocks.drain(..) {
            out.push(named_event(&MessagesStreamEvent::ContentBlockStop { index: block.block_index }));
        }
        if let Some(index) = self.thinking_block.take() {
            out.push(named_event(&MessagesStreamEvent::ContentBlockStop { index }));
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

    /// Usage accumulated from the last `choices[].usage` chunk seen so far.
    pub fn usage(&self) -> Usage {
        self.usage.clone()
    }
}

impl Default for ChatToMessagesStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_protocol::sse::SseEvent as Event;

    fn json_event(value: serde_json::Value) -> Event {
        Event::json(value)
    }

    #[test]
    fn emits_message_start_once_then_text_deltas_then_closes_on_done() {
        let mut stream = ChatToMessagesStream::new();
        let first = stream.on_event(json_event(serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4",
            "choices": [{"index": 0, "delta": {"content": "he"}}]
        })));
        assert!(matches!(first[0].data, aicodeswitch_protocol::sse::SseData::Json(_)));
        assert_eq!(first.len(), 3); // message_start, content_block_start, content_block_delta

        let second = stream.on_event(json_event(serde_json::json!({
            "choices": [{"index": 0, "delta": {"content": "llo"}, "finish_reason": "stop"}]
        })));
        assert_eq!(second.len(), 1);

        let closing = stream.on_event(Event::done());
        assert_eq!(closing.len(), 3); // content_block_stop, message_delta, message_stop

        assert!(stream.finalize().is_empty());
    }

    #[test]
    fn tool_call_fragments_accumulate_in_arrival_order() {
        let mut stream = ChatToMessagesStream::new();
        stream.on_event(json_event(serde_json::json!({
            "id": "chatcmpl-2",
            "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "id": "call_1", "function": {"name": "lookup", "arguments": ""}}]}}]
        })));
        let delta1 = stream.on_event(json_event(serde_json::json!({
            "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "{\"a\":"}}]}}]
        })));
        let delta2 = stream.on_event(json_event(serde_json::json!({
            "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "1}"}}]}}]
        })));
        assert_eq!(delta1.len(), 1);
        assert_eq!(delta2.len(), 1);
        let closing = stream.finalize();
        assert!(!closing.is_empty());
    }
}
