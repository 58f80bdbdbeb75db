//! Chat Completions SSE stream → Responses SSE stream, composed.
//!
//! The intermediate Messages-dialect events are produced in-process and
//! never observed externally — only the final Responses events leave this
//! type.

use aicodeswitch_protocol::sse::SseEvent;

use super::chat_to_messages::ChatToMessagesStream;
use super::messages_to_responses::MessagesToResponsesStream;

pub struct ChatToResponsesStream {
    chat_to_messages: ChatToMessagesStream,
    messages_to_responses: MessagesToResponsesStream,
}

impl ChatToResponsesStream {
    pub fn new() -> Self {
        Self {
            chat_to_messages: ChatToMessagesStream::new(),
            messages_to_responses: MessagesToResponsesStream::new(),
        }
    }

    pub fn on_event(&mut self, event: SseEvent) -> Vec<SseEvent> {
        self.chat_to_messages
            .on_event(event)
            .into_iter()
            .flat_map(|intermediate| self.messages_to_responses.on_event(intermediate))
            .collect()
    }

    pub fn finalize(&mut self) -> Vec<SseEvent> {
        let intermediate = self.chat_to_messages.finalize();
        let mut out: Vec<SseEvent> = intermediate
            .into_iter()
            .flat_map(|event| self.messages_to_responses.on_event(event))
            .collect();
        out.extend(self.messages_to_responses.finalize());
        out
    }

    /// Usage flows through the intermediate Messages stream, so the
    /// terminal Responses stage is the one holding it.
    pub fn usage(&self) -> aicodeswitch_protocol::messages::Usage {
        self.messages_to_responses.usage()
    }
}

impl Default for ChatToResponsesStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_protocol::sse::SseEvent as Event;

    #[test]
    fn chat_chunks_come_out_as_responses_events() {
        let mut stream = ChatToResponsesStream::new();
        let created = stream.on_event(Event::json(serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4",
            "choices": [{"index": 0, "delta": {"content": "hi"}}]
        })));
        assert!(!created.is_empty());
        let closing = stream.finalize();
        assert!(!closing.is_empty());
        assert!(stream.finalize().is_empty());
    }
}
