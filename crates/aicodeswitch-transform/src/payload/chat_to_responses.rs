//! Chat Completions response → Responses response, chained through Messages.
//!
//! Not a direct mapping: first apply `chat_to_messages::response`, then
//! `messages_to_responses::response`, per the chaining rule that also
//! governs the streaming composition in `stream::ChatToResponsesStream`.

use aicodeswitch_protocol::chat::CreateChatCompletionResponse;
use aicodeswitch_protocol::responses::CreateResponseResponse;

use super::{chat_to_messages, messages_to_responses};

pub fn transform_response(response: &CreateChatCompletionResponse, model: &str) -> CreateResponseResponse {
    let intermediate = chat_to_messages::transform_response(response, model);
    messages_to_responses::transform_response(&intermediate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_protocol::chat::{ChatContent, ChatMessage, ChatUsage, Choice};

    #[test]
    fn chains_through_messages() {
        let response = CreateChatCompletionResponse {
            id: "chatcmpl-1".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: Some(ChatContent::Text("hi".to_string())),
                    ..Default::default()
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(ChatUsage { prompt_tokens: 3, completion_tokens: 1, total_tokens: 4, prompt_tokens_details: None }),
        };

        let out = transform_response(&response, "gpt-4");
        assert_eq!(out.usage.input_tokens, 3);
        assert_eq!(out.output.len(), 1);
    }
}
