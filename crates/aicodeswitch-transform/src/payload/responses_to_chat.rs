//! Responses (OpenAI) request → Chat Completions request.
//!
//! Used when a Codex client targets a Chat-only upstream.

use aicodeswitch_protocol::chat::{ChatContent, ChatMessage, CreateChatCompletionRequest};
use aicodeswitch_protocol::responses::CreateResponseRequest;

pub fn transform_request(request: &CreateResponseRequest) -> CreateChatCompletionRequest {
    let mut messages = Vec::new();

    if let Some(instructions) = &request.instructions {
        if !instructions.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(ChatContent::Text(instructions.clone())),
                ..Default::default()
            });
        }
    }

    for item in &request.input {
        messages.push(ChatMessage {
            role: item.role.clone(),
            content: Some(ChatContent::Text(item.content.as_flat_text())),
            ..Default::default()
        });
    }

    CreateChatCompletionRequest {
        model: request.model.clone(),
        messages,
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_output_tokens,
        stream: request.stream,
        extra: request.extra.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_protocol::responses::{InputContent, InputItem};

    #[test]
    fn prepends_instructions_as_system_message() {
        let request = CreateResponseRequest {
            model: "gpt-4".to_string(),
            input: vec![InputItem { role: "user".to_string(), content: InputContent::Text("hi".to_string()) }],
            instructions: Some("be terse".to_string()),
            max_output_tokens: Some(100),
            ..Default::default()
        };

        let chat = transform_request(&request);
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, "system");
        assert_eq!(chat.max_tokens, Some(100));
    }
}
