//! Responses (OpenAI) request/response → Messages (Claude) request/response.
//!
//! Used when a Codex client targets a Claude-family upstream.

use aicodeswitch_protocol::messages::{ContentBlock, Message, MessageContent, MessagesRequest, MessagesResponse, Role, Usage};
use aicodeswitch_protocol::responses::{CreateResponseRequest, CreateResponseResponse, OutputItem};

use super::common::parse_tool_arguments;

pub fn transform_request(request: &CreateResponseRequest) -> MessagesRequest {
    let mut messages = Vec::new();

    for item in &request.input {
        let role = if item.role == "assistant" { Role::Assistant } else { Role::User };
        messages.push(Message { role, content: MessageContent::Text(item.content.as_flat_text()) });
    }

    MessagesRequest {
        model: request.model.clone(),
        messages,
        system: request.instructions.clone().filter(|s| !s.is_empty()).map(MessageContent::Text),
        max_tokens: request.max_output_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        stream: request.stream,
        extra: request.extra.clone(),
        ..Default::default()
    }
}

pub fn transform_response(response: &CreateResponseResponse) -> MessagesResponse {
    let mut out = MessagesResponse::stub(response.id.clone(), response.model.clone());

    for item in &response.output {
        match item {
            OutputItem::Message { content, .. } => {
                for block in content {
                    if let Some(text) = block.flat_text() {
                        out.content.push(ContentBlock::Text { text });
                    }
                }
            }
            OutputItem::OutputText { text } => out.content.push(ContentBlock::Text { text: text.clone() }),
            OutputItem::FunctionCall { call_id, name, arguments, .. } => {
                out.content.push(ContentBlock::ToolUse {
                    id: call_id.clone(),
                    name: name.clone(),
                    input: parse_tool_arguments(arguments),
                });
            }
            OutputItem::Unknown => {}
        }
    }

    let cache_read = response
        .usage
        .input_tokens_details
        .as_ref()
        .map(|d| d.cached_tokens)
        .or_else(|| response.usage.prompt_tokens_details.as_ref().map(|d| d.cached_tokens))
        .unwrap_or(0);

    out.usage = Usage {
        input_tokens: response.usage.input_tokens,
        output_tokens: response.usage.output_tokens,
        cache_creation_input_tokens: None,
        cache_read_input_tokens: Some(cache_read),
    };

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_protocol::responses::{InputTokensDetails, ResponsesUsage};

    #[test]
    fn walks_output_items_in_order() {
        let response = CreateResponseResponse {
            id: "resp-1".to_string(),
            object: "response".to_string(),
            created_at: 0,
            model: "gpt-4".to_string(),
            output: vec![
                OutputItem::OutputText { text: "hello".to_string() },
                OutputItem::FunctionCall {
                    id: None,
                    call_id: "call-1".to_string(),
                    name: "lookup".to_string(),
                    arguments: "{\"q\":1}".to_string(),
                },
            ],
            usage: ResponsesUsage {
                input_tokens: 10,
                output_tokens: 3,
                total_tokens: None,
                input_tokens_details: Some(InputTokensDetails { cached_tokens: 2 }),
                prompt_tokens_details: None,
            },
        };

        let messages = transform_response(&response);
        assert_eq!(messages.content.len(), 2);
        assert_eq!(messages.usage.cache_read_input_tokens, Some(2));
    }

    #[test]
    fn instructions_become_a_system_field() {
        use aicodeswitch_protocol::responses::{InputContent, InputItem};

        let request = CreateResponseRequest {
            model: "claude-3".to_string(),
            input: vec![InputItem { role: "user".to_string(), content: InputContent::Text("hi".to_string()) }],
            instructions: Some("be terse".to_string()),
            ..Default::default()
        };

        let messages = transform_request(&request);
        assert_eq!(messages.messages.len(), 1);
        assert_eq!(messages.system, Some(MessageContent::Text("be terse".to_string())));
    }
}
