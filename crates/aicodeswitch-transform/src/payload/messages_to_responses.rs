//! Messages (Claude) ↔ Responses (OpenAI) non-streaming payloads.

use aicodeswitch_protocol::messages::{ContentBlock, Message, MessagesRequest, MessagesResponse, Role, Usage};
use aicodeswitch_protocol::responses::{
    CreateResponseRequest, CreateResponseResponse, InputContent, InputContentBlock, InputItem,
    OutputItem, ResponsesFunctionDef, ResponsesTool, ResponsesUsage,
};

use super::common::stringify_tool_input;

pub fn transform_request(request: &MessagesRequest) -> CreateResponseRequest {
    CreateResponseRequest {
        model: request.model.clone(),
        input: request.messages.iter().map(convert_message).collect(),
        instructions: request.system.as_ref().map(|system| system.as_flat_text()),
        max_output_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        tools: request.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|tool| ResponsesTool {
                    type_: "function".to_string(),
                    function: ResponsesFunctionDef {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: Some(tool.input_schema.clone()),
                    },
                })
                .collect()
        }),
        stream: request.stream,
        extra: request.extra.clone(),
    }
}

fn convert_message(message: &Message) -> InputItem {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let blocks = message
        .content
        .blocks()
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(InputContentBlock::InputText { text: text.clone() }),
            ContentBlock::Image { source } => Some(InputContentBlock::InputImage {
                image_url: match source {
                    aicodeswitch_protocol::messages::ImageSource::Base64 { media_type, data } => {
                        format!("data:{media_type};base64,{data}")
                    }
                    aicodeswitch_protocol::messages::ImageSource::Url { url } => url.clone(),
                },
            }),
            _ => None,
        })
        .collect::<Vec<_>>();
    InputItem { role: role.to_string(), content: InputContent::Blocks(blocks) }
}

/// Text blocks concatenate into one `output_text` item; `tool_use` blocks
/// become `tool_call` items. `input_tokens` is sent cache-inclusive
/// (`input_tokens + cache_read_input_tokens`) — preserve this quirk.
pub fn transform_response(response: &MessagesResponse) -> CreateResponseResponse {
    let mut output = Vec::new();
    let mut text = String::new();

    for block in &response.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::ToolUse { id, name, input } => {
                output.push(OutputItem::FunctionCall {
                    id: None,
                    call_id: id.clone(),
                    name: name.clone(),
                    arguments: stringify_tool_input(input),
                });
            }
            _ => {}
        }
    }

    if !text.is_empty() {
        output.insert(0, OutputItem::OutputText { text });
    }

    let cache_read = response.usage.cache_read_input_tokens.unwrap_or(0);

    CreateResponseResponse {
        id: response.id.clone(),
        object: "response".to_string(),
        created_at: 0,
        model: response.model.clone(),
        output,
        usage: ResponsesUsage {
            input_tokens: response.usage.input_tokens + cache_read,
            output_tokens: response.usage.output_tokens,
            total_tokens: None,
            input_tokens_details: None,
            prompt_tokens_details: None,
        },
    }
}

pub fn default_usage_from(usage: &Usage) -> ResponsesUsage {
    let cache_read = usage.cache_read_input_tokens.unwrap_or(0);
    ResponsesUsage {
        input_tokens: usage.input_tokens + cache_read,
        output_tokens: usage.output_tokens,
        total_tokens: None,
        input_tokens_details: None,
        prompt_tokens_details: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_protocol::messages::{ContentBlock, Role};

    #[test]
    fn cache_read_tokens_are_folded_into_input_tokens() {
        let mut response = MessagesResponse::stub("msg-1".to_string(), "claude-3-opus".to_string());
        response.role = Role::Assistant;
        response.content = vec![ContentBlock::Text { text: "hi".to_string() }];
        response.usage.input_tokens = 10;
        response.usage.cache_read_input_tokens = Some(4);

        let out = transform_response(&response);
        assert_eq!(out.usage.input_tokens, 14);
    }
}
