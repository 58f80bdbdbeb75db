//! Chat Completions response → Messages (Claude) response.

use aicodeswitch_protocol::chat::{ChatContent, CreateChatCompletionResponse};
use aicodeswitch_protocol::messages::{ContentBlock, MessagesResponse, Usage};

use super::common::{finish_reason_to_stop_reason, parse_tool_arguments};

pub fn transform_response(response: &CreateChatCompletionResponse, model: &str) -> MessagesResponse {
    let mut out = MessagesResponse::stub(response.id.clone(), model.to_string());

    let Some(choice) = response.choices.first() else {
        return out;
    };

    if let Some(content) = &choice.message.content {
        let text = content.as_flat_text();
        if !text.is_empty() || content_is_explicitly_text(content) {
            out.content.push(ContentBlock::Text { text });
        }
    }

    if let Some(tool_calls) = &choice.message.tool_calls {
        for call in tool_calls {
            out.content.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: parse_tool_arguments(&call.function.arguments),
            });
        }
    }

    out.stop_reason = choice.finish_reason.as_deref().map(finish_reason_to_stop_reason).map(str::to_string);

    if let Some(usage) = &response.usage {
        out.usage = Usage {
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

fn content_is_explicitly_text(content: &ChatContent) -> bool {
    matches!(content, ChatContent::Text(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicodeswitch_protocol::chat::{ChatMessage, ChatUsage, Choice};

    #[test]
    fn maps_finish_reason_and_usage() {
        let response = CreateChatCompletionResponse {
            id: "chatcmpl-1".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: Some(ChatContent::Text("hello".to_string())),
                    ..Default::default()
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(ChatUsage { prompt_tokens: 5, completion_tokens: 2, total_tokens: 7, prompt_tokens_details: None }),
        };

        let messages = transform_response(&response, "claude-3-opus");
        assert_eq!(messages.content, vec![ContentBlock::Text { text: "hello".to_string() }]);
        assert_eq!(messages.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(messages.usage.input_tokens, 5);
        assert_eq!(messages.usage.output_tokens, 2);
        assert_eq!(messages.usage.cache_read_input_tokens, Some(0));
    }
}
