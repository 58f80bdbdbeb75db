//! Messages (Claude) request → Chat Completions request.

use aicodeswitch_protocol::chat::{
    ChatContent, ChatContentPart, ChatFunctionCall, ChatFunctionDef, ChatImageUrl, ChatMessage,
    ChatTool, CreateChatCompletionRequest, StreamOptions, ToolChoice as ChatToolChoice,
    ToolChoiceFunction,
};
use aicodeswitch_protocol::messages::{
    ContentBlock, ImageSource, Message, MessageContent, MessagesRequest, Role, Tool,
    ToolChoice as MessagesToolChoice,
};

use super::common::stringify_tool_input;

/// `deepseek-chat` upstreams want `system` folded into a `developer`
/// message instead of `system` (spec quirk, preserved verbatim).
pub fn transform_request(request: &MessagesRequest, is_deepseek: bool) -> CreateChatCompletionRequest {
    let mut messages = Vec::new();

    if let Some(system) = &request.system {
        messages.push(ChatMessage {
            role: if is_deepseek { "developer" } else { "system" }.to_string(),
            content: Some(ChatContent::Text(system.as_flat_text())),
            ..Default::default()
        });
    }

    for message in &request.messages {
        messages.extend(convert_message(message));
    }

    CreateChatCompletionRequest {
        model: request.model.clone(),
        messages,
        temperature: request.temperature,
        top_p: request.top_p,
        stop: request.stop_sequences.clone(),
        max_tokens: request.max_tokens,
        tools: request.tools.as_ref().map(|tools| tools.iter().map(convert_tool).collect()),
        tool_choice: request.tool_choice.as_ref().map(convert_tool_choice),
        stream: request.stream,
        stream_options: request.stream.filter(|&s| s).map(|_| StreamOptions { include_usage: true }),
        extra: request.extra.clone(),
    }
}

fn convert_message(message: &Message) -> Vec<ChatMessage> {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };

    let blocks = message.content.blocks();
    let mut tool_results = Vec::new();
    let mut tool_calls = Vec::new();
    let mut text_parts = Vec::new();
    let mut image_parts = Vec::new();

    for block in &blocks {
        match block {
            ContentBlock::Text { text } => text_parts.push(text.clone()),
            ContentBlock::Image { source } => image_parts.push(image_url_for(source)),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(aicodeswitch_protocol::chat::ChatToolCall {
                id: id.clone(),
                type_: "function".to_string(),
                function: ChatFunctionCall {
                    name: name.clone(),
                    arguments: stringify_tool_input(input),
                },
            }),
            ContentBlock::ToolResult { tool_use_id, content, .. } => {
                let text = content.as_ref().map(MessageContent::as_flat_text).unwrap_or_default();
                tool_results.push(ChatMessage {
                    role: "tool".to_string(),
                    content: Some(ChatContent::Text(text)),
                    tool_call_id: Some(tool_use_id.clone()),
                    ..Default::default()
                });
            }
            ContentBlock::Thinking { .. } | ContentBlock::Unknown => {}
        }
    }

    let mut out = Vec::new();
    if !tool_calls.is_empty() {
        out.push(ChatMessage {
            role: role.to_string(),
            content: if text_parts.is_empty() { None } else { Some(ChatContent::Text(text_parts.join(""))) },
            tool_calls: Some(tool_calls),
            ..Default::default()
        });
    } else if !image_parts.is_empty() {
        let mut parts: Vec<ChatContentPart> = text_parts
            .iter()
            .map(|text| ChatContentPart::Text { text: text.clone() })
            .collect();
        parts.extend(image_parts.into_iter().map(|url| ChatContentPart::ImageUrl { image_url: ChatImageUrl { url } }));
        out.push(ChatMessage {
            role: role.to_string(),
            content: Some(ChatContent::Parts(parts)),
            ..Default::default()
        });
    } else {
        out.push(ChatMessage {
            role: role.to_string(),
            content: Some(ChatContent::Text(text_parts.join(""))),
            ..Default::default()
        });
    }
    out.extend(tool_results);
    out
}

fn image_url_for(source: &ImageSource) -> String {
    match source {
        ImageSource::Base64 { media_type, data } => format!("data:{media_type};base64,{data}"),
        ImageSource::Url { url } => url.clone(),
    }
}

fn convert_tool(tool: &Tool) -> ChatTool {
    ChatTool {
        type_: "function".to_string(),
        function: ChatFunctionDef {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: Some(tool.input_schema.clone()),
        },
    }
}

fn convert_tool_choice(choice: &MessagesToolChoice) -> ChatToolChoice {
    match choice {
        MessagesToolChoice::Auto => ChatToolChoice::Mode("auto".to_string()),
        MessagesToolChoice::Any => ChatToolChoice::Mode("required".to_string()),
        MessagesToolChoice::Tool { name } => ChatToolChoice::Function {
            type_: "function".to_string(),
            function: ToolChoiceFunction { name: name.clone() },
        },
    }
}
