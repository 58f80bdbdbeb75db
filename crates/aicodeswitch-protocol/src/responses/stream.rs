use serde::{Deserialize, Serialize};

use super::types::CreateResponseResponse;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    #[serde(rename = "response.created")]
    Created { response: CreateResponseResponse },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        delta: String,
    },
    #[serde(rename = "response.output_text.done")]
    OutputTextDone {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        text: String,
    },
    #[serde(rename = "response.output_tool_call.delta")]
    OutputToolCallDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        delta: String,
    },
    #[serde(rename = "response.output_tool_call.done")]
    OutputToolCallDone {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        call_id: String,
        name: String,
        arguments: String,
    },
    #[serde(rename = "response.completed")]
    Completed { response: CreateResponseResponse },
}
