use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContentBlock {
    InputText { text: String },
    InputImage { image_url: String },
    OutputText { text: String },
    #[serde(other)]
    Unknown,
}

impl InputContentBlock {
    pub fn flat_text(&self) -> Option<String> {
        match self {
            InputContentBlock::InputText { text } | InputContentBlock::OutputText { text } => {
                Some(text.clone())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum InputContent {
    Text(String),
    Blocks(Vec<InputContentBlock>),
}

impl InputContent {
    pub fn as_flat_text(&self) -> String {
        match self {
            InputContent::Text(text) => text.clone(),
            InputContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(InputContentBlock::flat_text)
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    pub fn blocks(&self) -> Vec<InputContentBlock> {
        match self {
            InputContent::Text(text) => vec![InputContentBlock::InputText { text: text.clone() }],
            InputContent::Blocks(blocks) => blocks.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputItem {
    pub role: String,
    pub content: InputContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponsesFunctionDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponsesTool {
    #[serde(rename = "type")]
    pub type_: String,
    pub function: ResponsesFunctionDef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateResponseRequest {
    pub model: String,
    #[serde(default)]
    pub input: Vec<InputItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponsesTool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One item of `output[]`. Modeled as an internally-tagged enum per the
/// "tagged variants with a fall-through opaque case" approach: unknown
/// `type` values round-trip through `Unknown` rather than failing to parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        role: String,
        content: Vec<InputContentBlock>,
    },
    #[serde(rename = "output_text")]
    OutputText { text: String },
    #[serde(alias = "tool_call")]
    FunctionCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        call_id: String,
        name: String,
        arguments: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InputTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens_details: Option<InputTokensDetails>,
    /// Some upstreams nest cache counts under the Chat-style field name
    /// instead; both are checked when extracting usage (§4.2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<crate::chat::PromptTokensDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateResponseResponse {
    pub id: String,
    #[serde(default = "default_object")]
    pub object: String,
    #[serde(default)]
    pub created_at: i64,
    pub model: String,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    pub usage: ResponsesUsage,
}

fn default_object() -> String {
    "response".to_string()
}
