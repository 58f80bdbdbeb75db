use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vendor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    ClaudeChat,
    ClaudeCode,
    OpenaiChat,
    OpenaiCode,
    OpenaiResponses,
    DeepseekChat,
}

impl SourceType {
    pub fn is_claude_family(self) -> bool {
        matches!(self, SourceType::ClaudeChat | SourceType::ClaudeCode)
    }

    pub fn is_openai_chat_family(self) -> bool {
        matches!(
            self,
            SourceType::OpenaiChat | SourceType::OpenaiCode | SourceType::DeepseekChat
        )
    }

    pub fn is_openai_responses(self) -> bool {
        matches!(self, SourceType::OpenaiResponses)
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiService {
    pub id: String,
    pub vendor_id: String,
    pub name: String,
    pub api_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub source_type: SourceType,
    #[serde(default)]
    pub supported_models: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TargetType {
    ClaudeCode,
    Codex,
}

impl TargetType {
    pub fn as_path_prefix(self) -> &'static str {
        match self {
            TargetType::ClaudeCode => "claude-code",
            TargetType::Codex => "codex",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub id: String,
    pub name: String,
    pub target_type: TargetType,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    Default,
    Background,
    Thinking,
    LongContext,
    ImageUnderstanding,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub route_id: String,
    pub content_type: ContentType,
    pub target_service_id: String,
    #[serde(default)]
    pub target_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub enable_logging: bool,
    pub log_retention_days: u32,
    pub max_log_size: u64,
    /// Client-facing bearer token. Empty disables client auth.
    pub api_key: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enable_logging: true,
            log_retention_days: 30,
            max_log_size: 10_000,
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLog {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub method: String,
    pub path: String,
    pub request_headers: BTreeMap<String, String>,
    pub request_body: String,
    pub status_code: u16,
    pub response_time_ms: u64,
    pub target_provider: String,
    pub target_type: TargetType,
    pub target_service_id: String,
    pub target_service_name: String,
    pub target_model: Option<String>,
    pub vendor_id: String,
    pub vendor_name: String,
    pub request_model: Option<String>,
    pub response_headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default)]
    pub stream_chunks: Vec<String>,
    pub usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub type AccessLogId = uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLog {
    pub id: AccessLogId,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AccessLogPatch {
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLog {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<String>,
}
