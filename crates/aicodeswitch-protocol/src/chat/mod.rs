//! Chat-Completions dialect (OpenAI Chat shape): `messages[]` of flat
//! string/part content, `tool_calls` on assistant messages, streaming
//! `choices[].delta` frames terminated by the literal `[DONE]` sentinel.

pub mod stream;
pub mod types;

pub use stream::*;
pub use types::*;
