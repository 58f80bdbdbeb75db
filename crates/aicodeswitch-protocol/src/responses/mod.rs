//! Responses dialect (OpenAI Responses shape): `input[]`/`instructions` on
//! the request, `output[]` items (`message`, `output_text`, `tool_call`) on
//! the response, `response.*`-named streaming events.

pub mod stream;
pub mod types;

pub use stream::*;
pub use types::*;
