//! Stateful SSE stream transformers, one per translation direction. Each
//! consumes one parsed [`aicodeswitch_protocol::sse::SseEvent`] at a time
//! and produces zero or more downstream events; `finalize` closes out
//! whatever state remains open and is safe to call more than once.

mod chat_to_messages;
mod chat_to_responses;
pub(crate) mod common;
mod messages_to_responses;
mod responses_to_messages;

pub use chat_to_messages::ChatToMessagesStream;
pub use chat_to_responses::ChatToResponsesStream;
pub use messages_to_responses::MessagesToResponsesStream;
pub use responses_to_messages::ResponsesToMessagesStream;
