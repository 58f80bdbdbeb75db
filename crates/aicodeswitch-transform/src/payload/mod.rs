//! Pure, referentially transparent payload transforms between the three
//! wire dialects. Errors never happen: missing fields map to null/absent,
//! unknown content is dropped except tool-shaped entries, which round-trip
//! best-effort.

pub mod chat_to_messages;
pub mod chat_to_responses;
pub(crate) mod common;
pub mod messages_to_chat;
pub mod messages_to_responses;
pub mod responses_to_chat;
pub mod responses_to_messages;
