//! Translates requests, responses, and SSE event streams between the
//! Messages, Chat Completions, and Responses wire dialects. Payload
//! transforms are pure functions (`payload`); stream transforms are
//! stateful, one event in and zero-or-more events out (`stream`).

pub mod payload;
pub mod stream;
