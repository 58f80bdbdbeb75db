//! Messages dialect (Claude Messages API shape): requests, responses and
//! the streaming event protocol (`message_start` / `content_block_*` /
//! `message_delta` / `message_stop`).

pub mod stream;
pub mod types;

pub use stream::*;
pub use types::*;
