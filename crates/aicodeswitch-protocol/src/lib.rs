//! Wire-format types for the three dialects this proxy translates between,
//! plus the SSE codec that frames the raw byte streams they travel over.
//! Neutral to transform and routing logic — see `aicodeswitch-transform`
//! and `aicodeswitch-core` for that.

pub mod chat;
pub mod messages;
pub mod responses;
pub mod sse;
