//! The proxy engine: classification, rule resolution, upstream dispatch,
//! request/response translation and log recording, wired together behind
//! an axum router. See `aicodeswitch-protocol` for wire types and
//! `aicodeswitch-transform` for the payload/stream transforms this crate
//! orchestrates.

pub mod auth;
pub mod classify;
pub mod engine;
pub mod error;
pub mod handler;
pub mod log;
pub mod resolve;
pub mod upstream;

pub use engine::ProxyEngine;
pub use error::ProxyError;
pub use handler::router;
