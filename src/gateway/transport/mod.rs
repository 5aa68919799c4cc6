//! Transport adapters
//!
//! Two ways requests reach the dispatcher:
//! - a line-framed pipe on stdin/stdout
//! - an HTTP push transport: SSE stream plus a POST request endpoint

pub mod sse;
pub mod stdio;

pub use sse::GatewayState;
