//! Server-Sent Events (SSE) module

pub mod broadcaster;

pub use broadcaster::{to_sse_event, SseBroadcaster};
