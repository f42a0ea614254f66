//! HTTP transports for the Model Context Protocol
//!
//! Request/response routing under `/mcp`, the event-stream pair under `/sse`, and the
//! shared health and discovery endpoints.

pub mod handlers;
pub mod sse;
