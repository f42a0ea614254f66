//! Model Context Protocol dispatch over JSON-RPC 2.0
//!
//! `rpc` shapes envelopes and maps bridge errors onto JSON-RPC codes; `server` owns the
//! generated tool list and answers `initialize`, `ping`, `tools/list` and `tools/call`.

pub mod rpc;
pub mod server;
