//! Bridge domain: endpoint descriptors, tool schemas, middleware and the invocation pipeline
//!
//! Nothing in this module knows about transports; it turns descriptors into tools and
//! tool calls into backend requests.

pub mod context;
pub mod endpoint;
pub mod middleware;
pub mod path;
pub mod pipeline;
pub mod schema;
