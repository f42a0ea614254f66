//! Per-call invocation state
//!
//! Caller arguments are resolved exactly once into typed path/query/header/body fields.
//! Middleware and the backend client consume the resolved request, never the raw map.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{
    endpoint::{EndpointDescriptor, HttpMethod},
    path::{placeholder_names, substitute},
};

pub const BODY_ARGUMENT: &str = "body";
pub const HEADERS_ARGUMENT: &str = "headers";

/// One caller argument after it has been bound to a request location.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundArgument {
    Path { name: String, value: String },
    Query { name: String, value: Value },
    Header { name: String, value: String },
    Body(Value),
}

pub fn bind_arguments(path_template: &str, arguments: &Map<String, Value>) -> Vec<BoundArgument> {
    let placeholders = placeholder_names(path_template);
    let mut bound = Vec::with_capacity(arguments.len());

    for (name, value) in arguments {
        if placeholders.iter().any(|placeholder| placeholder == name) {
            bound.push(BoundArgument::Path {
                name: name.clone(),
                value: value_to_string(value),
            });
            continue;
        }

        match name.as_str() {
            BODY_ARGUMENT => bound.push(BoundArgument::Body(value.clone())),
            HEADERS_ARGUMENT => {
                if let Value::Object(headers) = value {
                    bound.extend(headers.iter().map(|(header, header_value)| {
                        BoundArgument::Header {
                            name: header.clone(),
                            value: value_to_string(header_value),
                        }
                    }));
                }
            }
            _ => bound.push(BoundArgument::Query {
                name: name.clone(),
                value: value.clone(),
            }),
        }
    }

    bound
}

/// Request that will be sent to the backend, before the base URL is applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub path_template: String,
    pub path_params: BTreeMap<String, String>,
    pub query: BTreeMap<String, Value>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl OutboundRequest {
    pub fn from_arguments(endpoint: &EndpointDescriptor, arguments: &Map<String, Value>) -> Self {
        let mut request = Self {
            method: endpoint.method,
            path_template: endpoint.path.clone(),
            path_params: BTreeMap::new(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
        };

        for argument in bind_arguments(&endpoint.path, arguments) {
            match argument {
                BoundArgument::Path { name, value } => {
                    request.path_params.insert(name, value);
                }
                BoundArgument::Query { name, value } => {
                    request.query.insert(name, value);
                }
                BoundArgument::Header { name, value } => {
                    request.headers.insert(name, value);
                }
                BoundArgument::Body(body) => request.body = Some(body),
            }
        }

        request
    }

    /// Path with every matched placeholder replaced by its value.
    pub fn resolved_path(&self) -> String {
        substitute(&self.path_template, &self.path_params)
    }

    /// Flattened query pairs; arrays become repeated keys.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (name, value) in &self.query {
            match value {
                Value::Null => {}
                Value::Array(items) => pairs.extend(
                    items
                        .iter()
                        .map(|item| (name.clone(), value_to_string(item))),
                ),
                other => pairs.push((name.clone(), value_to_string(other))),
            }
        }
        pairs
    }
}

#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub endpoint: Arc<EndpointDescriptor>,
    pub request: OutboundRequest,
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub identity: Option<Value>,
    pub metadata: Map<String, Value>,
}

impl InvocationContext {
    pub fn new(endpoint: Arc<EndpointDescriptor>, arguments: &Map<String, Value>) -> Self {
        let request = OutboundRequest::from_arguments(&endpoint, arguments);
        Self {
            endpoint,
            request,
            timestamp: Utc::now(),
            request_id: Uuid::new_v4(),
            identity: None,
            metadata: Map::new(),
        }
    }
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
