//! Tool definitions derived from endpoint descriptors
//!
//! Building a tool is a pure function of the descriptor and the optional naming and
//! description overrides; nothing here touches the network.

use std::{fmt, sync::Arc};

use rust_mcp_sdk::schema::Tool;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::domain::{
    endpoint::{EndpointDescriptor, ParameterDescriptor, ParameterLocation},
    path::segment_placeholder,
};

pub type NamingFn = dyn Fn(&EndpointDescriptor) -> String + Send + Sync;

#[derive(Clone, Default)]
pub struct ToolOverrides {
    pub naming: Option<Arc<NamingFn>>,
    pub description: Option<Arc<NamingFn>>,
}

impl ToolOverrides {
    pub fn with_naming<F>(mut self, naming: F) -> Self
    where
        F: Fn(&EndpointDescriptor) -> String + Send + Sync + 'static,
    {
        self.naming = Some(Arc::new(naming));
        self
    }

    pub fn with_description<F>(mut self, description: F) -> Self
    where
        F: Fn(&EndpointDescriptor) -> String + Send + Sync + 'static,
    {
        self.description = Some(Arc::new(description));
        self
    }
}

impl fmt::Debug for ToolOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolOverrides")
            .field("naming", &self.naming.is_some())
            .field("description", &self.description.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Protocol representation for `tools/list`.
    pub fn to_protocol_tool(&self) -> Result<Tool, serde_json::Error> {
        serde_json::from_value(json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        }))
    }
}

pub fn build_tool(endpoint: &EndpointDescriptor, overrides: &ToolOverrides) -> ToolDefinition {
    let name = match &overrides.naming {
        Some(naming) => naming(endpoint),
        None => default_tool_name(endpoint),
    };
    let description = match &overrides.description {
        Some(describe) => describe(endpoint),
        None => default_description(endpoint),
    };

    ToolDefinition {
        name,
        description,
        input_schema: build_input_schema(endpoint),
    }
}

pub fn default_tool_name(endpoint: &EndpointDescriptor) -> String {
    let segments = path_segments(&endpoint.path);
    let mut name = format!(
        "{}_{}",
        endpoint.method.as_str(),
        resource_segment(&segments).unwrap_or("root")
    );
    if let Some(placeholder) = segments.last().and_then(|segment| segment_placeholder(segment)) {
        name.push_str("_by_");
        name.push_str(placeholder);
    }
    sanitize_name(&name)
}

pub fn default_description(endpoint: &EndpointDescriptor) -> String {
    if let Some(description) = non_empty(endpoint.description.as_deref()) {
        return description.to_string();
    }
    if let Some(summary) = non_empty(endpoint.summary.as_deref()) {
        return summary.to_string();
    }

    let segments = path_segments(&endpoint.path);
    let resource = resource_segment(&segments).unwrap_or("root");
    format!("{} {}", endpoint.method.action(), singularize(resource))
}

pub fn build_input_schema(endpoint: &EndpointDescriptor) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for parameter in endpoint.parameters.iter().filter(|parameter| {
        matches!(
            parameter.location,
            ParameterLocation::Path | ParameterLocation::Query
        )
    }) {
        properties.insert(parameter.name.clone(), parameter_schema(parameter));
        if parameter.required {
            required.push(Value::String(parameter.name.clone()));
        }
    }

    if let Some((schema, body_required)) = body_schema(endpoint) {
        properties.insert("body".to_string(), schema);
        if body_required {
            required.push(Value::String("body".to_string()));
        }
    }

    let mut header_properties = Map::new();
    let mut header_required = Vec::new();
    for parameter in endpoint.parameters_in(ParameterLocation::Header) {
        header_properties.insert(parameter.name.clone(), parameter_schema(parameter));
        if parameter.required {
            header_required.push(Value::String(parameter.name.clone()));
        }
    }
    if !header_properties.is_empty() {
        let mut headers = json!({
            "type": "object",
            "properties": header_properties,
        });
        if !header_required.is_empty() {
            headers["required"] = Value::Array(header_required);
        }
        properties.insert("headers".to_string(), headers);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn body_schema(endpoint: &EndpointDescriptor) -> Option<(Value, bool)> {
    if let Some(request_body) = &endpoint.request_body {
        return request_body
            .json_schema()
            .map(|schema| (schema, request_body.required));
    }

    endpoint
        .parameters_in(ParameterLocation::Body)
        .next()
        .map(|parameter| {
            (
                parameter
                    .schema
                    .clone()
                    .unwrap_or_else(|| json!({ "type": "object" })),
                parameter.required,
            )
        })
}

fn parameter_schema(parameter: &ParameterDescriptor) -> Value {
    let mut schema = match &parameter.schema {
        Some(Value::Object(schema)) => schema.clone(),
        _ => Map::from_iter([("type".to_string(), json!("string"))]),
    };
    if let Some(description) = non_empty(parameter.description.as_deref()) {
        schema
            .entry("description")
            .or_insert_with(|| json!(description));
    }
    Value::Object(schema)
}

fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn resource_segment<'a>(segments: &[&'a str]) -> Option<&'a str> {
    segments
        .iter()
        .rev()
        .find(|segment| segment_placeholder(segment).is_none())
        .copied()
}

fn singularize(resource: &str) -> &str {
    match resource.strip_suffix('s') {
        Some(stem) if !stem.is_empty() && !stem.ends_with('s') => stem,
        _ => resource,
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::endpoint::HttpMethod;

    fn get_user() -> EndpointDescriptor {
        EndpointDescriptor::new(HttpMethod::Get, "/users/{id}").with_parameter(
            ParameterDescriptor::new("id", ParameterLocation::Path)
                .required()
                .with_schema(json!({ "type": "string" })),
        )
    }

    fn search_orders() -> EndpointDescriptor {
        EndpointDescriptor::new(HttpMethod::Post, "/shops/:shopId/orders")
            .with_parameter(ParameterDescriptor::new("shopId", ParameterLocation::Path).required())
            .with_parameter(
                ParameterDescriptor::new("limit", ParameterLocation::Query)
                    .with_schema(json!({ "type": "integer" })),
            )
            .with_parameter(ParameterDescriptor::new("X-Request-Id", ParameterLocation::Header))
            .with_parameter(ParameterDescriptor::new("Authorization", ParameterLocation::Header).required())
            .with_json_body(json!({ "type": "object", "properties": { "sku": { "type": "string" } } }), true)
    }

    #[test]
    fn default_name_includes_trailing_placeholder() {
        assert_eq!(default_tool_name(&get_user()), "get_users_by_id");
    }

    #[test]
    fn default_name_uses_last_resource_segment() {
        assert_eq!(default_tool_name(&search_orders()), "post_orders");
        assert_eq!(
            default_tool_name(&EndpointDescriptor::new(HttpMethod::Delete, "/api/v1/user-groups")),
            "delete_user_groups"
        );
        assert_eq!(
            default_tool_name(&EndpointDescriptor::new(HttpMethod::Get, "/")),
            "get_root"
        );
    }

    #[test]
    fn description_prefers_description_then_summary() {
        let endpoint = get_user().with_summary("Fetch a user");
        assert_eq!(default_description(&endpoint), "Fetch a user");

        let endpoint = endpoint.with_description("Returns one user by id");
        assert_eq!(default_description(&endpoint), "Returns one user by id");
    }

    #[test]
    fn description_falls_back_to_action_and_singular_resource() {
        assert_eq!(default_description(&get_user()), "Retrieve user");
        assert_eq!(default_description(&search_orders()), "Create order");
        assert_eq!(
            default_description(&EndpointDescriptor::new(HttpMethod::Options, "/settings")),
            "Get options for setting"
        );
        assert_eq!(
            default_description(&EndpointDescriptor::new(HttpMethod::Head, "/address")),
            "Check address"
        );
    }

    #[test]
    fn input_schema_lists_path_query_body_and_headers() {
        let schema = build_input_schema(&search_orders());
        let properties = schema["properties"].as_object().expect("properties object");

        let mut keys = properties.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec!["body", "headers", "limit", "shopId"]);
        assert_eq!(schema["required"], json!(["shopId", "body"]));
        assert_eq!(properties["limit"]["type"], "integer");
        assert_eq!(properties["shopId"]["type"], "string");
        assert_eq!(properties["body"]["properties"]["sku"]["type"], "string");
        assert_eq!(
            properties["headers"]["properties"]
                .as_object()
                .expect("header properties")
                .len(),
            2
        );
        assert_eq!(properties["headers"]["required"], json!(["Authorization"]));
    }

    #[test]
    fn non_json_body_is_not_exposed() {
        let mut endpoint = EndpointDescriptor::new(HttpMethod::Post, "/uploads");
        endpoint.request_body = Some(crate::domain::endpoint::RequestBodyDescriptor {
            required: true,
            description: None,
            content: [(
                "multipart/form-data".to_string(),
                crate::domain::endpoint::MediaTypeDescriptor::default(),
            )]
            .into_iter()
            .collect(),
        });

        let schema = build_input_schema(&endpoint);
        assert!(schema["properties"].as_object().expect("object").is_empty());
        assert_eq!(schema["required"], json!([]));
    }

    #[test]
    fn body_parameter_counts_as_body_declaration() {
        let endpoint = EndpointDescriptor::new(HttpMethod::Put, "/pets").with_parameter(
            ParameterDescriptor::new("pet", ParameterLocation::Body)
                .required()
                .with_schema(json!({ "type": "object" })),
        );
        let schema = build_input_schema(&endpoint);
        assert_eq!(schema["required"], json!(["body"]));
        assert!(schema["properties"].get("pet").is_none());
    }

    #[test]
    fn overrides_win_and_schema_is_unaffected() {
        let overrides = ToolOverrides::default()
            .with_naming(|endpoint| format!("custom::{}", endpoint.path))
            .with_description(|_| "custom description".to_string());

        let tool = build_tool(&search_orders(), &overrides);
        assert_eq!(tool.name, "custom::/shops/:shopId/orders");
        assert_eq!(tool.description, "custom description");
        assert_eq!(tool.input_schema, build_input_schema(&search_orders()));
    }

    #[test]
    fn building_twice_is_identical() {
        let overrides = ToolOverrides::default().with_naming(|endpoint| endpoint.path.clone());
        assert_eq!(
            build_tool(&search_orders(), &overrides),
            build_tool(&search_orders(), &overrides)
        );
        assert_eq!(
            build_tool(&get_user(), &ToolOverrides::default()),
            build_tool(&get_user(), &ToolOverrides::default())
        );
    }

    #[test]
    fn converts_to_protocol_tool() {
        let tool = build_tool(&get_user(), &ToolOverrides::default())
            .to_protocol_tool()
            .expect("tool conversion");
        assert_eq!(tool.name, "get_users_by_id");
        assert_eq!(tool.description.as_deref(), Some("Retrieve user"));
    }
}
