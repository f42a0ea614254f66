//! Endpoint descriptors supplied by an external discoverer
//!
//! Descriptors are read-only inputs to tool generation. They deserialize from the
//! JSON shape discoverers emit (camelCase keys, parameter location under `in`).

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Verb used when generating a description for an endpoint without one.
    pub fn action(self) -> &'static str {
        match self {
            Self::Get => "Retrieve",
            Self::Post => "Create",
            Self::Put => "Update",
            Self::Patch => "Modify",
            Self::Delete => "Delete",
            Self::Head => "Check",
            Self::Options => "Get options for",
        }
    }

    pub fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(UnsupportedMethod(value.to_string())),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = UnsupportedMethod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
            HttpMethod::Head => Self::HEAD,
            HttpMethod::Options => Self::OPTIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaTypeDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBodyDescriptor {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub content: BTreeMap<String, MediaTypeDescriptor>,
}

impl RequestBodyDescriptor {
    /// Schema of the first JSON media type, if the body accepts JSON at all.
    pub fn json_schema(&self) -> Option<Value> {
        self.content
            .iter()
            .find(|(content_type, _)| content_type.to_ascii_lowercase().contains("json"))
            .map(|(_, media)| {
                media
                    .schema
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({ "type": "object" }))
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub content: BTreeMap<String, MediaTypeDescriptor>,
}

pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyDescriptor>,
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseDescriptor>,
    #[serde(default)]
    pub security: Vec<SecurityRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EndpointDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            parameters: Vec::new(),
            request_body: None,
            responses: BTreeMap::new(),
            security: Vec::new(),
            operation_id: None,
            summary: None,
            description: None,
            tags: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_json_body(mut self, schema: Value, required: bool) -> Self {
        self.request_body = Some(RequestBodyDescriptor {
            required,
            description: None,
            content: BTreeMap::from([(
                "application/json".to_string(),
                MediaTypeDescriptor {
                    schema: Some(schema),
                },
            )]),
        });
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters
            .iter()
            .filter(move |parameter| parameter.location == location)
    }
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            required: false,
            schema: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_discoverer_output() {
        let endpoint: EndpointDescriptor = serde_json::from_value(json!({
            "method": "get",
            "path": "/users/{id}",
            "parameters": [
                { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } },
                { "name": "X-Trace", "in": "header" }
            ],
            "responses": { "200": { "description": "ok" } },
            "operationId": "getUser"
        }))
        .expect("descriptor should deserialize");

        assert_eq!(endpoint.method, HttpMethod::Get);
        assert_eq!(endpoint.operation_id.as_deref(), Some("getUser"));
        assert_eq!(endpoint.parameters_in(ParameterLocation::Header).count(), 1);
        assert!(endpoint.parameters[0].required);
        assert!(endpoint.request_body.is_none());
    }

    #[test]
    fn rejects_unknown_method() {
        let error = serde_json::from_value::<EndpointDescriptor>(json!({
            "method": "TRACE",
            "path": "/"
        }))
        .expect_err("TRACE is not bridged");
        assert!(error.to_string().contains("unsupported HTTP method"));
    }

    #[test]
    fn json_schema_matches_vendor_json_types() {
        let body = RequestBodyDescriptor {
            required: true,
            description: None,
            content: BTreeMap::from([(
                "application/vnd.api+json".to_string(),
                MediaTypeDescriptor { schema: None },
            )]),
        };
        assert_eq!(body.json_schema(), Some(json!({ "type": "object" })));

        let form = RequestBodyDescriptor {
            required: true,
            description: None,
            content: BTreeMap::from([(
                "multipart/form-data".to_string(),
                MediaTypeDescriptor::default(),
            )]),
        };
        assert_eq!(form.json_schema(), None);
    }
}
