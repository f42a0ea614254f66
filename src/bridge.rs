//! Server generation
//!
//! Turns a list of endpoint descriptors into a ready-to-start [`BridgeServer`]: one tool per
//! endpoint, one shared invocation pipeline, and the selected transport.

use std::{fmt, path::Path, sync::Arc};

use reqwest::Url;
use tracing::{info, warn};

use crate::{
    backend::{BackendClient, ReqwestBackend},
    config::{Capabilities, Config, TransportKind},
    domain::{
        endpoint::EndpointDescriptor,
        middleware::MiddlewareConfig,
        pipeline::{Pipeline, ToolHandler},
        schema::{build_tool, ToolOverrides},
    },
    errors::GenerationError,
    mcp::server::{GeneratedTool, ProtocolServer},
    transport::{BridgeServer, TransportConfig},
};

#[derive(Clone)]
pub struct GenerationOptions {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    pub cors: bool,
    pub base_url: String,
    pub overrides: ToolOverrides,
    pub capabilities: Capabilities,
    pub middleware: MiddlewareConfig,
    /// Replaces the default HTTP client, mostly for tests.
    pub backend: Option<Arc<dyn BackendClient>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            transport: TransportKind::Http,
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors: false,
            base_url: "http://localhost:3000".to_string(),
            overrides: ToolOverrides::default(),
            capabilities: Capabilities::default(),
            middleware: MiddlewareConfig::default(),
            backend: None,
        }
    }
}

impl fmt::Debug for GenerationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationOptions")
            .field("transport", &self.transport)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cors", &self.cors)
            .field("base_url", &self.base_url)
            .field("overrides", &self.overrides)
            .field("capabilities", &self.capabilities)
            .field("middleware", &self.middleware)
            .field("custom_backend", &self.backend.is_some())
            .finish()
    }
}

impl GenerationOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            transport: config.transport,
            host: config.bind_addr.clone(),
            port: config.bind_port,
            cors: config.cors,
            base_url: config.base_url.clone(),
            capabilities: config.capabilities,
            ..Self::default()
        }
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_cors(mut self, cors: bool) -> Self {
        self.cors = cors;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_overrides(mut self, overrides: ToolOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_middleware(mut self, middleware: MiddlewareConfig) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn BackendClient>) -> Self {
        self.backend = Some(backend);
        self
    }
}

/// Builds a server exposing every endpoint as a tool. The server is returned unstarted.
pub fn generate(
    endpoints: Vec<EndpointDescriptor>,
    options: GenerationOptions,
) -> Result<BridgeServer, GenerationError> {
    if endpoints.is_empty() {
        return Err(GenerationError::NoEndpoints);
    }

    let base_url = validate_base_url(&options.base_url)?;
    let backend: Arc<dyn BackendClient> = match options.backend {
        Some(backend) => backend,
        None => Arc::new(
            ReqwestBackend::new()
                .map_err(|err| GenerationError::BackendClient(err.to_string()))?,
        ),
    };

    let mut tools: Vec<GeneratedTool> = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let definition = build_tool(&endpoint, &options.overrides);
        if tools
            .iter()
            .any(|tool| tool.definition.name == definition.name)
        {
            warn!(
                tool = %definition.name,
                method = %endpoint.method,
                path = %endpoint.path,
                "duplicate tool name; later endpoint is unreachable"
            );
        }
        tools.push(GeneratedTool {
            definition,
            handler: ToolHandler {
                endpoint: Arc::new(endpoint),
                base_url: base_url.clone(),
            },
        });
    }

    info!(
        tools = tools.len(),
        transport = %options.transport,
        base_url = %base_url,
        middleware = ?options.middleware,
        "generated bridge server"
    );

    let pipeline = Pipeline::new(options.middleware, backend);
    let server = ProtocolServer::new(tools, pipeline, options.capabilities);
    Ok(BridgeServer::new(
        Arc::new(server),
        TransportConfig {
            kind: options.transport,
            host: options.host,
            port: options.port,
            cors: options.cors,
        },
    ))
}

/// Loads endpoint descriptors from a JSON array on disk.
pub fn read_endpoints_file(path: &Path) -> Result<Vec<EndpointDescriptor>, GenerationError> {
    let failure = |reason: String| GenerationError::EndpointsFile {
        path: path.display().to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|err| failure(err.to_string()))?;
    serde_json::from_str(&raw).map_err(|err| failure(err.to_string()))
}

fn validate_base_url(raw: &str) -> Result<Arc<str>, GenerationError> {
    let invalid = |reason: &str| GenerationError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw).map_err(|err| invalid(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    Ok(Arc::from(raw.trim_end_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        endpoint::{HttpMethod, ParameterDescriptor, ParameterLocation},
        pipeline::tests::{RecordingBackend, Trace},
    };
    use parking_lot::Mutex;
    use serde_json::{json, Map, Value};
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn get_user() -> EndpointDescriptor {
        EndpointDescriptor::new(HttpMethod::Get, "/users/{id}").with_parameter(
            ParameterDescriptor::new("id", ParameterLocation::Path)
                .required()
                .with_schema(json!({ "type": "string" })),
        )
    }

    fn create_user() -> EndpointDescriptor {
        EndpointDescriptor::new(HttpMethod::Post, "/users").with_json_body(
            json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"]
            }),
            true,
        )
    }

    fn text_of(result: &rust_mcp_sdk::schema::CallToolResult) -> Value {
        let value = serde_json::to_value(result).expect("serializable result");
        let text = value["content"][0]["text"].as_str().expect("text block");
        serde_json::from_str(text).expect("json text")
    }

    #[test]
    fn rejects_empty_endpoint_list_and_bad_base_url() {
        assert!(matches!(
            generate(Vec::new(), GenerationOptions::default()),
            Err(GenerationError::NoEndpoints)
        ));
        assert!(matches!(
            generate(
                vec![get_user()],
                GenerationOptions::default().with_base_url("not a url")
            ),
            Err(GenerationError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            generate(
                vec![get_user()],
                GenerationOptions::default().with_base_url("ftp://files.local")
            ),
            Err(GenerationError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn generates_one_tool_per_endpoint_with_overrides() {
        let server = generate(
            vec![get_user(), create_user()],
            GenerationOptions::default()
                .with_transport(TransportKind::Stdio)
                .with_overrides(ToolOverrides::default().with_naming(|endpoint| {
                    format!("api_{}", endpoint.method.as_str().to_ascii_lowercase())
                })),
        )
        .expect("generation succeeds");

        let names = server
            .protocol()
            .list()
            .iter()
            .map(|tool| tool.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["api_get", "api_post"]);
        assert_eq!(server.transport().kind, TransportKind::Stdio);
        assert!(server.address().is_none());
    }

    #[tokio::test]
    async fn get_with_path_parameter_reaches_backend() {
        let backend = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 42, "name": "Ada" })))
            .expect(1)
            .mount(&backend)
            .await;

        let server = generate(
            vec![get_user()],
            GenerationOptions::default().with_base_url(backend.uri()),
        )
        .expect("generation succeeds");
        let result = server
            .protocol()
            .call("get_users_by_id", Map::from_iter([("id".to_string(), json!("42"))]))
            .await
            .expect("call succeeds");

        let parsed = text_of(&result);
        assert_eq!(parsed["status"], 200);
        assert_eq!(parsed["data"]["name"], "Ada");
    }

    #[tokio::test]
    async fn post_forwards_body_argument() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(body_json(json!({ "name": "Grace" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
            .expect(1)
            .mount(&backend)
            .await;

        let server = generate(
            vec![create_user()],
            GenerationOptions::default().with_base_url(format!("{}/", backend.uri())),
        )
        .expect("generation succeeds");
        let result = server
            .protocol()
            .call(
                "post_users",
                Map::from_iter([("body".to_string(), json!({ "name": "Grace" }))]),
            )
            .await
            .expect("call succeeds");

        let parsed = text_of(&result);
        assert_eq!(parsed["status"], 201);
        assert_eq!(parsed["data"]["id"], 7);
    }

    #[tokio::test]
    async fn denied_call_never_reaches_backend() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = Arc::new(RecordingBackend::new(200, json!({}), calls.clone()));
        let server = generate(
            vec![get_user()],
            GenerationOptions::default()
                .with_backend(backend.clone())
                .with_middleware(
                    MiddlewareConfig::builder()
                        .authz(Trace {
                            label: "deny",
                            calls: calls.clone(),
                        })
                        .on_error(Trace {
                            label: "error",
                            calls: calls.clone(),
                        })
                        .build(),
                ),
        )
        .expect("generation succeeds");

        let err = server
            .protocol()
            .call("get_users_by_id", Map::from_iter([("id".to_string(), json!("1"))]))
            .await
            .expect_err("authorization denied");

        assert!(err.to_string().contains("Authorization denied"));
        assert!(backend.requests.lock().is_empty());
        assert_eq!(*calls.lock(), vec!["deny", "error:authz"]);
    }

    #[tokio::test]
    async fn not_found_responses_flow_through_post_hooks() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = Arc::new(RecordingBackend::new(
            404,
            json!({ "error": "missing" }),
            calls.clone(),
        ));
        let server = generate(
            vec![get_user()],
            GenerationOptions::default()
                .with_backend(backend)
                .with_middleware(
                    MiddlewareConfig::builder()
                        .post(Trace {
                            label: "post",
                            calls: calls.clone(),
                        })
                        .build(),
                ),
        )
        .expect("generation succeeds");

        let result = server
            .protocol()
            .call("get_users_by_id", Map::from_iter([("id".to_string(), json!("9"))]))
            .await
            .expect("404 is a result, not an error");

        let parsed = text_of(&result);
        assert_eq!(parsed["by"], "post");
        assert_eq!(parsed["previous"]["status"], 404);
        assert_eq!(*calls.lock(), vec!["backend", "post"]);
    }

    #[test]
    fn reads_endpoint_descriptors_from_json_file() {
        let path = std::env::temp_dir().join(format!("endpoints-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"[{"method":"get","path":"/orders/{orderId}","parameters":[{"name":"orderId","in":"path","required":true}]}]"#,
        )
        .expect("write fixture");

        let endpoints = read_endpoints_file(&path).expect("valid file");
        let _ = std::fs::remove_file(&path);

        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, HttpMethod::Get);
        assert_eq!(endpoints[0].parameters[0].name, "orderId");

        assert!(matches!(
            read_endpoints_file(Path::new("/nonexistent/endpoints.json")),
            Err(GenerationError::EndpointsFile { .. })
        ));
    }
}
