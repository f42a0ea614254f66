use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    domain::{context::OutboundRequest, path::is_dot_segment},
    errors::BackendError,
};

pub const BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw backend response handed to the first post hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub data: Value,
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn send(
        &self,
        base_url: &str,
        request: &OutboundRequest,
    ) -> Result<BackendResponse, BackendError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: Client,
}

impl ReqwestBackend {
    pub fn new() -> Result<Self, BackendError> {
        Self::with_timeout(BACKEND_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BackendClient for ReqwestBackend {
    async fn send(
        &self,
        base_url: &str,
        request: &OutboundRequest,
    ) -> Result<BackendResponse, BackendError> {
        let url = build_url(base_url, request)?;
        debug!(method = %request.method, url = %url, "sending backend request");

        let mut builder = self.client.request(request.method.into(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.method.carries_body() {
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = header_map(response.headers());
        let bytes = response.bytes().await?;

        Ok(BackendResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            data: parse_body(&bytes),
        })
    }
}

pub fn build_url(base_url: &str, request: &OutboundRequest) -> Result<Url, BackendError> {
    if let Some((name, _)) = request
        .path_params
        .iter()
        .find(|(_, value)| is_dot_segment(value))
    {
        return Err(BackendError::transport(format!(
            "path parameter '{name}' must not be a dot segment"
        )));
    }

    let raw = format!(
        "{}{}",
        base_url.trim_end_matches('/'),
        request.resolved_path()
    );
    let mut url = Url::parse(&raw)
        .map_err(|err| BackendError::transport(format!("invalid backend url '{raw}': {err}")))?;

    let pairs = request.query_pairs();
    if !pairs.is_empty() {
        let mut query = url.query_pairs_mut();
        for (name, value) in &pairs {
            query.append_pair(name, value);
        }
    }

    Ok(url)
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::endpoint::{EndpointDescriptor, HttpMethod};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(endpoint: &EndpointDescriptor, arguments: Value) -> OutboundRequest {
        OutboundRequest::from_arguments(
            endpoint,
            arguments.as_object().expect("object arguments"),
        )
    }

    #[test]
    fn build_url_joins_base_path_and_query() {
        let endpoint = EndpointDescriptor::new(HttpMethod::Get, "/users/{id}");
        let url = build_url(
            "http://api.local/v1/",
            &request(&endpoint, json!({ "id": "5", "expand": "teams" })),
        )
        .expect("valid url");
        assert_eq!(url.as_str(), "http://api.local/v1/users/5?expand=teams");
    }

    #[test]
    fn path_values_cannot_escape_their_segment() {
        let endpoint = EndpointDescriptor::new(HttpMethod::Get, "/users/{id}");
        for (id, expected) in [
            ("../admin", "http://api.local/users/..%2Fadmin"),
            ("a?role=root", "http://api.local/users/a%3Frole%3Droot"),
            ("x#y", "http://api.local/users/x%23y"),
            ("a/b", "http://api.local/users/a%2Fb"),
        ] {
            let url = build_url("http://api.local", &request(&endpoint, json!({ "id": id })))
                .expect("valid url");
            assert_eq!(url.as_str(), expected);
            assert!(url.path().starts_with("/users/"));
            assert!(url.query().is_none());
            assert!(url.fragment().is_none());
        }

        let err = build_url("http://api.local", &request(&endpoint, json!({ "id": ".." })))
            .expect_err("dot segment rejected");
        assert!(err.to_string().contains("dot segment"));
    }

    #[test]
    fn parse_body_falls_back_to_text() {
        assert_eq!(parse_body(b"{\"ok\":true}"), json!({ "ok": true }));
        assert_eq!(parse_body(b"plain"), json!("plain"));
        assert_eq!(parse_body(b""), Value::Null);
    }

    #[tokio::test]
    async fn sends_json_body_headers_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(query_param("notify", "true"))
            .and(header("x-trace", "abc"))
            .and(body_json(json!({ "name": "Eve" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = EndpointDescriptor::new(HttpMethod::Post, "/users");
        let response = ReqwestBackend::new()
            .expect("client")
            .send(
                &server.uri(),
                &request(
                    &endpoint,
                    json!({
                        "notify": true,
                        "headers": { "X-Trace": "abc" },
                        "body": { "name": "Eve" }
                    }),
                ),
            )
            .await
            .expect("backend response");

        assert_eq!(response.status, 201);
        assert_eq!(response.status_text, "Created");
        assert_eq!(response.data, json!({ "id": 7 }));
    }

    #[tokio::test]
    async fn error_statuses_are_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "missing" })))
            .mount(&server)
            .await;

        let endpoint = EndpointDescriptor::new(HttpMethod::Get, "/users/:id");
        let response = ReqwestBackend::new()
            .expect("client")
            .send(&server.uri(), &request(&endpoint, json!({ "id": 9 })))
            .await
            .expect("404 is not a transport failure");

        assert_eq!(response.status, 404);
        assert_eq!(response.data, json!({ "error": "missing" }));
    }

    #[tokio::test]
    async fn get_requests_never_send_a_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let endpoint = EndpointDescriptor::new(HttpMethod::Get, "/search");
        ReqwestBackend::new()
            .expect("client")
            .send(
                &server.uri(),
                &request(&endpoint, json!({ "body": { "ignored": true } })),
            )
            .await
            .expect("backend response");

        let received = server.received_requests().await.expect("recording enabled");
        assert_eq!(received.len(), 1);
        assert!(received[0].body.is_empty());
    }

    #[tokio::test]
    async fn connection_failure_is_backend_error() {
        let endpoint = EndpointDescriptor::new(HttpMethod::Get, "/users");
        let err = ReqwestBackend::with_timeout(Duration::from_millis(500))
            .expect("client")
            .send("http://127.0.0.1:1", &request(&endpoint, json!({})))
            .await
            .expect_err("nothing listens on port 1");
        assert!(err.status.is_none());
    }
}
