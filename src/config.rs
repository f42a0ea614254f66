use std::{env, fmt, net::SocketAddr, path::PathBuf, str::FromStr};

use serde::Serialize;
use thiserror::Error;

use crate::errors::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
    Sse,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Sse => "sse",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = GenerationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" | "single-channel" => Ok(Self::Stdio),
            "http" | "streamable-http" | "request-response" => Ok(Self::Http),
            "sse" | "event-stream" => Ok(Self::Sse),
            _ => Err(GenerationError::UnsupportedTransport(value.to_string())),
        }
    }
}

/// Capabilities advertised during `initialize`. Only tools carry behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub tools: bool,
    pub resources: bool,
    pub prompts: bool,
    pub logging: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            tools: true,
            resources: false,
            prompts: false,
            logging: false,
        }
    }
}

impl FromStr for Capabilities {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut capabilities = Self {
            tools: false,
            resources: false,
            prompts: false,
            logging: false,
        };
        for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            match item.to_ascii_lowercase().as_str() {
                "tools" => capabilities.tools = true,
                "resources" => capabilities.resources = true,
                "prompts" => capabilities.prompts = true,
                "logging" => capabilities.logging = true,
                _ => return Err(ConfigError::InvalidCapabilities),
            }
        }
        Ok(capabilities)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportKind,
    pub bind_addr: String,
    pub bind_port: u16,
    pub base_url: String,
    pub cors: bool,
    pub endpoints_file: PathBuf,
    pub capabilities: Capabilities,
    pub api_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BRIDGE_BASE_URL is required and must not be empty")]
    MissingBaseUrl,
    #[error("BRIDGE_ENDPOINTS_FILE is required and must not be empty")]
    MissingEndpointsFile,
    #[error("BRIDGE_TRANSPORT must be one of: stdio, http, sse")]
    InvalidTransport,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("BRIDGE_CORS must be true or false")]
    InvalidCors,
    #[error("BRIDGE_CAPABILITIES must list tools, resources, prompts or logging")]
    InvalidCapabilities,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = required_var("BRIDGE_BASE_URL").ok_or(ConfigError::MissingBaseUrl)?;
        let endpoints_file = required_var("BRIDGE_ENDPOINTS_FILE")
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingEndpointsFile)?;

        let transport = required_var("BRIDGE_TRANSPORT")
            .map(|value| {
                value
                    .parse::<TransportKind>()
                    .map_err(|_| ConfigError::InvalidTransport)
            })
            .transpose()?
            .unwrap_or(TransportKind::Http);
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);
        let cors = required_var("BRIDGE_CORS")
            .map(|value| parse_bool(&value).ok_or(ConfigError::InvalidCors))
            .transpose()?
            .unwrap_or(false);
        let capabilities = required_var("BRIDGE_CAPABILITIES")
            .map(|value| value.parse::<Capabilities>())
            .transpose()?
            .unwrap_or_default();
        let api_token = required_var("MCP_API_TOKEN");

        let config = Self {
            transport,
            bind_addr,
            bind_port,
            base_url,
            cors,
            endpoints_file,
            capabilities,
            api_token,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn required_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
