//! Transport runtime and server lifecycle
//!
//! A generated server moves `NotStarted → Running → Stopped`. The network listener and
//! the stdio channel are owned by the runtime and released on `stop()`.

pub mod stdio;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncWrite, BufReader},
    net::TcpListener,
    sync::oneshot,
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    build_app, config::TransportKind, errors::RuntimeError, http::sse::SessionRegistry,
    mcp::server::ProtocolServer, AppState,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub host: String,
    pub port: u16,
    pub cors: bool,
}

enum RunningTransport {
    Channel {
        task: JoinHandle<()>,
    },
    Network {
        address: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<()>,
        sessions: SessionRegistry,
    },
}

impl RunningTransport {
    fn task(&mut self) -> &mut JoinHandle<()> {
        match self {
            Self::Channel { task } | Self::Network { task, .. } => task,
        }
    }
}

pub struct BridgeServer {
    server: Arc<ProtocolServer>,
    config: TransportConfig,
    state: LifecycleState,
    running: Option<RunningTransport>,
}

impl BridgeServer {
    pub fn new(server: Arc<ProtocolServer>, config: TransportConfig) -> Self {
        Self {
            server,
            config,
            state: LifecycleState::NotStarted,
            running: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.config
    }

    pub fn protocol(&self) -> &Arc<ProtocolServer> {
        &self.server
    }

    /// Bound address of a running network transport; `None` for stdio or when not running.
    pub fn address(&self) -> Option<SocketAddr> {
        match (&self.state, &self.running) {
            (LifecycleState::Running, Some(RunningTransport::Network { address, .. })) => {
                Some(*address)
            }
            _ => None,
        }
    }

    pub async fn start(&mut self) -> Result<(), RuntimeError> {
        match self.config.kind {
            TransportKind::Stdio => {
                self.start_with_channel(tokio::io::stdin(), tokio::io::stdout())
                    .await
            }
            TransportKind::Http | TransportKind::Sse => self.start_network().await,
        }
    }

    /// Attaches the single-channel transport to an arbitrary reader/writer pair.
    pub async fn start_with_channel<R, W>(&mut self, reader: R, writer: W) -> Result<(), RuntimeError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.ensure_not_running()?;

        let server = self.server.clone();
        let task = tokio::spawn(async move {
            if let Err(err) = stdio::serve_lines(server, BufReader::new(reader), writer).await {
                warn!(error = %err, "stdio transport failed");
            }
        });

        self.running = Some(RunningTransport::Channel { task });
        self.state = LifecycleState::Running;
        info!(transport = %TransportKind::Stdio, "server started");
        Ok(())
    }

    async fn start_network(&mut self) -> Result<(), RuntimeError> {
        self.ensure_not_running()?;

        let address = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| RuntimeError::Bind {
                address: address.clone(),
                source,
            })?;
        let bound = listener
            .local_addr()
            .map_err(|source| RuntimeError::Bind { address, source })?;

        let sessions = SessionRegistry::default();
        let app = build_app(
            AppState::new(self.server.clone(), sessions.clone(), self.config.kind),
            self.config.cors,
        );
        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(
                async move {
                    let _ = signal.await;
                },
            );
            if let Err(err) = serve.await {
                warn!(error = %err, "http transport failed");
            }
        });

        self.running = Some(RunningTransport::Network {
            address: bound,
            shutdown,
            task,
            sessions,
        });
        self.state = LifecycleState::Running;
        info!(
            transport = %self.config.kind,
            address = %bound,
            cors = self.config.cors,
            "server started"
        );
        Ok(())
    }

    /// No-op unless the server is running.
    pub async fn stop(&mut self) {
        if self.state != LifecycleState::Running {
            return;
        }

        match self.running.take() {
            Some(RunningTransport::Channel { task }) => task.abort(),
            Some(RunningTransport::Network {
                shutdown,
                mut task,
                sessions,
                ..
            }) => {
                if !sessions.is_empty() {
                    sessions.close_all();
                }
                let _ = shutdown.send(());
                if !task.is_finished()
                    && tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err()
                {
                    warn!("graceful shutdown timed out; aborting listener");
                    task.abort();
                }
            }
            None => {}
        }

        self.state = LifecycleState::Stopped;
        info!(transport = %self.config.kind, "server stopped");
    }

    /// Resolves when the running transport ends on its own, e.g. stdin reaching EOF.
    pub async fn wait(&mut self) {
        if self.state != LifecycleState::Running {
            return;
        }
        if let Some(running) = self.running.as_mut() {
            let _ = running.task().await;
        }
        if let Some(RunningTransport::Network { sessions, .. }) = self.running.take() {
            sessions.close_all();
        }
        self.state = LifecycleState::Stopped;
        info!(transport = %self.config.kind, "transport finished");
    }

    fn ensure_not_running(&self) -> Result<(), RuntimeError> {
        if self.state == LifecycleState::Running {
            return Err(RuntimeError::AlreadyRunning);
        }
        Ok(())
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        if let Some(mut running) = self.running.take() {
            running.task().abort();
        }
    }
}
