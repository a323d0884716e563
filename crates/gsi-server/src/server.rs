//! Listener lifecycle and per-connection workers.
//!
//! [`GsiServer::start`] binds the socket and spawns the accept loop, which
//! waits for a free worker permit before each accept so at most
//! `max_connections` connections are served at once. Each connection reads
//! exactly one request, answers it and closes. Connection-level failures
//! are logged and never reach the accept loop.
//!
//! [`GsiServer::stop`] signals the accept loop, waits for it to exit and so
//! closes the listening socket. Connections already being served finish on
//! their own. A stopped server can be started again.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gsi_core::config::ServerConfig;
use gsi_core::{GsiConfig, IngestPipeline};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RequestError, ServerError};
use crate::http::{HttpResponse, read_request, write_response};
use crate::router::Router;

/// Pause after a failed accept, so a persistent failure does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Per-connection limits.
#[derive(Debug, Clone, Copy)]
struct ConnectionLimits {
    max_connections: usize,
    read_timeout: Duration,
    max_body_bytes: usize,
}

impl From<&ServerConfig> for ConnectionLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(1),
            read_timeout: config.read_timeout(),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// State held while the accept loop runs.
#[derive(Debug)]
struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

/// The GSI HTTP endpoint.
#[derive(Debug)]
pub struct GsiServer {
    config: ServerConfig,
    router: Router,
    running: Mutex<Option<Running>>,
}

impl GsiServer {
    /// A stopped server that feeds `pipeline`.
    pub fn new(config: ServerConfig, pipeline: Arc<IngestPipeline>) -> Self {
        let router = Router::new(pipeline, config.diagnostics);
        Self {
            config,
            router,
            running: Mutex::new(None),
        }
    }

    /// A stopped server with a pipeline built from `config`.
    pub fn from_config(config: &GsiConfig) -> Self {
        let pipeline = Arc::new(IngestPipeline::from_config(config));
        Self::new(config.server.clone(), pipeline)
    }

    /// The pipeline updates are fed into.
    pub const fn pipeline(&self) -> &Arc<IngestPipeline> {
        self.router.pipeline()
    }

    /// Bind and start accepting connections.
    ///
    /// Returns the bound address, which differs from the configured one
    /// when port 0 was requested.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyRunning`] if the server is running,
    /// [`ServerError::Config`] if the host is not an IP address, and
    /// [`ServerError::Bind`] if the address cannot be bound.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let addr = self.config.bind_address()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let limits = ConnectionLimits::from(&self.config);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.router.clone(),
            limits,
            shutdown_rx,
        ));

        info!(
            addr = %local_addr,
            max_connections = limits.max_connections,
            "GSI server listening"
        );
        *running = Some(Running {
            local_addr,
            shutdown,
            accept_task,
        });
        Ok(local_addr)
    }

    /// Stop accepting connections and close the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotRunning`] if the server is not running.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let running = self
            .running
            .lock()
            .await
            .take()
            .ok_or(ServerError::NotRunning)?;

        let _ = running.shutdown.send(true);
        if let Err(e) = running.accept_task.await {
            warn!(error = %e, "accept loop ended abnormally");
        }
        info!(addr = %running.local_addr, "GSI server stopped");
        Ok(())
    }

    /// Whether the accept loop is running.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// The bound address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|running| running.local_addr)
    }
}

async fn accept_loop(
    listener: TcpListener,
    router: Router,
    limits: ConnectionLimits,
    mut shutdown: watch::Receiver<bool>,
) {
    let permits = Arc::new(Semaphore::new(limits.max_connections));
    loop {
        let permit = tokio::select! {
            _ = shutdown.changed() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        let accepted = tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, client)) => {
                let router = router.clone();
                tokio::spawn(async move {
                    serve_connection(stream, client, &router, limits).await;
                    drop(permit);
                });
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
    debug!("accept loop exited");
}

/// Serve exactly one request on `stream`.
async fn serve_connection(
    stream: TcpStream,
    client: SocketAddr,
    router: &Router,
    limits: ConnectionLimits,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let read = tokio::time::timeout(
        limits.read_timeout,
        read_request(&mut reader, limits.max_body_bytes),
    )
    .await;

    let response = match read {
        Err(_) => {
            debug!(%client, "read timed out, closing connection");
            return;
        }
        Ok(Ok(None)) => return,
        Ok(Ok(Some(request))) => router.handle(request, client).await,
        Ok(Err(RequestError::MissingContentLength)) => {
            debug!(%client, "body without content-length, dropping connection");
            return;
        }
        Ok(Err(RequestError::Io(e))) => {
            debug!(%client, error = %e, "connection failed while reading request");
            return;
        }
        Ok(Err(e @ RequestError::Malformed(_))) => {
            debug!(%client, error = %e, "malformed request");
            HttpResponse::error(400, &e.to_string())
        }
        Ok(Err(e @ RequestError::BodyTooLarge { .. })) => {
            debug!(%client, error = %e, "request body too large");
            HttpResponse::error(413, &e.to_string())
        }
    };

    if let Err(e) = write_response(&mut write_half, &response).await {
        debug!(%client, error = %e, "failed to write response");
        return;
    }
    if let Err(e) = write_half.shutdown().await {
        debug!(%client, error = %e, "failed to close connection");
    }
}
