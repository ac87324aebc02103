//! TCP server implementation.

use crate::config::NetworkConfig;
use crate::error::ServerError;
use crate::handler::QueryHandler;
use crate::lines::LineSource;
use crate::metrics::Metrics;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;

/// Pause after a failed accept, so a persistent failure (e.g. EMFILE) does
/// not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Listen backlog for not-yet-accepted connections.
    pub backlog: u32,
    /// Per-connection I/O deadline (`None` = wait indefinitely).
    pub timeout: Option<Duration>,
    /// TLS acceptor (if TLS is enabled).
    pub tls_acceptor: Option<Arc<TlsAcceptor>>,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("backlog", &self.backlog)
            .field("timeout", &self.timeout)
            .field("tls_enabled", &self.tls_acceptor.is_some())
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_network(&NetworkConfig::default())
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builds the runtime configuration from the network section.
    pub fn from_network(network: &NetworkConfig) -> Self {
        Self {
            bind_addr: network.bind_addr,
            backlog: network.max_connections,
            timeout: Some(network.timeout()),
            tls_acceptor: None,
            metrics: None,
        }
    }

    /// Sets the listen backlog.
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Sets the per-connection deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the TLS acceptor.
    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls_acceptor = Some(Arc::new(acceptor));
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether TLS is enabled.
    pub fn tls_enabled(&self) -> bool {
        self.tls_acceptor.is_some()
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub queries_total: AtomicU64,
    pub errors_total: AtomicU64,
    pub accept_errors_total: AtomicU64,
}

/// TCP server for linefind.
pub struct Server {
    config: ServerConfig,
    handler: Arc<QueryHandler>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server answering from `source`.
    pub fn new(config: ServerConfig, source: Arc<LineSource>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut handler = QueryHandler::new(source).with_timeout(config.timeout);
        if let Some(ref acceptor) = config.tls_acceptor {
            handler = handler.with_tls(acceptor.clone());
        }
        if let Some(ref metrics) = config.metrics {
            handler = handler.with_metrics(metrics.clone());
        }
        Self {
            config,
            handler: Arc::new(handler),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the listening socket with the configured backlog.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.bind_addr;
        let bind_err = |source| ServerError::Bind { addr, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        socket.listen(self.config.backlog).map_err(bind_err)
    }

    /// Binds and runs the server until [`Server::shutdown`] is called.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Runs the accept loop on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown.subscribe();
        self.running.store(true, Ordering::SeqCst);

        let tls_mode = if self.config.tls_enabled() {
            "TLS"
        } else {
            "plain"
        };
        tracing::info!(
            "Server listening on {} ({}, backlog {})",
            listener.local_addr()?,
            tls_mode,
            self.config.backlog
        );

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => {
                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);
                            if let Some(ref metrics) = self.config.metrics {
                                metrics.connections_total.inc();
                                metrics.connections_active.inc();
                            }

                            let handler = self.handler.clone();
                            let stats = self.stats.clone();
                            let metrics = self.config.metrics.clone();

                            tokio::spawn(async move {
                                match handler.handle(tcp_stream, addr).await {
                                    Ok(_) => stats.queries_total.fetch_add(1, Ordering::Relaxed),
                                    Err(_) => stats.errors_total.fetch_add(1, Ordering::Relaxed),
                                };

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                if let Some(ref metrics) = metrics {
                                    metrics.connections_active.dec();
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                            self.stats.accept_errors_total.fetch_add(1, Ordering::Relaxed);
                            if let Some(ref metrics) = self.config.metrics {
                                metrics.errors_total.with_label_values(&["accept"]).inc();
                            }
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        drop(listener);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns a receiver that fires when the server shuts down.
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Returns the line source queries are answered from.
    pub fn source(&self) -> &Arc<LineSource> {
        self.handler.source()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
