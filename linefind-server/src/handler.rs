//! Per-connection query handling.
//!
//! A connection carries exactly one query. The handler reads it with a
//! single read of at most [`MAX_QUERY_BYTES`] bytes, answers with one
//! response line and closes the connection whatever happened.

use crate::error::ServerError;
use crate::lines::LineSource;
use crate::metrics::Metrics;
use linefind_protocol::{Query, QueryResult, MAX_QUERY_BYTES};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use uuid::Uuid;

/// Handles accepted connections against a shared line source.
pub struct QueryHandler {
    source: Arc<LineSource>,
    /// Deadline applied to each I/O step (handshake, read, write).
    timeout: Option<Duration>,
    tls_acceptor: Option<Arc<TlsAcceptor>>,
    metrics: Option<Arc<Metrics>>,
}

impl QueryHandler {
    pub fn new(source: Arc<LineSource>) -> Self {
        Self {
            source,
            timeout: None,
            tls_acceptor: None,
            metrics: None,
        }
    }

    /// Sets the per-step deadline. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the TLS acceptor.
    pub fn with_tls(mut self, acceptor: Arc<TlsAcceptor>) -> Self {
        self.tls_acceptor = Some(acceptor);
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn source(&self) -> &Arc<LineSource> {
        &self.source
    }

    /// Resolves a query against the current line set.
    pub async fn resolve(&self, query: &Query) -> Result<QueryResult, ServerError> {
        let lines = self.source.current_lines().await?;
        Ok(lines.lookup(query))
    }

    /// Serves one connection end to end and logs the outcome.
    ///
    /// The connection is closed before this returns, on success and on
    /// failure. Errors are scoped to this connection.
    pub async fn handle(
        &self,
        tcp_stream: TcpStream,
        addr: SocketAddr,
    ) -> Result<QueryResult, ServerError> {
        let started = Instant::now();
        let conn_id = Uuid::new_v4();
        let mut query = None;

        let result = self.serve(tcp_stream, addr, &mut query).await;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let query_text = query.as_ref().map(Query::as_str);

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    conn = %conn_id,
                    peer = %addr,
                    query = ?query_text.unwrap_or_default(),
                    result = %outcome,
                    elapsed_ms,
                    "Query served"
                );
            }
            Err(e) => {
                tracing::warn!(
                    conn = %conn_id,
                    peer = %addr,
                    query = ?query_text,
                    error.kind = e.kind(),
                    error = %e,
                    elapsed_ms,
                    "Query failed"
                );
            }
        }

        if let Some(ref metrics) = self.metrics {
            metrics.query_duration.observe(elapsed.as_secs_f64());
            match &result {
                Ok(outcome) => {
                    let label = if outcome.is_found() { "exists" } else { "not_found" };
                    metrics.queries_total.with_label_values(&[label]).inc();
                }
                Err(e) => metrics.errors_total.with_label_values(&[e.kind()]).inc(),
            }
        }

        result
    }

    async fn serve(
        &self,
        tcp_stream: TcpStream,
        addr: SocketAddr,
        query: &mut Option<Query>,
    ) -> Result<QueryResult, ServerError> {
        let Some(ref acceptor) = self.tls_acceptor else {
            tracing::debug!("[{}] Connected (plain)", addr);
            return self.respond(tcp_stream, addr, query).await;
        };

        tracing::debug!("[{}] Performing TLS handshake", addr);
        let tls_stream =
            match with_deadline(self.timeout, "TLS handshake", acceptor.accept(tcp_stream)).await {
                Ok(tls_stream) => tls_stream,
                Err(ServerError::Io(e)) => return Err(ServerError::TlsHandshake(e.to_string())),
                Err(e) => return Err(e),
            };
        tracing::debug!("[{}] Connected (tls)", addr);
        self.respond(tls_stream, addr, query).await
    }

    /// Runs the exchange, then closes `stream` whatever its outcome.
    async fn respond<S>(
        &self,
        mut stream: S,
        addr: SocketAddr,
        query: &mut Option<Query>,
    ) -> Result<QueryResult, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.exchange(&mut stream, addr, query).await;
        if let Err(e) = with_deadline(self.timeout, "shutdown", stream.shutdown()).await {
            tracing::debug!("[{}] Shutdown error: {}", addr, e);
        }
        result
    }

    /// Reads one query, resolves it and writes the response.
    async fn exchange<S>(
        &self,
        stream: &mut S,
        addr: SocketAddr,
        query: &mut Option<Query>,
    ) -> Result<QueryResult, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = [0u8; MAX_QUERY_BYTES];
        let n = with_deadline(self.timeout, "read", stream.read(&mut buf)).await?;
        tracing::debug!("[{}] Received {} bytes", addr, n);
        if n == MAX_QUERY_BYTES {
            tracing::debug!(
                "[{}] Read buffer full, query may be truncated to {} bytes",
                addr,
                MAX_QUERY_BYTES
            );
        }

        let query = query.insert(Query::decode(&buf[..n])?);
        let result = self.resolve(query).await?;

        with_deadline(self.timeout, "write", stream.write_all(result.encode())).await?;
        with_deadline(self.timeout, "flush", stream.flush()).await?;
        Ok(result)
    }
}

/// Runs an I/O step, bounded by `timeout` when one is set.
async fn with_deadline<F, T>(
    timeout: Option<Duration>,
    step: &'static str,
    fut: F,
) -> Result<T, ServerError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ServerError::Timeout(step))?
            .map_err(ServerError::Io),
        None => fut.await.map_err(ServerError::Io),
    }
}
