//! Prometheus metrics for the linefind server.
//!
//! This module provides:
//! - Metrics registry with counters, gauges, and a query latency histogram
//! - HTTP server to expose metrics at `/metrics` endpoint

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Query duration histogram buckets (in seconds).
const DURATION_BUCKETS: &[f64] = &[
    0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0,
];

/// Prometheus metrics for the linefind server.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Total connections accepted.
    pub connections_total: Counter,
    /// Currently active connections.
    pub connections_active: Gauge,
    /// Answered queries by result.
    pub queries_total: CounterVec,
    /// Failures by error kind.
    pub errors_total: CounterVec,
    /// Wall-clock time from accept to close.
    pub query_duration: Histogram,
    /// Successful reads of the source file.
    pub source_loads_total: Counter,
    /// Line count of the most recently loaded source.
    pub source_lines: Gauge,
}

impl Metrics {
    /// Creates a new Metrics instance with all metrics registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let connections_total = Counter::with_opts(Opts::new(
            "linefind_connections_total",
            "Total number of connections accepted",
        ))?;
        registry.register(Box::new(connections_total.clone()))?;

        let connections_active = Gauge::with_opts(Opts::new(
            "linefind_connections_active",
            "Number of currently active connections",
        ))?;
        registry.register(Box::new(connections_active.clone()))?;

        let queries_total = CounterVec::new(
            Opts::new("linefind_queries_total", "Total answered queries by result"),
            &["result"],
        )?;
        registry.register(Box::new(queries_total.clone()))?;

        let errors_total = CounterVec::new(
            Opts::new("linefind_errors_total", "Total errors by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let query_duration = Histogram::with_opts(
            HistogramOpts::new(
                "linefind_query_duration_seconds",
                "Time from accepting a connection to closing it",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(query_duration.clone()))?;

        let source_loads_total = Counter::with_opts(Opts::new(
            "linefind_source_loads_total",
            "Total successful reads of the source file",
        ))?;
        registry.register(Box::new(source_loads_total.clone()))?;

        let source_lines = Gauge::with_opts(Opts::new(
            "linefind_source_lines",
            "Number of lines in the most recently loaded source file",
        ))?;
        registry.register(Box::new(source_lines.clone()))?;

        Ok(Self {
            registry,
            connections_total,
            connections_active,
            queries_total,
            errors_total,
            query_duration,
            source_loads_total,
            source_lines,
        })
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Runs the HTTP metrics server.
///
/// The server listens on the given address and serves metrics at `/metrics`.
pub async fn run_metrics_server(
    addr: SocketAddr,
    metrics: Arc<Metrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let metrics = metrics.clone();
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                async move { handle_request(req, metrics).await }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                tracing::debug!("Metrics connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Metrics server accept error: {}", e);
                    }
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Metrics server shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let response = match req.uri().path() {
        "/metrics" => match metrics.encode() {
            Ok(body) => {
                let mut response = text_response(StatusCode::OK, body);
                response.headers_mut().insert(
                    hyper::header::CONTENT_TYPE,
                    hyper::header::HeaderValue::from_static(
                        "text/plain; version=0.0.4; charset=utf-8",
                    ),
                );
                response
            }
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        "/health" | "/healthz" => text_response(StatusCode::OK, "OK"),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();

        metrics.connections_total.inc();
        metrics.connections_active.inc();
        metrics.queries_total.with_label_values(&["exists"]).inc();
        metrics.errors_total.with_label_values(&["timeout"]).inc();
        metrics.query_duration.observe(0.0004);
        metrics.source_loads_total.inc();
        metrics.source_lines.set(250_000.0);

        let encoded = String::from_utf8(metrics.encode().unwrap()).unwrap();

        assert!(encoded.contains("linefind_connections_total 1"));
        assert!(encoded.contains("linefind_connections_active 1"));
        assert!(encoded.contains("linefind_queries_total{result=\"exists\"} 1"));
        assert!(encoded.contains("linefind_errors_total{kind=\"timeout\"} 1"));
        assert!(encoded.contains("linefind_query_duration_seconds_count 1"));
        assert!(encoded.contains("linefind_source_lines 250000"));
    }

    #[tokio::test]
    async fn test_metrics_server_serves_and_stops() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = unused.local_addr().unwrap();
        drop(unused);

        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.connections_total.inc();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = tokio::spawn(run_metrics_server(addr, metrics, shutdown_rx));

        let mut stream = None;
        for _ in 0..50 {
            match tokio::net::TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(20)).await,
            }
        }
        let mut stream = stream.expect("metrics server did not start");
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).await.unwrap();
        assert!(body.starts_with("HTTP/1.1 200"));
        assert!(body.contains("linefind_connections_total 1"));

        shutdown_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
