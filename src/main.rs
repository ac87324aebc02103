//! linefind - exact-line lookup server
//!
//! Answers, per TCP (or TLS) connection, whether the received string is a
//! line of the configured file.

use linefind_server::metrics::run_metrics_server;
use linefind_server::tls::create_tls_acceptor;
use linefind_server::{Config, LineSource, LoggingConfig, Metrics, Server, ServerConfig};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.file {
        Some(ref path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (from file if LINEFIND_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("linefind: failed to load config: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("linefind: cannot open log file: {}", e);
        return Err(e.into());
    }

    if let Ok(path) = std::env::var("LINEFIND_CONFIG") {
        tracing::info!("Loaded config from {}", path);
    }

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return Err(e.into());
    }

    tracing::info!("Starting linefind server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Backlog: {}", config.network.max_connections);
    tracing::info!("  Connection timeout: {:?}", config.network.timeout());
    tracing::info!("  Source file: {}", config.search.path.display());
    tracing::info!("  Load mode: {}", config.search.load_mode());

    let mut server_config = ServerConfig::from_network(&config.network);

    if config.tls.enabled {
        let acceptor = create_tls_acceptor(&config.tls).map_err(|e| {
            tracing::error!("{}", e);
            e
        })?;
        server_config = server_config.with_tls(acceptor);
        tracing::info!("  TLS: enabled");
    } else {
        tracing::info!("  TLS: disabled");
    }

    let metrics = if config.metrics.enabled {
        let metrics = Arc::new(Metrics::new()?);
        server_config = server_config.with_metrics(metrics.clone());
        tracing::info!("  Metrics: http://{}/metrics", config.metrics.bind_addr);
        Some(metrics)
    } else {
        tracing::info!("  Metrics: disabled");
        None
    };

    let mut source = LineSource::new(&config.search.path, config.search.load_mode());
    if let Some(ref metrics) = metrics {
        source = source.with_metrics(metrics.clone());
    }
    let source = Arc::new(source);

    // A missing file is not fatal; queries fail until it appears
    if let Err(e) = source.warm().await {
        tracing::warn!("Source file not loaded: {}", e);
    }

    let server = Arc::new(Server::new(server_config, source));
    let listener = server.bind().map_err(|e| {
        tracing::error!("{}", e);
        e
    })?;

    if let Some(metrics) = metrics {
        let addr = config.metrics.bind_addr;
        let shutdown = server.shutdown_signal();
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(addr, metrics, shutdown).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.serve(listener).await?;

    tracing::info!("Server stopped");
    Ok(())
}
