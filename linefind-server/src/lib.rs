//! # linefind-server
//!
//! TCP server for linefind.
//!
//! This crate provides:
//! - A listener with a configurable backlog and a task per connection
//! - One-shot query handling with a per-connection deadline
//! - Line sources that either reread the file per query or cache it once
//! - Optional TLS support
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handler;
pub mod lines;
pub mod metrics;
pub mod server;
pub mod tls;

pub use config::{
    Config, ConfigError, LoggingConfig, MetricsConfig, NetworkConfig, SearchConfig, TlsConfig,
};
pub use error::ServerError;
pub use handler::QueryHandler;
pub use lines::{LineSet, LineSource, LoadMode};
pub use metrics::Metrics;
pub use server::{Server, ServerConfig, ServerStats};
