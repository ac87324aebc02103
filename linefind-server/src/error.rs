//! Server error types.

use crate::config::ConfigError;
use linefind_protocol::ProtocolError;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("cannot read source file {path:?}: {source}")]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
}

impl ServerError {
    /// Returns a stable category name, used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Io(_) => "io",
            ServerError::Protocol(_) => "protocol",
            ServerError::Config(_) => "config",
            ServerError::Bind { .. } => "bind",
            ServerError::SourceRead { .. } => "source_read",
            ServerError::Timeout(_) => "timeout",
            ServerError::TlsConfig(_) => "tls_config",
            ServerError::TlsHandshake(_) => "tls_handshake",
        }
    }

    /// Returns whether this error prevents the server from starting.
    ///
    /// Everything else is scoped to a single connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::Config(_) | ServerError::Bind { .. } | ServerError::TlsConfig(_)
        )
    }
}
