//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] linefind_protocol::ProtocolError),

    #[error("connection closed before a response was received")]
    ConnectionClosed,

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
}

impl ClientError {
    /// Returns whether retrying the query on a new connection may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::Timeout(_) | ClientError::ConnectionClosed
        )
    }
}
