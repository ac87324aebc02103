//! Protocol error types.

use thiserror::Error;

/// Errors raised while decoding queries or responses.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("query is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("query too large: {size} bytes (max {max})")]
    QueryTooLarge { size: usize, max: usize },

    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(String),

    #[error("empty response")]
    EmptyResponse,
}
