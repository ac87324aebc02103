//! # linefind-protocol
//!
//! Wire protocol for linefind.
//!
//! The protocol is deliberately minimal:
//! - The client opens a connection and sends the raw query text, unframed.
//! - The server performs a single read of at most [`MAX_QUERY_BYTES`] bytes.
//! - The server answers with exactly one line, `STRING EXISTS` or
//!   `STRING NOT FOUND`, and closes the connection.

pub mod error;
pub mod message;

pub use error::ProtocolError;
pub use message::{Query, QueryResult};

/// Default port for the linefind server.
pub const DEFAULT_PORT: u16 = 8080;

/// Size of the server's single read buffer.
///
/// A query longer than this is truncated to its first `MAX_QUERY_BYTES` bytes.
pub const MAX_QUERY_BYTES: usize = 1024;

/// Response line for a query that matches a line of the file.
pub const RESPONSE_EXISTS: &str = "STRING EXISTS";

/// Response line for a query that matches no line of the file.
pub const RESPONSE_NOT_FOUND: &str = "STRING NOT FOUND";
