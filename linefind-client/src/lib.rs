//! # linefind-client
//!
//! Client library for linefind.
//!
//! This crate provides:
//! - One connection per query, as the server expects
//! - Connect and response timeouts
//! - Optional TLS support, with a custom CA or the webpki roots

pub mod client;
pub mod connection;
pub mod error;
pub mod stream;
pub mod tls;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig, TlsClientConfig};
pub use error::ClientError;
