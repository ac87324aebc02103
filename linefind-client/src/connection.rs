//! One-shot connections.
//!
//! The server answers exactly one query per connection, so a [`Connection`]
//! is opened, used for a single query and closed.

use crate::error::ClientError;
use crate::stream::ClientStream;
use crate::tls::create_tls_connector;
use linefind_protocol::{ProtocolError, Query, QueryResult};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Upper bound on a response; the longest valid one is 17 bytes.
const MAX_RESPONSE_BYTES: usize = 64;

/// TLS configuration for client connections.
#[derive(Debug, Clone, Default)]
pub struct TlsClientConfig {
    /// Enable TLS for the connection.
    pub enabled: bool,
    /// Path to PEM-encoded CA certificate(s) for server verification.
    /// If None, the webpki roots are used.
    pub ca_cert_path: Option<PathBuf>,
    /// Skip server certificate verification (INSECURE - development only).
    pub insecure: bool,
    /// Server name for SNI (defaults to the IP of the server address).
    pub server_name: Option<String>,
}

impl TlsClientConfig {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    pub fn with_insecure(mut self) -> Self {
        self.insecure = true;
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout, including the TLS handshake.
    pub connect_timeout: Duration,
    /// How long to wait for the response once the query is sent.
    pub response_timeout: Duration,
    /// TLS configuration (optional).
    pub tls: Option<TlsClientConfig>,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(10),
            tls: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_tls(mut self, tls_config: TlsClientConfig) -> Self {
        self.tls = Some(tls_config);
        self
    }

    fn tls_enabled(&self) -> Option<&TlsClientConfig> {
        self.tls.as_ref().filter(|tls| tls.enabled)
    }
}

/// An open connection to a linefind server.
pub struct Connection {
    stream: ClientStream,
    addr: SocketAddr,
    response_timeout: Duration,
}

impl Connection {
    /// Connects to the server, performing the TLS handshake if configured.
    pub async fn open(config: &ConnectionConfig) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", config.addr);
        let stream = tokio::time::timeout(config.connect_timeout, Self::connect(config))
            .await
            .map_err(|_| ClientError::Timeout("connect"))??;
        tracing::debug!("Connected to {} ({})", config.addr, stream);

        Ok(Self {
            stream,
            addr: config.addr,
            response_timeout: config.response_timeout,
        })
    }

    async fn connect(config: &ConnectionConfig) -> Result<ClientStream, ClientError> {
        let tcp_stream = TcpStream::connect(config.addr).await?;
        tcp_stream.set_nodelay(true).ok();

        let Some(tls_config) = config.tls_enabled() else {
            return Ok(ClientStream::plain(tcp_stream));
        };

        let host = config.addr.ip().to_string();
        let (connector, server_name) = create_tls_connector(tls_config, &host)?;

        tracing::debug!("Performing TLS handshake...");
        let tls_stream = connector
            .connect(server_name, tcp_stream)
            .await
            .map_err(|e| ClientError::TlsHandshake(e.to_string()))?;
        tracing::debug!("TLS handshake complete");

        Ok(ClientStream::tls(tls_stream))
    }

    /// Returns whether the connection is TLS-encrypted.
    pub fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Negotiated TLS version, if the connection is encrypted.
    pub fn tls_version(&self) -> Option<rustls::ProtocolVersion> {
        self.stream.tls_version()
    }

    /// Sends the query in a single write.
    ///
    /// An empty query is sent by closing the write half, which the server
    /// reads as zero bytes.
    pub async fn send_query(&mut self, query: &Query) -> Result<(), ClientError> {
        if query.is_empty() {
            self.stream.shutdown().await?;
        } else {
            self.stream.write_all(query.as_bytes()).await?;
            self.stream.flush().await?;
        }
        tracing::debug!("[{}] Sent query ({} bytes)", self.addr, query.len());
        Ok(())
    }

    /// Waits for the response line.
    pub async fn read_response(&mut self) -> Result<QueryResult, ClientError> {
        tokio::time::timeout(self.response_timeout, read_response_line(&mut self.stream))
            .await
            .map_err(|_| ClientError::Timeout("response"))?
    }

    /// Closes the connection.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!("[{}] Close error: {}", self.addr, e);
        }
    }
}

/// Reads one response line, up to a newline or the end of the stream.
pub async fn read_response_line<R>(reader: &mut R) -> Result<QueryResult, ClientError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(MAX_RESPONSE_BYTES);
    let mut chunk = [0u8; MAX_RESPONSE_BYTES];

    while !buf.contains(&b'\n') {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_RESPONSE_BYTES {
            let text = String::from_utf8_lossy(&buf).into_owned();
            return Err(ProtocolError::UnexpectedResponse(text).into());
        }
    }

    if buf.is_empty() {
        return Err(ClientError::ConnectionClosed);
    }

    let line = match buf.iter().position(|&b| b == b'\n') {
        Some(end) => &buf[..=end],
        None => &buf[..],
    };
    let text = std::str::from_utf8(line).map_err(ProtocolError::from)?;
    Ok(QueryResult::parse_response(text)?)
}
