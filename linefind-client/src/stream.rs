//! Transport under a [`Connection`](crate::Connection): plain TCP or TLS.

use pin_project_lite::pin_project;
use rustls::ProtocolVersion;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

pin_project! {
    /// The socket a query travels over.
    #[project = TransportProj]
    pub enum ClientStream {
        Plain { #[pin] tcp: TcpStream },
        Tls { #[pin] tls: Box<TlsStream<TcpStream>> },
    }
}

impl ClientStream {
    pub fn plain(tcp: TcpStream) -> Self {
        ClientStream::Plain { tcp }
    }

    pub fn tls(tls: TlsStream<TcpStream>) -> Self {
        ClientStream::Tls { tls: Box::new(tls) }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, ClientStream::Tls { .. })
    }

    /// Address of the server end of the socket.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            ClientStream::Plain { tcp } => tcp.peer_addr(),
            ClientStream::Tls { tls } => tls.get_ref().0.peer_addr(),
        }
    }

    /// Negotiated TLS version, `None` for plain TCP.
    pub fn tls_version(&self) -> Option<ProtocolVersion> {
        match self {
            ClientStream::Plain { .. } => None,
            ClientStream::Tls { tls } => tls.get_ref().1.protocol_version(),
        }
    }
}

impl fmt::Display for ClientStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tls_version() {
            Some(version) => write!(f, "tls {:?}", version),
            None if self.is_tls() => f.write_str("tls"),
            None => f.write_str("plain"),
        }
    }
}

impl AsyncRead for ClientStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            TransportProj::Plain { tcp } => tcp.poll_read(cx, buf),
            TransportProj::Tls { tls } => tls.poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ClientStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            TransportProj::Plain { tcp } => tcp.poll_write(cx, buf),
            TransportProj::Tls { tls } => tls.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            TransportProj::Plain { tcp } => tcp.poll_flush(cx),
            TransportProj::Tls { tls } => tls.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            TransportProj::Plain { tcp } => tcp.poll_shutdown(cx),
            TransportProj::Tls { tls } => tls.poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_plain_stream_reports_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let echo = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let mut stream = ClientStream::plain(TcpStream::connect(addr).await.unwrap());
        assert_eq!(stream.peer_addr().unwrap(), addr);
        assert!(!stream.is_tls());
        assert_eq!(stream.tls_version(), None);
        assert_eq!(stream.to_string(), "plain");

        stream.write_all(b"ping").await.unwrap();
        let mut reply = [0u8; 4];
        stream.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"ping");
        echo.await.unwrap();
    }
}
