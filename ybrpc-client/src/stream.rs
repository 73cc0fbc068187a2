//! Client stream abstraction for TLS and plain TCP.

use crate::error::ClientError;
use crate::tls::{tls_connector, TlsClientConfig};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream as ClientTlsStream;

pin_project! {
    /// A byte stream to one cluster node, either plain TCP or TLS.
    #[derive(Debug)]
    #[project = ClientStreamProj]
    pub enum ClientStream {
        Plain { #[pin] stream: TcpStream },
        Tls { #[pin] stream: ClientTlsStream<TcpStream> },
    }
}

impl ClientStream {
    /// Dials `addr` (`host:port`) within `connect_timeout` and performs the
    /// TLS handshake when `tls` is enabled.
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
        tls: Option<&TlsClientConfig>,
    ) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", addr);

        let tcp_stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::debug!("Connection to {} timed out", addr);
                ClientError::ConnectTimeout(connect_timeout)
            })?
            .map_err(|e| {
                tracing::debug!("Connection to {} failed: {}", addr, e);
                ClientError::Io(e)
            })?;

        // Requests are small and strictly request/response.
        tcp_stream.set_nodelay(true).ok();

        match tls.filter(|t| t.enabled) {
            Some(tls_config) => {
                let (connector, server_name) = tls_connector(tls_config, host_of(addr))?;

                tracing::debug!("Performing TLS handshake with {}...", addr);
                let stream = connector
                    .connect(server_name, tcp_stream)
                    .await
                    .map_err(|e| ClientError::TlsHandshake(e.to_string()))?;
                tracing::debug!("TLS handshake with {} complete", addr);

                Ok(ClientStream::Tls { stream })
            }
            None => Ok(ClientStream::Plain { stream: tcp_stream }),
        }
    }

    /// Returns whether this stream is TLS-encrypted.
    pub fn is_tls(&self) -> bool {
        matches!(self, ClientStream::Tls { .. })
    }

    fn tcp(&self) -> &TcpStream {
        match self {
            ClientStream::Plain { stream } => stream,
            ClientStream::Tls { stream } => stream.get_ref().0,
        }
    }

    pub fn peer_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.tcp().peer_addr()
    }
}

/// Host part of a `host:port` address, with IPv6 brackets removed.
pub(crate) fn host_of(addr: &str) -> &str {
    let host = match addr.rsplit_once(':') {
        Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => addr,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

impl AsyncRead for ClientStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            ClientStreamProj::Plain { stream } => stream.poll_read(cx, buf),
            ClientStreamProj::Tls { stream } => stream.poll_read(cx, buf),
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
            ClientStreamProj::Plain { stream } => stream.poll_write(cx, buf),
            ClientStreamProj::Tls { stream } => stream.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            ClientStreamProj::Plain { stream } => stream.poll_flush(cx),
            ClientStreamProj::Tls { stream } => stream.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            ClientStreamProj::Plain { stream } => stream.poll_shutdown(cx),
            ClientStreamProj::Tls { stream } => stream.poll_shutdown(cx),
        }
    }
}
