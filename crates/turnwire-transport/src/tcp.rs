//! TCP transport implementation using `tokio::net`.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::{Connection, Transport, TransportError};

/// Host used by [`Connection::connect`] when none is given.
pub const DEFAULT_HOST: &str = "127.0.0.1";

impl Connection<TcpStream> {
    /// Opens a TCP connection to `host:port`.
    ///
    /// `host` defaults to [`DEFAULT_HOST`]. Every address the name resolves
    /// to is tried in order; the first one that accepts wins. On failure
    /// nothing is left open.
    ///
    /// # Errors
    /// - [`TransportError::InvalidPort`] for port `0`
    /// - [`TransportError::ResolveFailed`] if the name does not resolve
    /// - [`TransportError::ConnectFailed`] if no address accepts
    pub async fn connect(
        host: Option<&str>,
        port: u16,
    ) -> Result<Self, TransportError> {
        if port == 0 {
            return Err(TransportError::InvalidPort(port));
        }
        let host = host.unwrap_or(DEFAULT_HOST);

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| TransportError::ResolveFailed {
                host: host.to_string(),
                source,
            })?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    // Frames are small and strictly turn-based.
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%addr, error = %e, "set_nodelay failed");
                    }
                    let conn = Self::from_stream(stream, Some(host.to_string()), port);
                    tracing::debug!(id = %conn.id(), %addr, "connected");
                    return Ok(conn);
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(TransportError::ConnectFailed {
            host: host.to_string(),
            port,
            source: last_error.unwrap_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "host resolved to no addresses",
                )
            }),
        })
    }
}

/// A TCP-based [`Transport`] that listens for incoming connections.
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Connection<TcpStream>, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %e, "set_nodelay failed");
        }

        let conn =
            Connection::from_stream(stream, Some(addr.ip().to_string()), addr.port());
        tracing::info!(id = %conn.id(), %addr, "accepted TCP connection");
        Ok(conn)
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener.local_addr().map_err(TransportError::LocalAddrFailed)
    }
}
