//! Transport layer for turnwire.
//!
//! Provides the [`Connection`] type, which owns one duplex byte stream and
//! tracks whether it is still open, and the [`Transport`] trait for
//! accepting incoming connections. No framing happens here: a connection
//! only moves raw bytes.
//!
//! # Feature Flags
//!
//! - `tcp` (default): TCP connect and listen via `tokio::net`

mod connection;
mod error;
#[cfg(feature = "tcp")]
mod tcp;

pub use connection::Connection;
pub use error::TransportError;
#[cfg(feature = "tcp")]
pub use tcp::{TcpTransport, DEFAULT_HOST};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The byte stream carried by accepted connections.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Connection<Self::Stream>, Self::Error>> + Send;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}
