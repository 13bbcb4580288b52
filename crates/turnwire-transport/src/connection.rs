//! A single duplex byte stream with an open/closed lifecycle.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::{ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// An open (or closed) connection to a peer.
///
/// A connection is created open by a successful connect or accept and only
/// ever moves to closed. It is never reopened: once [`close`](Self::close)
/// has run, every use of the stream fails with [`TransportError::Closed`].
///
/// The stream is treated as raw bytes. Nothing is transcoded and line
/// endings are left alone, since payloads may hold arbitrary data.
#[derive(Debug)]
pub struct Connection<S> {
    id: ConnectionId,
    peer: Option<String>,
    port: u16,
    stream: Option<S>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an already-established stream.
    ///
    /// `peer` is the name or address of the remote side, kept for logging.
    pub fn from_stream(stream: S, peer: Option<String>, port: u16) -> Self {
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        Self {
            id,
            peer,
            port,
            stream: Some(stream),
        }
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` until the connection has been closed.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Name of the remote peer, or `None` once closed.
    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    /// Port of the remote peer, or `0` once closed.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Borrows the underlying stream for reading or writing.
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] if the connection has been closed.
    pub fn stream_mut(&mut self) -> Result<&mut S, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }

    /// Closes the connection.
    ///
    /// Idempotent: closing an already-closed connection does nothing. The
    /// write side is shut down so the peer sees end-of-stream, then the
    /// stream and the peer identity are dropped.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(id = %self.id, error = %e, "shutdown failed");
            }
            tracing::debug!(id = %self.id, peer = ?self.peer, "connection closed");
        }
        self.peer = None;
        self.port = 0;
    }
}
