use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The port is outside `1..=65535`.
    #[error("invalid port {0}")]
    InvalidPort(u16),

    /// The host name could not be resolved.
    #[error("cannot resolve {host}: {source}")]
    ResolveFailed {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Every resolved address refused or failed the connection attempt.
    #[error("cannot connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Binding the listening socket failed.
    #[error("cannot bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The listening socket could not report its own address.
    #[error("cannot read local address: {0}")]
    LocalAddrFailed(#[source] std::io::Error),

    /// Writing to the peer failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The connection was already closed.
    ///
    /// Any use of a closed connection reports this, the equivalent of a
    /// bad file descriptor.
    #[error("bad descriptor: connection is closed")]
    Closed,

    /// A read or write did not complete within the configured limit.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}
