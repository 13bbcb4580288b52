//! Unified error type for the turnwire framework.

use turnwire_protocol::ProtocolError;
use turnwire_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Transport and protocol errors are fatal: by the time one is returned
/// the connection has already been closed, and retrying on it is
/// pointless. [`Application`](Self::Application) errors are the ordinary
/// failure outcome of one request and leave the connection usable.
#[derive(Debug, thiserror::Error)]
pub enum TurnwireError {
    /// A transport-level error (connect, send, closed connection).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A framing error, including read failures and unexpected reply types.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer answered with an error message. Holds its text verbatim.
    #[error("{0}")]
    Application(String),

    /// A configuration file or value could not be used.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TurnwireError {
    /// Returns `true` if the connection was closed by this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Protocol(_))
    }
}
