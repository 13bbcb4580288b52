//! Error types for the protocol layer.
//!
//! Every variant here means the byte stream can no longer be trusted:
//! once a frame is misread there is no safe point to resume from, so
//! callers are expected to close the connection on any `ProtocolError`.

use crate::TypeCode;

/// Errors that can occur while reading a frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The stream ended before a complete header arrived.
    ///
    /// `received == 0` means the peer closed between frames, which is an
    /// ordinary hang-up rather than corruption.
    #[error("truncated header: stream ended after {received} byte(s)")]
    TruncatedHeader { received: usize },

    /// A header byte was not what the grammar allows at that position:
    /// byte 1 must be `:`, the length must be ASCII digits ended by `\n`.
    #[error("malformed header: unexpected byte {found:#04x} at position {position}")]
    MalformedHeader { position: usize, found: u8 },

    /// The decimal length does not fit in a `usize`.
    #[error("payload length overflows usize")]
    LengthOverflow,

    /// The announced length is above the configured limit.
    #[error("payload of {length} bytes exceeds limit of {limit}")]
    PayloadTooLarge { length: usize, limit: usize },

    /// The stream ended before the payload and its terminator arrived.
    ///
    /// Both counts include the trailing `\n`. `expected` saturates at
    /// `usize::MAX`.
    #[error("truncated payload: expected {expected} bytes after header, got {received}")]
    TruncatedPayload { expected: usize, received: usize },

    /// The byte after the payload was not `\n`.
    #[error("missing terminator: expected '\\n', found {found:#04x}")]
    MissingTerminator { found: u8 },

    /// A well-formed frame arrived with a type the receiver cannot accept
    /// at this point, e.g. a reply that is neither a result nor an error.
    #[error("unexpected message type {0}")]
    UnexpectedType(TypeCode),

    /// Reading from the underlying stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns `true` if the peer hung up cleanly at a frame boundary.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, Self::TruncatedHeader { received: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_close_only_for_empty_header() {
        assert!(ProtocolError::TruncatedHeader { received: 0 }.is_clean_close());
        assert!(!ProtocolError::TruncatedHeader { received: 2 }.is_clean_close());
        assert!(!ProtocolError::LengthOverflow.is_clean_close());
    }

    #[test]
    fn test_malformed_header_message_names_byte() {
        let err = ProtocolError::MalformedHeader {
            position: 1,
            found: b';',
        };
        assert_eq!(
            err.to_string(),
            "malformed header: unexpected byte 0x3b at position 1"
        );
    }

    #[test]
    fn test_unexpected_type_message() {
        let err = ProtocolError::UnexpectedType(TypeCode::new(b'Q'));
        assert_eq!(err.to_string(), "unexpected message type Q");
    }
}
