//! Core protocol types: the type code and the message it labels.

use std::borrow::Cow;
use std::fmt;

// ---------------------------------------------------------------------------
// TypeCode
// ---------------------------------------------------------------------------

/// The single byte that says what role a message plays.
///
/// Three codes are defined by convention. Any other byte is still a valid
/// frame; servers log such messages and carry on, which leaves room for new
/// types without renegotiating the protocol.
///
/// `:` and `\n` are not rejected here, but the well-known codes never use
/// them and a peer sending them will confuse anyone reading a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeCode(u8);

impl TypeCode {
    /// Client → server: evaluate this command.
    pub const COMMAND: Self = Self(b'X');

    /// Server → client: the command succeeded; payload is the value.
    pub const RESULT: Self = Self(b'R');

    /// Either direction: something failed; payload is the description.
    pub const ERROR: Self = Self(b'E');

    /// Wraps a raw type byte.
    pub const fn new(byte: u8) -> Self {
        Self(byte)
    }

    /// Returns the raw byte as written on the wire.
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

/// Prints the code as its character when printable, `\xNN` otherwise.
impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_ascii_graphic() || self.0 == b' ' {
            write!(f, "{}", char::from(self.0))
        } else {
            write!(f, "\\x{:02x}", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One decoded frame: a type code and its payload.
///
/// The length written in the header is always `payload.len()`; it is not
/// stored separately, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: TypeCode,
    payload: Vec<u8>,
}

impl Message {
    /// Creates a message of the given type.
    pub fn new(kind: TypeCode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Creates a command message carrying `command`.
    pub fn command(command: impl Into<String>) -> Self {
        Self::new(TypeCode::COMMAND, command.into())
    }

    /// Creates a result message carrying `value`.
    pub fn result(value: impl Into<String>) -> Self {
        Self::new(TypeCode::RESULT, value.into())
    }

    /// Creates an error message carrying `description`.
    pub fn error(description: impl Into<String>) -> Self {
        Self::new(TypeCode::ERROR, description.into())
    }

    pub fn kind(&self) -> TypeCode {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of payload bytes, i.e. the length field of the header.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The payload as text. Invalid UTF-8 is replaced, not rejected.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
