//! Wire protocol for turnwire.
//!
//! This crate defines the frame that clients and servers exchange:
//!
//! - **Types** ([`TypeCode`], [`Message`]): a one-byte type and a payload.
//! - **Codec** ([`encode`], [`decode`], [`FrameCodec`]): how a message is
//!   laid out as bytes and read back off a stream.
//! - **Errors** ([`ProtocolError`]): every way a frame can be malformed.
//!
//! # Wire format
//!
//! ```text
//! frame   = type ":" length "\n" payload "\n"
//! type    = 1 byte ('X' command, 'R' result, 'E' error)
//! length  = 1*DIGIT
//! payload = length OCTET
//! ```
//!
//! The payload is length-delimited, so it may contain any byte, newlines
//! included. The protocol layer knows nothing about sockets; it reads from
//! any `AsyncRead` and writes to any `AsyncWrite`.

mod codec;
mod error;
mod types;

pub use codec::{decode, encode, write_frame, FrameCodec, MIN_HEADER_LEN};
pub use error::ProtocolError;
pub use types::{Message, TypeCode};
